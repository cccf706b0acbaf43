// ABOUTME: SFTP subsystem backed by russh-sftp.
// ABOUTME: Implements chmod, mkdir (optionally recursive), rmdir and unlink.

use super::handler::SshHandler;
use crate::ssh::error::TransportError;
use crate::ssh::transport::SftpSubsystem;
use async_trait::async_trait;
use russh::client::Handle;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;

/// An open SFTP channel.
pub struct RusshSftp {
    session: SftpSession,
}

impl std::fmt::Debug for RusshSftp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshSftp").finish_non_exhaustive()
    }
}

impl RusshSftp {
    pub(crate) async fn open(handle: &Handle<SshHandler>) -> Result<Self, TransportError> {
        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let session = SftpSession::new(channel.into_stream()).await?;
        Ok(Self { session })
    }

    /// Whether `path` is already a directory. Anything else at `path` is an error.
    async fn is_dir(&self, path: &str) -> Result<bool, TransportError> {
        let found = self.session.metadata(path).await.ok().map(|m| m.is_dir());
        require_dir(path, found)
    }

    async fn create_dir(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        self.session.create_dir(path).await?;
        self.set_permissions(path, mode).await
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..FileAttributes::empty()
        };
        self.session.set_metadata(path, attrs).await?;
        Ok(())
    }
}

#[async_trait]
impl SftpSubsystem for RusshSftp {
    async fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        self.set_permissions(path, mode).await
    }

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError> {
        if !recursive {
            return self.create_dir(path, mode).await;
        }

        for dir in ancestors(path) {
            if self.is_dir(&dir).await? {
                continue;
            }
            self.create_dir(&dir, mode).await?;
        }
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<(), TransportError> {
        self.session.remove_dir(path).await?;
        Ok(())
    }

    async fn unlink(&self, path: &str) -> Result<(), TransportError> {
        self.session.remove_file(path).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.session.close().await?;
        Ok(())
    }
}

fn require_dir(path: &str, found: Option<bool>) -> Result<bool, TransportError> {
    match found {
        Some(true) => Ok(true),
        Some(false) => Err(TransportError::Rejected(format!(
            "{}: exists and is not a directory",
            path
        ))),
        None => Ok(false),
    }
}

/// Every directory from the outermost component down to `path` itself.
fn ancestors(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut dirs = Vec::new();

    for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
        if !current.is_empty() || absolute {
            current.push('/');
        }
        current.push_str(component);
        dirs.push(current.clone());
    }
    dirs
}
