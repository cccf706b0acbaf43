// ABOUTME: SCP transfers and SFTP filesystem operations on a session.
// ABOUTME: SFTP calls require an explicit init_sftp; nothing is initialized implicitly.

use super::error::{Error, Result};
use super::session::Session;
use super::transport::{SftpSubsystem, Transport};
use std::path::Path;

/// Mode for files created by [`Session::scp_send`].
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Mode for directories created by [`Session::mkdir`].
pub const DEFAULT_DIR_MODE: u32 = 0o777;

impl<T: Transport> Session<T> {
    /// Copy a local file to `remote`, creating it with `mode`.
    pub async fn scp_send(&mut self, local: impl AsRef<Path>, remote: &str, mode: u32) -> Result<()> {
        let local = local.as_ref();
        tracing::debug!(host = %self.host(), "scp {} -> {} ({:o})", local.display(), remote, mode);

        self.channel_transport()?
            .scp_send(local, remote, mode)
            .await
            .map_err(|source| Error::Transfer {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                source,
            })
    }

    /// Copy `remote` into a local file.
    pub async fn scp_recv(&mut self, remote: &str, local: impl AsRef<Path>) -> Result<()> {
        let local = local.as_ref();
        tracing::debug!(host = %self.host(), "scp {} <- {}", local.display(), remote);

        self.channel_transport()?
            .scp_recv(remote, local)
            .await
            .map_err(|source| Error::Transfer {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                source,
            })
    }

    /// Open the SFTP subsystem, replacing any handle opened earlier.
    pub async fn init_sftp(&mut self) -> Result<()> {
        let handle = self
            .channel_transport()?
            .sftp_init()
            .await
            .map_err(Error::SftpInit)?;

        if let Some(previous) = self.sftp.replace(handle) {
            tracing::debug!(host = %self.host(), "replacing existing SFTP subsystem handle");
            if let Err(e) = previous.close().await {
                tracing::warn!("Failed to close previous SFTP handle: {}", e);
            }
        }
        Ok(())
    }

    /// Change permissions of a remote path.
    pub async fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        self.sftp_handle()?
            .chmod(path, mode)
            .await
            .map_err(|source| sftp_error("chmod", path, source))
    }

    /// Create a remote directory; `recursive` also creates missing parents.
    pub async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<()> {
        self.sftp_handle()?
            .mkdir(path, mode, recursive)
            .await
            .map_err(|source| sftp_error("mkdir", path, source))
    }

    /// Remove an empty remote directory.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.sftp_handle()?
            .rmdir(path)
            .await
            .map_err(|source| sftp_error("rmdir", path, source))
    }

    /// Remove a remote file.
    pub async fn unlink(&self, path: &str) -> Result<()> {
        self.sftp_handle()?
            .unlink(path)
            .await
            .map_err(|source| sftp_error("unlink", path, source))
    }

    fn sftp_handle(&self) -> Result<&T::Sftp> {
        self.sftp.as_ref().ok_or(Error::SftpNotInitialized)
    }
}

fn sftp_error(op: &'static str, path: &str, source: super::error::TransportError) -> Error {
    Error::Sftp {
        op,
        path: path.to_string(),
        source,
    }
}
