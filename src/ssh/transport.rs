// ABOUTME: Capability traits at the boundary to the SSH protocol library.
// ABOUTME: Session logic is written against these; russh backs them in production.

use super::config::SessionConfig;
use super::error::TransportError;
use super::exec::ExecOptions;
use async_trait::async_trait;
use std::path::Path;

/// Raw output of one exec channel, read to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, when the server reported one.
    pub exit_status: Option<u32>,
}

/// Opens transports for a [`SessionConfig`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Open the connection. Must not authenticate.
    async fn connect(&self, config: &SessionConfig) -> Result<Self::Transport, TransportError>;
}

/// An open SSH connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Sftp: SftpSubsystem;

    /// Try a password; `Ok(false)` means the server rejected it.
    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<bool, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Run a command and read stdout and stderr until the channel closes.
    async fn exec(
        &mut self,
        command: &str,
        options: &ExecOptions,
    ) -> Result<ExecOutput, TransportError>;

    /// Start a command without waiting for it; output is discarded.
    async fn exec_detached(
        &mut self,
        command: &str,
        options: &ExecOptions,
    ) -> Result<(), TransportError>;

    async fn scp_send(
        &mut self,
        local: &Path,
        remote: &str,
        mode: u32,
    ) -> Result<(), TransportError>;

    async fn scp_recv(&mut self, remote: &str, local: &Path) -> Result<(), TransportError>;

    /// Request a new SFTP subsystem handle.
    async fn sftp_init(&mut self) -> Result<Self::Sftp, TransportError>;
}

/// An SFTP subsystem channel.
#[async_trait]
pub trait SftpSubsystem: Send + Sync + 'static {
    async fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError>;

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError>;

    async fn rmdir(&self, path: &str) -> Result<(), TransportError>;

    async fn unlink(&self, path: &str) -> Result<(), TransportError>;

    /// Release the subsystem channel.
    async fn close(&self) -> Result<(), TransportError>;
}
