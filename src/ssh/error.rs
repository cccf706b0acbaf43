// ABOUTME: SSH-specific error types.
// ABOUTME: Transport failures and the stage-tagged errors a Session reports.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("SFTP error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unusable connection settings: {0}")]
    Config(String),

    #[error("remote side refused: {0}")]
    Rejected(String),

    #[error("channel closed unexpectedly")]
    ChannelClosed,
}

/// Errors surfaced by [`Session`](super::Session) and its operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("connection to {host}:{port} failed: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    #[error("authentication failed for user {user}: credentials rejected")]
    AuthenticationFailed { user: String },

    #[error("authentication of user {user} could not complete: {source}")]
    Authentication {
        user: String,
        #[source]
        source: TransportError,
    },

    #[error("session is not authenticated")]
    NotAuthenticated,

    #[error("session is not connected")]
    NotConnected,

    #[error("disconnect failed: {0}")]
    Disconnect(#[source] TransportError),

    #[error("command execution failed: {message}")]
    Execution {
        /// Stderr text, or stdout with the return-code marker stripped.
        message: String,
        exit_code: Option<u32>,
    },

    #[error("command could not be run: {0}")]
    Channel(#[source] TransportError),

    #[error("transfer between {} and {remote} failed: {source}", .local.display())]
    Transfer {
        local: PathBuf,
        remote: String,
        #[source]
        source: TransportError,
    },

    #[error("SFTP subsystem not initialized")]
    SftpNotInitialized,

    #[error("failed to start SFTP subsystem: {0}")]
    SftpInit(#[source] TransportError),

    #[error("SFTP {op} on {path} failed: {source}")]
    Sftp {
        op: &'static str,
        path: String,
        #[source]
        source: TransportError,
    },
}

/// Stage at which an [`Error`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Authentication,
    Disconnect,
    Execution,
    Transfer,
    Sftp,
}

impl Error {
    /// Returns the stage tag for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_) => ErrorKind::Config,
            Error::Connection { .. } | Error::NotConnected => ErrorKind::Connection,
            Error::AuthenticationFailed { .. }
            | Error::Authentication { .. }
            | Error::NotAuthenticated => ErrorKind::Authentication,
            Error::Disconnect(_) => ErrorKind::Disconnect,
            Error::Execution { .. } | Error::Channel(_) => ErrorKind::Execution,
            Error::Transfer { .. } => ErrorKind::Transfer,
            Error::SftpNotInitialized | Error::SftpInit(_) | Error::Sftp { .. } => ErrorKind::Sftp,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
