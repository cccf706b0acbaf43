// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Password-authenticated sessions with exec, SCP and SFTP operations.

mod client;
mod config;
mod error;
mod exec;
mod files;
mod session;
mod transport;

pub use client::{RusshConnector, RusshSftp, RusshTransport};
pub use config::{AlgorithmOptions, ConnectHooks, SessionConfig};
pub use error::{Error, ErrorKind, Result, TransportError};
pub use exec::{
    CommandResult, ExecOptions, TerminalUnits, find_return_code, interpret, strip_return_code,
    with_return_code_marker,
};
pub use files::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
pub use session::Session;
pub use transport::{Connector, ExecOutput, SftpSubsystem, Transport};
