// ABOUTME: russh-backed transport: connection, password auth, exec channels.
// ABOUTME: SCP and SFTP live in the scp and sftp submodules.

mod algorithms;
mod handler;
mod scp;
mod sftp;

pub use sftp::RusshSftp;

use self::handler::SshHandler;
use super::config::SessionConfig;
use super::error::{Error, Result, TransportError};
use super::exec::{ExecOptions, TerminalUnits};
use super::session::Session;
use super::transport::{Connector, ExecOutput, Transport};
use async_trait::async_trait;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use std::path::Path;
use std::sync::Arc;

/// Opens connections with russh.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

#[async_trait]
impl Connector for RusshConnector {
    type Transport = RusshTransport;

    async fn connect(&self, config: &SessionConfig) -> std::result::Result<RusshTransport, TransportError> {
        let russh_config = Config {
            inactivity_timeout: config.inactivity_timeout,
            preferred: algorithms::preferred(&config.algorithms)?,
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.trust_on_first_use,
            config.known_hosts_path.clone(),
            config.hooks.clone(),
        );

        let handle = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await?;

        Ok(RusshTransport { handle })
    }
}

/// An open russh connection.
pub struct RusshTransport {
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport")
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl RusshTransport {
    /// Open a session channel with the pty and environment from `options`, then exec.
    async fn start(
        &self,
        command: &str,
        options: &ExecOptions,
    ) -> std::result::Result<Channel<Msg>, TransportError> {
        let channel = self.handle.channel_open_session().await?;

        if options.wants_pty() {
            let (cols, rows, pix_width, pix_height) = match options.units {
                TerminalUnits::Chars => (options.width, options.height, 0, 0),
                TerminalUnits::Pixels => (0, 0, options.width, options.height),
            };
            channel
                .request_pty(false, &options.pty, cols, rows, pix_width, pix_height, &[])
                .await?;
        }

        for (name, value) in &options.env {
            // Servers commonly refuse setenv for names outside AcceptEnv.
            if let Err(e) = channel.set_env(false, name.as_str(), value.as_str()).await {
                tracing::debug!("setenv {} refused: {}", name, e);
            }
        }

        channel.exec(true, command).await?;
        Ok(channel)
    }
}

#[async_trait]
impl Transport for RusshTransport {
    type Sftp = RusshSftp;

    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> std::result::Result<bool, TransportError> {
        let result = self.handle.authenticate_password(user, password).await?;
        Ok(result.success())
    }

    async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    async fn exec(
        &mut self,
        command: &str,
        options: &ExecOptions,
    ) -> std::result::Result<ExecOutput, TransportError> {
        let mut channel = self.start(command, options).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::Failure) => {
                    return Err(TransportError::Rejected(
                        "exec request refused by server".to_string(),
                    ));
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if exit_status.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_status,
        })
    }

    async fn exec_detached(
        &mut self,
        command: &str,
        options: &ExecOptions,
    ) -> std::result::Result<(), TransportError> {
        let mut channel = self.start(command, options).await?;

        // Wait for the server to accept the exec request before letting go.
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => break,
                Some(ChannelMsg::Failure) => {
                    return Err(TransportError::Rejected(
                        "exec request refused by server".to_string(),
                    ));
                }
                Some(ChannelMsg::Close) | None => return Err(TransportError::ChannelClosed),
                Some(_) => {}
            }
        }

        tokio::spawn(async move {
            while let Some(msg) = channel.wait().await {
                if let ChannelMsg::ExitStatus { exit_status } = msg {
                    tracing::debug!("detached command exited with status {}", exit_status);
                }
            }
        });
        Ok(())
    }

    async fn scp_send(
        &mut self,
        local: &Path,
        remote: &str,
        mode: u32,
    ) -> std::result::Result<(), TransportError> {
        scp::send(&self.handle, local, remote, mode).await
    }

    async fn scp_recv(&mut self, remote: &str, local: &Path) -> std::result::Result<(), TransportError> {
        scp::recv(&self.handle, remote, local).await
    }

    async fn sftp_init(&mut self) -> std::result::Result<RusshSftp, TransportError> {
        RusshSftp::open(&self.handle).await
    }
}

impl Session<RusshTransport> {
    /// Connect with russh and authenticate with the configured password.
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let password = config.password.clone().ok_or_else(|| {
            Error::InvalidConfig(format!("no password configured for user {}", config.user))
        })?;

        let mut session = Session::connect(&RusshConnector, &config).await?;
        session.authenticate_password(&config.user, &password).await?;
        Ok(session)
    }
}
