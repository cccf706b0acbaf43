// ABOUTME: SSH session lifecycle: connect, password authentication, disconnect.
// ABOUTME: Dropping a connected session disconnects it on the current tokio runtime.

use super::config::SessionConfig;
use super::error::{Error, Result, TransportError};
use super::transport::{Connector, SftpSubsystem, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthState {
    Unauthenticated,
    Authenticated { user: String },
}

/// A connection to one remote host.
pub struct Session<T: Transport> {
    host: String,
    port: u16,
    /// None once disconnected.
    transport: Option<T>,
    auth: AuthState,
    pub(super) sftp: Option<T::Sftp>,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.transport.is_some())
            .field("auth", &self.auth)
            .field("sftp", &self.sftp.is_some())
            .finish()
    }
}

impl<T: Transport> Session<T> {
    /// Open a connection through `connector`. The session starts unauthenticated.
    pub async fn connect<C>(connector: &C, config: &SessionConfig) -> Result<Self>
    where
        C: Connector<Transport = T>,
    {
        config.validate().map_err(Error::InvalidConfig)?;

        tracing::debug!(host = %config.host, port = config.port, "connecting");
        let transport = connector.connect(config).await.map_err(|e| match e {
            TransportError::Config(msg) => Error::InvalidConfig(msg),
            source => Error::Connection {
                host: config.host.clone(),
                port: config.port,
                source,
            },
        })?;

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            transport: Some(transport),
            auth: AuthState::Unauthenticated,
            sftp: None,
        })
    }

    /// Authenticate with a username and password.
    ///
    /// A failed attempt leaves the session unauthenticated, even if an earlier one succeeded.
    pub async fn authenticate_password(&mut self, user: &str, password: &str) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        self.auth = AuthState::Unauthenticated;

        let accepted = transport
            .authenticate_password(user, password)
            .await
            .map_err(|source| Error::Authentication {
                user: user.to_string(),
                source,
            })?;

        if !accepted {
            tracing::debug!(host = %self.host, user, "password rejected");
            return Err(Error::AuthenticationFailed {
                user: user.to_string(),
            });
        }

        tracing::debug!(host = %self.host, user, "authenticated");
        self.auth = AuthState::Authenticated {
            user: user.to_string(),
        };
        Ok(())
    }

    /// Disconnect the session. Does nothing if already disconnected.
    ///
    /// The connection is released even when the disconnect request fails.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        self.auth = AuthState::Unauthenticated;

        if let Some(sftp) = self.sftp.take() {
            if let Err(e) = sftp.close().await {
                tracing::debug!("SFTP close before disconnect failed: {}", e);
            }
        }

        tracing::debug!(host = %self.host, port = self.port, "disconnecting");
        transport.disconnect().await.map_err(Error::Disconnect)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    /// Name of the authenticated user, if any.
    pub fn user(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticated { user } => Some(user),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn has_sftp(&self) -> bool {
        self.sftp.is_some()
    }

    /// Transport for channel operations; requires an authenticated connection.
    pub(super) fn channel_transport(&mut self) -> Result<&mut T> {
        if !self.is_authenticated() {
            return Err(if self.transport.is_some() {
                Error::NotAuthenticated
            } else {
                Error::NotConnected
            });
        }
        self.transport.as_mut().ok_or(Error::NotConnected)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        let sftp = self.sftp.take();
        let host = std::mem::take(&mut self.host);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    drop(sftp);
                    if let Err(e) = transport.disconnect().await {
                        tracing::warn!("Disconnect from {} during cleanup failed: {}", host, e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    "No async runtime available; dropping connection to {} without disconnect",
                    host
                );
            }
        }
    }
}
