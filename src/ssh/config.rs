// ABOUTME: Connection settings for establishing an SSH session.
// ABOUTME: Builder-style SessionConfig plus algorithm preferences and callback hooks.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for establishing an SSH session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for password authentication.
    pub user: String,
    /// Password used by [`Session::open`](super::Session::open).
    pub password: Option<String>,
    /// Ordered algorithm preferences; empty lists keep library defaults.
    pub algorithms: AlgorithmOptions,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Idle time after which the transport drops the connection.
    pub inactivity_timeout: Option<Duration>,
    pub hooks: ConnectHooks,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            password: None,
            algorithms: AlgorithmOptions::default(),
            trust_on_first_use: false,
            known_hosts_path: None,
            inactivity_timeout: None,
            hooks: ConnectHooks::default(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn algorithms(mut self, algorithms: AlgorithmOptions) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = Some(timeout);
        self
    }

    pub fn hooks(mut self, hooks: ConnectHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Check the address before any network activity.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be a positive integer".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("algorithms", &self.algorithms)
            .field("trust_on_first_use", &self.trust_on_first_use)
            .field("known_hosts_path", &self.known_hosts_path)
            .field("inactivity_timeout", &self.inactivity_timeout)
            .finish_non_exhaustive()
    }
}

/// Preferred algorithms per negotiation slot, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmOptions {
    #[serde(default)]
    pub kex: Vec<String>,
    #[serde(default)]
    pub hostkey: Vec<String>,
    #[serde(default)]
    pub cipher: Vec<String>,
    #[serde(default)]
    pub mac: Vec<String>,
    #[serde(default)]
    pub compression: Vec<String>,
}

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks invoked by the transport during the connection's lifetime.
#[derive(Clone, Default)]
pub struct ConnectHooks {
    banner: Option<Hook>,
    disconnect: Option<Hook>,
}

impl ConnectHooks {
    /// Called with the pre-authentication banner sent by the server.
    pub fn on_banner(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.banner = Some(Arc::new(hook));
        self
    }

    /// Called with the server's message when it closes the connection.
    pub fn on_disconnect(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.disconnect = Some(Arc::new(hook));
        self
    }

    pub(crate) fn banner(&self, message: &str) {
        if let Some(hook) = &self.banner {
            hook(message);
        }
    }

    pub(crate) fn disconnected(&self, message: &str) {
        if let Some(hook) = &self.disconnect {
            hook(message);
        }
    }
}

impl std::fmt::Debug for ConnectHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectHooks")
            .field("banner", &self.banner.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .finish()
    }
}
