// ABOUTME: Host profile for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use super::env_value::EnvValue;
use crate::error::{Error, Result};
use crate::ssh::{AlgorithmOptions, SessionConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<EnvValue>,
    #[serde(default)]
    pub algorithms: AlgorithmOptions,
    #[serde(default)]
    pub trust_first_connection: bool,
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub inactivity_timeout: Option<Duration>,
}

fn default_port() -> u16 {
    22
}

impl HostConfig {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = if let Some(at_pos) = s.rfind('@') {
            (Some(&s[..at_pos]), &s[at_pos + 1..])
        } else {
            (None, s)
        };

        let (host, port) = if let Some(colon_pos) = rest.rfind(':') {
            let port_str = &rest[colon_pos + 1..];
            let port = port_str
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| format!("invalid port: {}", port_str))?;
            (&rest[..colon_pos], port)
        } else {
            (rest, 22)
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if user_part.is_some_and(str::is_empty) {
            return Err("user name cannot be empty".to_string());
        }

        Ok(HostConfig {
            host: host.to_string(),
            port,
            user: user_part.map(|s| s.to_string()),
            password: None,
            algorithms: AlgorithmOptions::default(),
            trust_first_connection: false,
            known_hosts: None,
            inactivity_timeout: None,
        })
    }

    /// The login user: configured, else `$USER`, else `root`.
    pub fn user(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()))
    }

    /// Build session settings, resolving the password.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let password = self
            .password
            .as_ref()
            .ok_or_else(|| Error::MissingPassword(self.host.clone()))?
            .resolve()?;

        let mut config = SessionConfig::new(&self.host, self.user())
            .port(self.port)
            .password(password)
            .algorithms(self.algorithms.clone())
            .trust_on_first_use(self.trust_first_connection);

        if let Some(path) = &self.known_hosts {
            config = config.known_hosts_path(path);
        }
        if let Some(timeout) = self.inactivity_timeout {
            config = config.inactivity_timeout(timeout);
        }
        Ok(config)
    }
}
