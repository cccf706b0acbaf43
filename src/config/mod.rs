// ABOUTME: Hosts file (sshkit.yml) parsing and host lookup.
// ABOUTME: Named host profiles, user@host shorthand, and password sources.

mod env_value;
mod host;

pub use env_value::EnvValue;
pub use host::HostConfig;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "sshkit.yml";
pub const CONFIG_FILENAME_ALT: &str = "sshkit.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".sshkit/config.yml";

/// Environment variable consulted for the password of hosts given on the command line.
pub const PASSWORD_ENV: &str = "SSHKIT_PASSWORD";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub hosts: HashMap<String, HostConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("using hosts file {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like [`Config::discover`], but an absent file yields an empty config.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Look up a named host, falling back to `user@host[:port]` shorthand.
    ///
    /// Shorthand hosts take their password from `SSHKIT_PASSWORD`.
    pub fn resolve_host(&self, name: &str) -> Result<HostConfig> {
        if let Some(host) = self.hosts.get(name) {
            return Ok(host.clone());
        }

        if !name.contains('@') {
            return Err(Error::UnknownHost(name.to_string()));
        }

        let mut host = HostConfig::parse(name).map_err(Error::InvalidConfig)?;
        host.password = Some(EnvValue::FromEnv {
            var: PASSWORD_ENV.to_string(),
            default: None,
        });
        Ok(host)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Simple(String),
    Detailed(HostConfig),
}

impl HostEntry {
    fn into_host_config(self) -> std::result::Result<HostConfig, String> {
        match self {
            HostEntry::Simple(s) => HostConfig::parse(&s),
            HostEntry::Detailed(c) => Ok(c),
        }
    }
}

fn deserialize_hosts<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, HostConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries: HashMap<String, HostEntry> = HashMap::deserialize(deserializer)?;
    entries
        .into_iter()
        .map(|(name, entry)| {
            entry
                .into_host_config()
                .map(|host| (name.clone(), host))
                .map_err(|e| serde::de::Error::custom(format!("host {}: {}", name, e)))
        })
        .collect()
}
