//! Startup configuration loaded from a TOML file

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::delivery::{DeliveryError, DkimKeyError, RelayTarget};
use crate::relay::Role;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing value for {0}")]
    Missing(&'static str),

    #[error("cannot load DKIM key {}: {source}", path.display())]
    DkimKey {
        path: PathBuf,
        #[source]
        source: DkimKeyError,
    },

    #[error("cannot initialise DNS resolver: {0}")]
    Resolver(#[source] DeliveryError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub role: Role,
    /// Name used in the greeting and in EHLO to the next hop. Defaults to
    /// `server.domain`.
    #[serde(default)]
    pub hostname: Option<String>,
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Present only when signing is enabled
    #[serde(default)]
    pub dkim: Option<DkimConfig>,
}

/// Listener and shielded domain
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    pub domain: String,
}

/// The real mailbox hidden behind the shielded domain
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    /// Port used when talking to exchangers in relay role
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub address: String,
    /// Read for the relay address when `address` is empty
    pub address_file: Option<PathBuf>,
    pub bind: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            address_file: None,
            bind: default_bind(),
            port: 2525,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DkimConfig {
    pub selector: String,
    pub key_file: PathBuf,
    #[serde(default)]
    pub sign_inbound: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    25
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.domain.trim().is_empty() {
            return Err(ConfigError::Missing("server.domain"));
        }
        if self.remote.host.trim().is_empty() {
            return Err(ConfigError::Missing("remote.host"));
        }
        if self.remote.user.trim().is_empty() {
            return Err(ConfigError::Missing("remote.user"));
        }
        if let Some(dkim) = &self.dkim {
            if dkim.selector.trim().is_empty() {
                return Err(ConfigError::Missing("dkim.selector"));
            }
        }
        if self.role == Role::Server
            && self.relay.address.trim().is_empty()
            && self.relay.address_file.is_none()
        {
            return Err(ConfigError::Missing("relay.address"));
        }
        Ok(())
    }

    pub fn hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.server.domain)
    }

    /// Address the listener binds for the configured role
    pub fn listen_addr(&self) -> String {
        match self.role {
            Role::Server => format!("{}:{}", self.server.bind, self.server.port),
            Role::Relay => format!("{}:{}", self.relay.bind, self.relay.port),
        }
    }

    /// The private relay, from `relay.address` or the first line of
    /// `relay.address_file`
    pub fn relay_target(&self) -> Result<RelayTarget, ConfigError> {
        let address = self.relay.address.trim();
        if !address.is_empty() {
            return Ok(RelayTarget::new(address, self.relay.port));
        }

        let Some(path) = &self.relay.address_file else {
            return Err(ConfigError::Missing("relay.address"));
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let address = text.lines().next().unwrap_or("").trim();
        if address.is_empty() {
            return Err(ConfigError::Missing("relay.address"));
        }
        Ok(RelayTarget::new(address, self.relay.port))
    }
}
