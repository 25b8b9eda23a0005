use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, de::DeserializeOwned};

use crate::{error::ConfigError, protocol::DEFAULT_READ_BUFFER_SIZE};

pub const DEFAULT_PORT: u16 = 12347;
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BACKLOG: u32 = 10;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;

/// Settings for the relay server. Every field may be omitted from a config
/// file, in which case the default applies.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on bytes consumed by a single line read.
    pub read_buffer_size: usize,
    pub backlog: u32,
    /// How long one send may block before the receiving peer is dropped.
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            backlog: DEFAULT_BACKLOG,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_buffer(self.read_buffer_size)?;
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog must be at least 1".into()));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "write_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub read_buffer_size: usize,
    /// Name to join with; asked for on stdin when absent.
    pub name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CLIENT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            name: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_buffer(self.read_buffer_size)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn validate_buffer(size: usize) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::Invalid(
            "read_buffer_size must be at least 1".into(),
        ));
    }
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_setup() {
        let server = ServerConfig::default();
        assert_eq!(server.address(), "0.0.0.0:12347");
        assert_eq!(server.read_buffer_size, 1024);
        assert_eq!(server.backlog, 10);
        assert!(server.validate().is_ok());

        let client = ClientConfig::default();
        assert_eq!(client.address(), "127.0.0.1:12347");
        assert_eq!(client.name, None);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{ "port": 9000, "read_buffer_size": 64 }"#).expect("parse");

        assert_eq!(config.port, 9000);
        assert_eq!(config.read_buffer_size, 64);
        assert_eq!(config.host, DEFAULT_SERVER_HOST);
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ClientConfig>(r#"{ "nick": "alice" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn zero_sizes_are_invalid() {
        let server = ServerConfig {
            read_buffer_size: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(server.validate(), Err(ConfigError::Invalid(_))));

        let server = ServerConfig {
            backlog: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(server.validate(), Err(ConfigError::Invalid(_))));

        let client = ClientConfig {
            read_buffer_size: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(client.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("/definitely/not/here/relay.json");
        match ServerConfig::load(path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
