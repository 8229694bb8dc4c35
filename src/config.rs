//! Runtime configuration resolved from the environment.
//!
//! | Variable                      | Default                |
//! |-------------------------------|------------------------|
//! | `CLARKE_NODE_HOST`            | `localhost`            |
//! | `CLARKE_NODE_PORT`            | `8334`                 |
//! | `CLARKE_CONNECT_TIMEOUT_SECS` | `5`                    |
//! | `CLARKE_READ_TIMEOUT_SECS`    | `30`                   |
//! | `CLARKE_WALLET_PATH`          | `~/.clarke/wallet.pem` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8334;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

pub const HOST_ENV: &str = "CLARKE_NODE_HOST";
pub const PORT_ENV: &str = "CLARKE_NODE_PORT";
pub const CONNECT_TIMEOUT_ENV: &str = "CLARKE_CONNECT_TIMEOUT_SECS";
pub const READ_TIMEOUT_ENV: &str = "CLARKE_READ_TIMEOUT_SECS";
pub const WALLET_PATH_ENV: &str = "CLARKE_WALLET_PATH";

/// Connection settings for a [`NodeClient`](crate::node::NodeClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on writing the request, and separately on waiting for
    /// the node to close the connection after it has been written.
    pub read_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Build a config from `CLARKE_*` environment variables.
    ///
    /// Unset variables use defaults. Unparseable or zero values are logged
    /// and ignored rather than treated as fatal.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup(HOST_ENV)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host);

        let port = parse_or(&lookup, PORT_ENV, defaults.port);
        let connect_timeout = parse_or(&lookup, CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT_SECS);
        let read_timeout = parse_or(&lookup, READ_TIMEOUT_ENV, DEFAULT_READ_TIMEOUT_SECS);

        Self {
            host,
            port,
            connect_timeout: Duration::from_secs(connect_timeout),
            read_timeout: Duration::from_secs(read_timeout),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` string accepted by `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a positive number; zero counts as invalid.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + Default + PartialEq + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value != T::default() => value,
            _ => {
                tracing::warn!("Ignoring invalid {}={:?}; using {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

/// Resolve the wallet key file location.
///
/// Resolution order:
/// 1. `$CLARKE_WALLET_PATH`
/// 2. `~/.clarke/wallet.pem`
/// 3. `./.clarke/wallet.pem` (no home directory)
pub fn default_wallet_path() -> PathBuf {
    if let Ok(path) = std::env::var(WALLET_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".clarke").join("wallet.pem");
    }

    PathBuf::from(".clarke").join("wallet.pem")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8334);
        assert_eq!(config.address(), "localhost:8334");
        assert_eq!(config.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = NodeConfig::from_lookup(lookup_from(&[
            (HOST_ENV, "10.0.0.7"),
            (PORT_ENV, "9000"),
            (READ_TIMEOUT_ENV, "2"),
            (CONNECT_TIMEOUT_ENV, "1"),
        ]));

        assert_eq!(config.address(), "10.0.0.7:9000");
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup_invalid_values_fall_back() {
        let config = NodeConfig::from_lookup(lookup_from(&[
            (HOST_ENV, "   "),
            (PORT_ENV, "not-a-port"),
            (READ_TIMEOUT_ENV, "-3"),
        ]));

        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_from_lookup_zero_values_fall_back() {
        let config = NodeConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "0"),
            (READ_TIMEOUT_ENV, "0"),
            (CONNECT_TIMEOUT_ENV, " 0 "),
        ]));

        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_builder_timeouts() {
        let config = NodeConfig::new("node", 1)
            .with_read_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_millis(100));

        assert_eq!(config.address(), "node:1");
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_default_wallet_path_format() {
        let path = default_wallet_path();
        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(
            filename.ends_with(".pem"),
            "Unexpected wallet filename: {}",
            filename
        );
    }
}
