//! Process configuration from the environment.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const AGENT_URL: &str = "A2A_SERVER_URL";
pub const AGENT_PORT: &str = "A2A_SERVER_PORT";
pub const DATA_DIR: &str = "RELAY_DATA_DIR";
pub const LISTEN_ADDR: &str = "RELAY_LISTEN_ADDR";
pub const REQUEST_TIMEOUT: &str = "RELAY_REQUEST_TIMEOUT_SECS";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7123";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("either {AGENT_URL} or {AGENT_PORT} must be set")]
    MissingAgent,
    #[error("invalid {key} {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the remote agent.
    pub agent_url: String,
    /// Base directory for durable data.
    pub data_dir: PathBuf,
    pub listen_addr: SocketAddr,
    /// Timeout for request/response agent calls.
    pub request_timeout: Duration,
}

impl Config {
    /// Load from the process environment, after seeding it from `.env`.
    ///
    /// # Errors
    /// Returns error if a variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse configuration from a variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    /// Returns error if a variable is missing or malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let agent_url = match (get(AGENT_URL), get(AGENT_PORT)) {
            (Some(url), _) => url,
            (None, Some(port)) => {
                let port: u16 = parse(AGENT_PORT, &port)?;
                format!("http://localhost:{port}")
            }
            (None, None) => return Err(ConfigError::MissingAgent),
        };

        let data_dir = get(DATA_DIR).map_or_else(|| PathBuf::from("."), PathBuf::from);

        let listen_addr = parse(
            LISTEN_ADDR,
            &get(LISTEN_ADDR).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        )?;

        let request_timeout = match get(REQUEST_TIMEOUT) {
            Some(secs) => Duration::from_secs(parse(REQUEST_TIMEOUT, &secs)?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            agent_url,
            data_dir,
            listen_addr,
            request_timeout,
        })
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_from_port() {
        let config = load(&[(AGENT_PORT, "41242")]).unwrap();

        assert_eq!(
            config,
            Config {
                agent_url: "http://localhost:41242".into(),
                data_dir: PathBuf::from("."),
                listen_addr: "127.0.0.1:7123".parse().unwrap(),
                request_timeout: Duration::from_secs(120),
            }
        );
    }

    #[test]
    fn test_url_wins_over_port() {
        let config = load(&[
            (AGENT_URL, "https://agent.example.com"),
            (AGENT_PORT, "1"),
            (DATA_DIR, "/var/lib/relay"),
            (LISTEN_ADDR, "0.0.0.0:8080"),
            (REQUEST_TIMEOUT, "5"),
        ])
        .unwrap();

        assert_eq!(config.agent_url, "https://agent.example.com");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/relay"));
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_agent() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingAgent)));
        assert!(matches!(
            load(&[(AGENT_URL, "  ")]),
            Err(ConfigError::MissingAgent)
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[(AGENT_PORT, "seventy")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: AGENT_PORT, .. }));

        let err = load(&[(AGENT_PORT, "80"), (LISTEN_ADDR, "nowhere")]).unwrap_err();
        assert!(err.to_string().contains("RELAY_LISTEN_ADDR"), "{err}");

        let err = load(&[(AGENT_PORT, "80"), (REQUEST_TIMEOUT, "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: REQUEST_TIMEOUT, .. }));
    }
}
