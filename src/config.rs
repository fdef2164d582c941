//! Provider configuration.
//!
//! Each setting can be given in the provider block or through the
//! environment. Explicit values win; empty strings count as absent.

use std::fmt;

use serde::Deserialize;

use crate::error::{ClientError, ProviderError};
use crate::pool::{ConnectionParams, DEFAULT_SESSION_TIMEOUT_SECS};

/// Fallback for `servers`.
pub const ENV_SERVERS: &str = "ZOOKEEPER_SERVERS";
/// Fallback for `session_timeout`.
pub const ENV_SESSION_TIMEOUT: &str = "ZOOKEEPER_SESSION";
/// Fallback for `username`.
pub const ENV_USERNAME: &str = "ZOOKEEPER_USERNAME";
/// Fallback for `password`.
pub const ENV_PASSWORD: &str = "ZOOKEEPER_PASSWORD";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    servers: Option<String>,
    session_timeout: Option<i64>,
    username: Option<String>,
    password: Option<String>,
}

/// Resolved provider settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Comma-separated `host:port` list.
    pub servers: String,
    /// Session timeout in seconds.
    pub session_timeout_secs: u64,
    /// Digest username.
    pub username: Option<String>,
    /// Digest password.
    pub password: Option<String>,
}

impl ProviderConfig {
    /// Resolve settings from a provider block, falling back to the process
    /// environment.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |name| std::env::var(name).ok())
    }

    /// Resolve settings from a provider block, falling back to `env`.
    pub fn from_value_with_env<F>(value: &serde_json::Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(value.clone())?
        };

        let setting = |explicit: Option<String>, name: &str| {
            non_empty(explicit).or_else(|| non_empty(env(name)))
        };

        let servers = setting(raw.servers, ENV_SERVERS).ok_or_else(|| {
            ProviderError::Configuration(
                "Provider requires at least the 'servers' argument".to_string(),
            )
        })?;

        let session_timeout_secs = match raw.session_timeout {
            Some(secs) => u64::try_from(secs).map_err(|_| {
                ProviderError::Configuration(format!(
                    "session_timeout must not be negative, got {}",
                    secs
                ))
            })?,
            None => match non_empty(env(ENV_SESSION_TIMEOUT)) {
                Some(text) => text.trim().parse().map_err(|_| {
                    ProviderError::Configuration(format!(
                        "{} must be a whole number of seconds, got '{}'",
                        ENV_SESSION_TIMEOUT, text
                    ))
                })?,
                None => DEFAULT_SESSION_TIMEOUT_SECS,
            },
        };

        let username = setting(raw.username, ENV_USERNAME);
        let password = setting(raw.password, ENV_PASSWORD);
        if username.is_some() != password.is_some() {
            return Err(ProviderError::Configuration(
                ClientError::IncompleteCredentials.to_string(),
            ));
        }

        Ok(Self {
            servers,
            session_timeout_secs,
            username,
            password,
        })
    }

    /// The pool parameters for these settings.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            servers: self.servers.clone(),
            session_timeout_secs: self.session_timeout_secs,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("servers", &self.servers)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let config = ProviderConfig::from_value_with_env(
            &json!({
                "servers": "zk1:2181,zk2:2181",
                "session_timeout": 10,
                "username": "foo",
                "password": "bar"
            }),
            env(&[(ENV_SERVERS, "ignored:2181")]),
        )
        .unwrap();

        assert_eq!(config.servers, "zk1:2181,zk2:2181");
        assert_eq!(config.session_timeout_secs, 10);
        assert_eq!(config.username.as_deref(), Some("foo"));
        assert_eq!(config.password.as_deref(), Some("bar"));
    }

    #[test]
    fn test_environment_fallback() {
        let config = ProviderConfig::from_value_with_env(
            &json!({ "servers": "" }),
            env(&[
                (ENV_SERVERS, "localhost:2181"),
                (ENV_SESSION_TIMEOUT, "45"),
                (ENV_USERNAME, "foo"),
                (ENV_PASSWORD, "bar"),
            ]),
        )
        .unwrap();

        assert_eq!(config.servers, "localhost:2181");
        assert_eq!(config.session_timeout_secs, 45);
        assert_eq!(config.username.as_deref(), Some("foo"));
    }

    #[test]
    fn test_defaults() {
        let config =
            ProviderConfig::from_value_with_env(&json!({ "servers": "localhost:2181" }), env(&[]))
                .unwrap();
        assert_eq!(config.session_timeout_secs, 30);
        assert_eq!(config.username, None);
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_missing_servers() {
        let err =
            ProviderConfig::from_value_with_env(&serde_json::Value::Null, env(&[])).unwrap_err();
        assert_eq!(
            err.message(),
            "Provider requires at least the 'servers' argument"
        );
    }

    #[test]
    fn test_bad_session_timeout() {
        let err = ProviderConfig::from_value_with_env(
            &json!({ "servers": "localhost:2181" }),
            env(&[(ENV_SESSION_TIMEOUT, "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::from_value_with_env(
            &json!({ "servers": "localhost:2181", "session_timeout": -1 }),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_one_sided_credentials() {
        let err = ProviderConfig::from_value_with_env(
            &json!({ "servers": "localhost:2181", "username": "foo" }),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_connection_params_and_redaction() {
        let config = ProviderConfig::from_value_with_env(
            &json!({ "servers": "localhost:2181", "username": "foo", "password": "hunter2" }),
            env(&[]),
        )
        .unwrap();
        let params = config.connection_params();
        assert_eq!(params.servers, "localhost:2181");
        assert_eq!(params.session_timeout_secs, 30);
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
