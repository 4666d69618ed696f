// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory of the redb database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `NETWORK` | Ledger network (`LIVE`, `BETA`, `DEV`, `LOCAL`) | `LOCAL` |
//! | `NODE_BASE_URL` | Ledger node base URL | Required |
//! | `WORK_BASE_URL` | Proof-of-work service base URL | Required |
//! | `WALLET_MASTER_KEY` | 32-byte hex key wrapping wallet keys | Required |
//! | `NOTIFICATION_CALLBACK_URL` | Webhook receiving account entries | Unset (no delivery) |
//! | `NOTIFICATION_HEADER_KEY` | Static header name sent to the webhook | Unset |
//! | `NOTIFICATION_HEADER_VALUE` | Static header value sent to the webhook | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use url::Url;

use crate::ledger::Network;
use crate::vault::EncryptionKey;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const NETWORK_ENV: &str = "NETWORK";
pub const NODE_BASE_URL_ENV: &str = "NODE_BASE_URL";
pub const WORK_BASE_URL_ENV: &str = "WORK_BASE_URL";
/// Never logged.
pub const WALLET_MASTER_KEY_ENV: &str = "WALLET_MASTER_KEY";
pub const NOTIFICATION_CALLBACK_URL_ENV: &str = "NOTIFICATION_CALLBACK_URL";
pub const NOTIFICATION_HEADER_KEY_ENV: &str = "NOTIFICATION_HEADER_KEY";
pub const NOTIFICATION_HEADER_VALUE_ENV: &str = "NOTIFICATION_HEADER_VALUE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub callback_url: Option<Url>,
    pub header: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub network: Network,
    pub node_base_url: Url,
    pub work_base_url: Url,
    pub master_key: EncryptionKey,
    pub notification: NotificationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match get(PORT_ENV) {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: HOST_ENV,
                reason: e.to_string(),
            })?;

        let network = match get(NETWORK_ENV) {
            Some(network) => network.parse().map_err(|e: crate::error::WalletError| {
                ConfigError::Invalid {
                    var: NETWORK_ENV,
                    reason: e.to_string(),
                }
            })?,
            None => Network::Local,
        };

        let node_base_url = parse_url(NODE_BASE_URL_ENV, get(NODE_BASE_URL_ENV))?;
        let work_base_url = parse_url(WORK_BASE_URL_ENV, get(WORK_BASE_URL_ENV))?;

        let master_key = get(WALLET_MASTER_KEY_ENV)
            .ok_or(ConfigError::Missing(WALLET_MASTER_KEY_ENV))?
            .parse::<EncryptionKey>()
            .map_err(|_| ConfigError::Invalid {
                var: WALLET_MASTER_KEY_ENV,
                reason: "expected 32 bytes of hex".to_string(),
            })?;

        let callback_url = get(NOTIFICATION_CALLBACK_URL_ENV)
            .map(|url| parse_url(NOTIFICATION_CALLBACK_URL_ENV, Some(url)))
            .transpose()?;
        let header = match (
            get(NOTIFICATION_HEADER_KEY_ENV),
            get(NOTIFICATION_HEADER_VALUE_ENV),
        ) {
            (Some(key), Some(value)) => Some((key, value)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(NOTIFICATION_HEADER_VALUE_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(NOTIFICATION_HEADER_KEY_ENV)),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            network,
            node_base_url,
            work_base_url,
            master_key,
            notification: NotificationConfig {
                callback_url,
                header,
            },
        })
    }
}

fn parse_url(var: &'static str, value: Option<String>) -> Result<Url, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(var))?;
    let url = Url::parse(&value).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (NODE_BASE_URL_ENV, "http://node:7076"),
            (WORK_BASE_URL_ENV, "http://work:7077"),
            (WALLET_MASTER_KEY_ENV, KEY),
        ]
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_unset() {
        let config = load(&required()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.network, Network::Local);
        assert_eq!(config.notification.callback_url, None);
        assert_eq!(config.notification.header, None);
    }

    #[test]
    fn reads_every_variable() {
        let mut vars = required();
        vars.extend([
            (DATA_DIR_ENV, "/tmp/wallets"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (NETWORK_ENV, "beta"),
            (NOTIFICATION_CALLBACK_URL_ENV, "https://hooks.example/entries"),
            (NOTIFICATION_HEADER_KEY_ENV, "X-Token"),
            (NOTIFICATION_HEADER_VALUE_ENV, "secret"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/wallets"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.network, Network::Beta);
        assert_eq!(
            config.notification.callback_url.unwrap().as_str(),
            "https://hooks.example/entries"
        );
        assert_eq!(
            config.notification.header,
            Some(("X-Token".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn missing_master_key_is_an_error() {
        let vars: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| *k != WALLET_MASTER_KEY_ENV)
            .collect();
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing(WALLET_MASTER_KEY_ENV))
        ));

        let mut vars = vars;
        vars.push((WALLET_MASTER_KEY_ENV, "   "));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing(WALLET_MASTER_KEY_ENV))
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            (WALLET_MASTER_KEY_ENV, "abcd"),
            (NODE_BASE_URL_ENV, "not a url"),
            (WORK_BASE_URL_ENV, "ftp://work"),
            (PORT_ENV, "eighty"),
            (NETWORK_ENV, "mainnet"),
        ];
        for (var, value) in cases {
            let mut vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != var).collect();
            vars.push((var, value));
            assert!(
                matches!(load(&vars), Err(ConfigError::Invalid { .. })),
                "{var}={value} should be invalid"
            );
        }
    }

    #[test]
    fn header_key_requires_value() {
        let mut vars = required();
        vars.push((NOTIFICATION_HEADER_KEY_ENV, "X-Token"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing(NOTIFICATION_HEADER_VALUE_ENV))
        ));
    }
}
