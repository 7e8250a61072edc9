use super::rule_file::parse_default_policy;
use crate::core::error::ConfigError;
use crate::security::conntrack::{Timeouts, DEFAULT_CAPACITY, TCP_TTL, UDP_TTL};
use crate::security::firewall::FirewallAction;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("不明なログ形式です: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub rules: RulesConfig,
    pub state: StateConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub path: Option<PathBuf>,
    // ルールファイルのdefault行より優先される
    pub default_policy: Option<FirewallAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub tcp_ttl: Duration,
    pub udp_ttl: Duration,
    pub sweep_interval: Duration,
}

impl StateConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            tcp: self.tcp_ttl,
            udp: self.udp_ttl,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub interface: Option<String>,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を組み立てる (テストでは環境変数を使わない)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_policy = match lookup("FIREWALL_DEFAULT_POLICY") {
            Some(value) => Some(parse_default_policy(&value).map_err(|e| {
                ConfigError::EnvVarParse(format!("FIREWALL_DEFAULT_POLICY: {}", e))
            })?),
            None => None,
        };

        let workers: usize = parse_or(&lookup, "FIREWALL_WORKERS", 2)?;
        if workers == 0 {
            return Err(ConfigError::EnvVarParse(
                "FIREWALL_WORKERS: 1以上を指定してください".to_string(),
            ));
        }

        Ok(AppConfig {
            rules: RulesConfig {
                path: lookup("FIREWALL_RULES_PATH").map(PathBuf::from),
                default_policy,
            },
            state: StateConfig {
                enabled: parse_or(&lookup, "FIREWALL_STATEFUL", true)?,
                capacity: parse_or(&lookup, "FIREWALL_STATE_CAPACITY", DEFAULT_CAPACITY)?,
                tcp_ttl: Duration::from_secs(parse_or(&lookup, "FIREWALL_TCP_TTL_SECS", TCP_TTL.as_secs())?),
                udp_ttl: Duration::from_secs(parse_or(&lookup, "FIREWALL_UDP_TTL_SECS", UDP_TTL.as_secs())?),
                sweep_interval: Duration::from_secs(parse_or(&lookup, "FIREWALL_SWEEP_SECS", 30u64)?.max(1)),
            },
            network: NetworkConfig {
                interface: lookup("FIREWALL_INTERFACE"),
                workers,
            },
            logging: LoggingConfig {
                format: parse_or(&lookup, "FIREWALL_LOG_FORMAT", LogFormat::Text)?,
                file: lookup("FIREWALL_LOG_FILE").map(PathBuf::from),
            },
        })
    }

    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            rules: RulesConfig {
                path: None,
                default_policy: Some(FirewallAction::Accept),
            },
            state: StateConfig {
                enabled: true,
                capacity: 64,
                tcp_ttl: TCP_TTL,
                udp_ttl: UDP_TTL,
                sweep_interval: Duration::from_secs(1),
            },
            network: NetworkConfig {
                interface: None,
                workers: 1,
            },
            logging: LoggingConfig {
                format: LogFormat::Text,
                file: None,
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::EnvVarParse(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.rules.path.is_none());
        assert!(cfg.rules.default_policy.is_none());
        assert!(cfg.state.enabled);
        assert_eq!(cfg.state.capacity, 4096);
        assert_eq!(cfg.state.timeouts(), Timeouts::default());
        assert_eq!(cfg.network.workers, 2);
        assert_eq!(cfg.logging.format, LogFormat::Text);
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = config(&[
            ("FIREWALL_RULES_PATH", "/etc/rdb-firewall/rules.conf"),
            ("FIREWALL_DEFAULT_POLICY", "Allow"),
            ("FIREWALL_STATEFUL", "false"),
            ("FIREWALL_STATE_CAPACITY", "128"),
            ("FIREWALL_UDP_TTL_SECS", "15"),
            ("FIREWALL_WORKERS", "4"),
            ("FIREWALL_LOG_FORMAT", "json"),
            ("FIREWALL_INTERFACE", "eth1"),
        ])
        .unwrap();
        assert_eq!(cfg.rules.default_policy, Some(FirewallAction::Accept));
        assert!(!cfg.state.enabled);
        assert_eq!(cfg.state.capacity, 128);
        assert_eq!(cfg.state.udp_ttl, Duration::from_secs(15));
        assert_eq!(cfg.state.tcp_ttl, TCP_TTL);
        assert_eq!(cfg.network.workers, 4);
        assert_eq!(cfg.network.interface.as_deref(), Some("eth1"));
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for pair in [
            ("FIREWALL_DEFAULT_POLICY", "maybe"),
            ("FIREWALL_STATE_CAPACITY", "lots"),
            ("FIREWALL_WORKERS", "0"),
            ("FIREWALL_LOG_FORMAT", "xml"),
        ] {
            assert!(matches!(config(&[pair]), Err(ConfigError::EnvVarParse(_))), "{:?}", pair);
        }
    }

    #[test]
    fn testing_config_is_stateful() {
        let cfg = AppConfig::for_testing();
        assert!(cfg.state.enabled);
        assert_eq!(cfg.network.workers, 1);
    }
}
