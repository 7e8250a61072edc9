pub mod app_config;
pub mod rule_file;

pub use app_config::{AppConfig, LogFormat};
pub use rule_file::{load_rule_file, parse_rules, RuleFile};
