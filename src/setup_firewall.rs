use crate::config::{load_rule_file, AppConfig, RuleFile};
use crate::error::InitProcessError;
use crate::security::conntrack::ConnectionTable;
use crate::security::firewall::{EngineConfig, Firewall, FirewallAction, RuleSet};
use log::{info, warn};

// 設定からルールと状態テーブルを組み立てる
pub fn setup_firewall(config: &AppConfig) -> Result<Firewall, InitProcessError> {
    let rule_file = match &config.rules.path {
        Some(path) => {
            let loaded = load_rule_file(path)
                .map_err(|e| InitProcessError::RuleFileError(format!("{}: {}", path.display(), e)))?;
            info!("ルールを読み込みました: {} ({}件)", path.display(), loaded.rules.len());
            loaded
        }
        None => {
            warn!("ルールファイルが指定されていません。既定ポリシーのみで判定します");
            RuleFile {
                default_action: FirewallAction::Drop,
                rules: RuleSet::new(),
            }
        }
    };

    // 環境変数の既定ポリシーはファイルの指定より優先
    let engine = EngineConfig {
        default_action: config.rules.default_policy.unwrap_or(rule_file.default_action),
    };
    info!("既定ポリシー: {:?}", engine.default_action);

    let firewall = if config.state.enabled {
        let table = ConnectionTable::with_timeouts(config.state.capacity, config.state.timeouts());
        info!("ステートフルモード: 容量={}", table.capacity());
        Firewall::with_state(engine, rule_file.rules, table)
    } else {
        info!("ステートレスモード");
        Firewall::new(engine, rule_file.rules)
    };

    Ok(firewall)
}
