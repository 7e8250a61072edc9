use crate::core::error::ConfigError;
use crate::network::packet::{Ipv4Token, PortToken, Protocol};
use crate::security::firewall::{FirewallAction, FirewallRule, RuleMatch, RuleSet};
use std::net::Ipv4Addr;
use std::path::Path;

// ルールファイルの書式 (1行1ルール、#以降はコメント):
//
//   default allow|deny
//   allow|deny|drop [tcp|udp|icmp|any] [PORT[/tcp|/udp|/icmp]] [from IP|any] [to IP|any]
//
// 例:
//   default deny
//   allow tcp 22 from 10.0.0.5
//   allow 53/udp to 10.0.0.1
//   deny icmp

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFile {
    pub default_action: FirewallAction,
    pub rules: RuleSet,
}

pub fn load_rule_file(path: impl AsRef<Path>) -> Result<RuleFile, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_rules(&text)
}

/// ルールをファイル順のまま読み込む。
///
/// 1行でも不正な行があれば全体を失敗させる。`default` 行がなければ
/// デフォルトアクションはDrop。
pub fn parse_rules(text: &str) -> Result<RuleFile, ConfigError> {
    let mut default_action = FirewallAction::Drop;
    let mut rules = RuleSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("");
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        let parse_error = |reason: String| ConfigError::Parse {
            line: index + 1,
            reason,
        };

        match parse_line(&tokens).map_err(parse_error)? {
            Line::Default(action) => default_action = action,
            Line::Rule(rule) => rules.add_rule(rule),
        }
    }

    Ok(RuleFile {
        default_action,
        rules,
    })
}

enum Line {
    Default(FirewallAction),
    Rule(FirewallRule),
}

fn parse_line(tokens: &[&str]) -> Result<Line, String> {
    let mut iter = tokens.iter().map(|t| t.to_ascii_lowercase()).peekable();

    let head = iter.next().ok_or_else(|| "空の行です".to_string())?;
    if head == "default" {
        let policy = iter
            .next()
            .ok_or_else(|| "defaultにポリシーがありません".to_string())?;
        return parse_policy(&policy).map(Line::Default);
    }

    let action = match head.as_str() {
        "allow" => FirewallAction::Accept,
        "deny" | "drop" => FirewallAction::Drop,
        other => return Err(format!("不明なアクションです: {}", other)),
    };

    let mut conditions = RuleMatch::default();

    // プロトコル (省略可)
    if let Some(protocol) = iter.peek().and_then(|t| parse_protocol(t)) {
        conditions.protocol = protocol;
        iter.next();
    }

    // 宛先ポート (省略可)
    if let Some(token) = iter.next_if(|t| t != "from" && t != "to") {
        let (port, protocol) = parse_port(&token)?;
        conditions.dst_port = Some(port);
        if let Some(protocol) = protocol {
            conditions.protocol = protocol;
        }
    }

    while let Some(token) = iter.next() {
        let address = iter
            .next()
            .ok_or_else(|| format!("{}にアドレスがありません", token))?;
        let address = parse_address(&address)?;
        match token.as_str() {
            "from" => conditions.src_ip = address,
            "to" => conditions.dst_ip = address,
            other => return Err(format!("不明なキーワードです: {}", other)),
        }
    }

    Ok(Line::Rule(FirewallRule::new(conditions, action)))
}

fn parse_policy(token: &str) -> Result<FirewallAction, String> {
    match token {
        "allow" => Ok(FirewallAction::Accept),
        "deny" => Ok(FirewallAction::Drop),
        other => Err(format!("不明なポリシーです: {}", other)),
    }
}

pub fn parse_default_policy(token: &str) -> Result<FirewallAction, String> {
    parse_policy(&token.trim().to_ascii_lowercase())
}

fn parse_protocol(token: &str) -> Option<Protocol> {
    match token {
        "tcp" => Some(Protocol::Tcp),
        "udp" => Some(Protocol::Udp),
        "icmp" => Some(Protocol::Icmp),
        "any" => Some(Protocol::Any),
        _ => None,
    }
}

fn parse_port(token: &str) -> Result<(PortToken, Option<Protocol>), String> {
    let (number, protocol) = match token.split_once('/') {
        Some((number, suffix)) => match parse_protocol(suffix) {
            Some(Protocol::Any) | None => {
                return Err(format!("不明なプロトコルです: {}", suffix));
            }
            protocol => (number, protocol),
        },
        None => (token, None),
    };

    let port: u16 = number
        .parse()
        .map_err(|_| format!("無効なポート番号です: {}", number))?;
    if port == 0 {
        return Err("ポート番号0は指定できません".to_string());
    }

    Ok((PortToken::from_host(port), protocol))
}

fn parse_address(token: &str) -> Result<Option<Ipv4Token>, String> {
    if token == "any" {
        return Ok(None);
    }
    token
        .parse::<Ipv4Addr>()
        .map(|addr| Some(Ipv4Token::from(addr)))
        .map_err(|e| format!("無効なIPv4アドレスです: {} ({})", token, e))
}
