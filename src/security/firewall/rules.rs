use crate::network::packet::{Ipv4Token, NormalizedPacket, PortToken, Protocol};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirewallAction {
    // 未設定のアクションは常にDropとして扱われる
    #[default]
    Unspecified,
    Accept,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accept,
    Drop,
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accept => "ALLOW",
            Verdict::Drop => "DENY",
        }
    }
}

// 明示的なAccept以外はすべてDrop (fail-closed)
pub fn action_to_verdict(action: FirewallAction) -> Verdict {
    match action {
        FirewallAction::Accept => Verdict::Accept,
        FirewallAction::Drop | FirewallAction::Unspecified => Verdict::Drop,
    }
}

/// ルールの照合条件。`None` のフィールドは常に一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleMatch {
    pub protocol: Protocol,
    pub src_ip: Option<Ipv4Token>,
    pub dst_ip: Option<Ipv4Token>,
    pub src_port: Option<PortToken>,
    pub dst_port: Option<PortToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FirewallRule {
    pub conditions: RuleMatch,
    pub action: FirewallAction,
}

impl FirewallRule {
    pub fn new(conditions: RuleMatch, action: FirewallAction) -> Self {
        Self { conditions, action }
    }

    /// パケットがこのルールの条件をすべて満たすか。
    ///
    /// ポート条件はパケットがTCP/UDPの場合にだけ評価される。ICMPや
    /// その他のプロトコルのパケットでは、ルールがポートを指定していても
    /// その条件は読み飛ばされる (意図した仕様)。
    pub fn matches(&self, packet: &NormalizedPacket) -> bool {
        let cond = &self.conditions;

        if cond.protocol != Protocol::Any && cond.protocol != packet.protocol {
            return false;
        }
        if !field_matches(cond.src_ip, packet.src_ip) {
            return false;
        }
        if !field_matches(cond.dst_ip, packet.dst_ip) {
            return false;
        }

        if packet.protocol.has_ports() {
            if !field_matches(cond.src_port, packet.src_port) {
                return false;
            }
            if !field_matches(cond.dst_port, packet.dst_port) {
                return false;
            }
        }

        true
    }
}

fn field_matches<T: PartialEq>(expected: Option<T>, actual: T) -> bool {
    expected.map_or(true, |value| value == actual)
}

/// 評価順を保持するルール列。先に一致したルールが優先される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<FirewallRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    // 末尾に追加する (優先度による並べ替えはしない)
    pub fn add_rule(&mut self, rule: FirewallRule) {
        self.rules.push(rule);
    }

    pub fn get_rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 最初に一致したルールの位置とルール
    pub fn first_match(&self, packet: &NormalizedPacket) -> Option<(usize, &FirewallRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(packet))
    }
}

impl From<Vec<FirewallRule>> for RuleSet {
    fn from(rules: Vec<FirewallRule>) -> Self {
        Self { rules }
    }
}

impl FromIterator<FirewallRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = FirewallRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::packet::Direction;
    use std::net::Ipv4Addr;

    fn packet(protocol: Protocol, dst_port: u16) -> NormalizedPacket {
        NormalizedPacket {
            direction: Direction::Inbound,
            protocol,
            src_ip: Ipv4Addr::new(192, 168, 1, 5).into(),
            dst_ip: Ipv4Addr::new(192, 168, 1, 1).into(),
            src_port: PortToken::from_host(if protocol.has_ports() { 51000 } else { 0 }),
            dst_port: PortToken::from_host(if protocol.has_ports() { dst_port } else { 0 }),
            is_new_connection: false,
        }
    }

    #[test]
    fn empty_match_accepts_everything() {
        let rule = FirewallRule::new(RuleMatch::default(), FirewallAction::Drop);
        for proto in [Protocol::Any, Protocol::Tcp, Protocol::Udp, Protocol::Icmp] {
            assert!(rule.matches(&packet(proto, 80)));
        }
    }

    #[test]
    fn protocol_must_be_equal_unless_any() {
        let rule = FirewallRule::new(
            RuleMatch {
                protocol: Protocol::Udp,
                ..RuleMatch::default()
            },
            FirewallAction::Accept,
        );
        assert!(rule.matches(&packet(Protocol::Udp, 53)));
        assert!(!rule.matches(&packet(Protocol::Tcp, 53)));
        assert!(!rule.matches(&packet(Protocol::Icmp, 0)));
    }

    #[test]
    fn addresses_are_checked_independently() {
        let pkt = packet(Protocol::Tcp, 80);
        let by_src = FirewallRule::new(
            RuleMatch {
                src_ip: Some(pkt.src_ip),
                ..RuleMatch::default()
            },
            FirewallAction::Accept,
        );
        assert!(by_src.matches(&pkt));
        assert!(!by_src.matches(&pkt.reversed()));

        let by_both = FirewallRule::new(
            RuleMatch {
                src_ip: Some(pkt.src_ip),
                dst_ip: Some(Ipv4Addr::new(8, 8, 8, 8).into()),
                ..RuleMatch::default()
            },
            FirewallAction::Accept,
        );
        assert!(!by_both.matches(&pkt));
    }

    #[test]
    fn port_conditions_only_apply_to_tcp_and_udp() {
        let rule = FirewallRule::new(
            RuleMatch {
                dst_port: Some(PortToken::from_host(22)),
                ..RuleMatch::default()
            },
            FirewallAction::Drop,
        );
        assert!(rule.matches(&packet(Protocol::Tcp, 22)));
        assert!(!rule.matches(&packet(Protocol::Tcp, 80)));
        assert!(!rule.matches(&packet(Protocol::Udp, 80)));
        // ICMPやその他プロトコルではポート条件は無視される
        assert!(rule.matches(&packet(Protocol::Icmp, 0)));
        assert!(rule.matches(&packet(Protocol::Any, 0)));
    }

    #[test]
    fn unspecified_action_fails_closed() {
        assert_eq!(action_to_verdict(FirewallAction::Accept), Verdict::Accept);
        assert_eq!(action_to_verdict(FirewallAction::Drop), Verdict::Drop);
        assert_eq!(action_to_verdict(FirewallAction::Unspecified), Verdict::Drop);
        assert_eq!(action_to_verdict(FirewallAction::default()), Verdict::Drop);
    }

    #[test]
    fn first_match_reports_earliest_index() {
        let rules: RuleSet = vec![
            FirewallRule::new(
                RuleMatch {
                    protocol: Protocol::Icmp,
                    ..RuleMatch::default()
                },
                FirewallAction::Accept,
            ),
            FirewallRule::new(RuleMatch::default(), FirewallAction::Drop),
            FirewallRule::new(RuleMatch::default(), FirewallAction::Accept),
        ]
        .into();
        let (idx, rule) = rules.first_match(&packet(Protocol::Tcp, 80)).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(rule.action, FirewallAction::Drop);
        assert_eq!(rules.first_match(&packet(Protocol::Icmp, 0)).unwrap().0, 0);
    }
}
