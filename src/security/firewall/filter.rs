use super::rules::{action_to_verdict, FirewallAction, RuleSet, Verdict};
use crate::network::packet::{decode, Direction, NormalizedPacket};
use crate::security::conntrack::{ConnectionStats, ConnectionTable};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

// どのルールにも一致しなかった場合にのみ使われる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub default_action: FirewallAction,
}

pub fn evaluate(
    config: &EngineConfig,
    rules: &RuleSet,
    table: Option<&mut ConnectionTable>,
    packet: &NormalizedPacket,
) -> Verdict {
    evaluate_at(config, rules, table, packet, Instant::now())
}

/// パケットの判定を行う。
///
/// 1. 状態テーブルで確立済みのフローならルールを見ずにAccept
/// 2. ルールを順に評価し、最初に一致したルールのアクション
/// 3. どれにも一致しなければデフォルトアクション
///
/// 判定がAcceptで新規接続ならテーブルに登録する。
pub fn evaluate_at(
    config: &EngineConfig,
    rules: &RuleSet,
    mut table: Option<&mut ConnectionTable>,
    packet: &NormalizedPacket,
    now: Instant,
) -> Verdict {
    if let Some(table) = table.as_deref_mut() {
        if packet.protocol.has_ports() && table.established_at(packet, now) {
            trace!("確立済みの接続です: {}:{} -> {}:{}", packet.src_ip, packet.src_port, packet.dst_ip, packet.dst_port);
            return Verdict::Accept;
        }
    }

    let verdict = match rules.first_match(packet) {
        Some((index, rule)) => {
            trace!("ルール#{}に一致しました: {:?}", index, rule.action);
            action_to_verdict(rule.action)
        }
        // デフォルトポリシー
        None => action_to_verdict(config.default_action),
    };

    if verdict.is_accept() && packet.is_new_connection {
        if let Some(table) = table {
            table.add_at(packet, now);
        }
    }

    verdict
}

/// ルールと状態テーブルをまとめて保持する、ワーカー間で共有可能な判定器。
///
/// 状態テーブルの参照と登録は1つのロックの中で行う。同じ新規接続の
/// パケットが並行して届いた場合は両方がルール評価に回るが、登録は
/// 冪等なので問題にならない。
#[derive(Debug)]
pub struct Firewall {
    config: EngineConfig,
    rules: RuleSet,
    state: Option<Mutex<ConnectionTable>>,
}

impl Firewall {
    pub fn new(config: EngineConfig, rules: RuleSet) -> Self {
        Self {
            config,
            rules,
            state: None,
        }
    }

    pub fn with_state(config: EngineConfig, rules: RuleSet, table: ConnectionTable) -> Self {
        Self {
            config,
            rules,
            state: Some(Mutex::new(table)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn is_stateful(&self) -> bool {
        self.state.is_some()
    }

    pub fn evaluate(&self, packet: &NormalizedPacket) -> Verdict {
        self.evaluate_at(packet, Instant::now())
    }

    pub fn evaluate_at(&self, packet: &NormalizedPacket, now: Instant) -> Verdict {
        match &self.state {
            Some(state) => {
                let mut table = lock(state);
                evaluate_at(&self.config, &self.rules, Some(&mut *table), packet, now)
            }
            None => evaluate_at(&self.config, &self.rules, None, packet, now),
        }
    }

    /// 生のバイト列から判定する。デコードできないパケットは常にDrop
    pub fn verdict_for(&self, data: &[u8], direction: Direction) -> Verdict {
        match decode(data, direction) {
            Ok(packet) => self.evaluate(&packet),
            Err(e) => {
                debug!("不正なパケットを破棄します: {}", e);
                Verdict::Drop
            }
        }
    }

    pub fn purge_expired(&self, now: Instant) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| lock(state).purge_expired(now))
    }

    pub fn reset_state(&self) {
        if let Some(state) = &self.state {
            lock(state).clear();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.state.as_ref().map_or(0, |state| lock(state).len())
    }

    pub fn state_stats(&self) -> Option<ConnectionStats> {
        self.state.as_ref().map(|state| lock(state).stats())
    }
}

// パニックしたワーカーがいてもテーブルは使い続ける
fn lock(state: &Mutex<ConnectionTable>) -> MutexGuard<'_, ConnectionTable> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
