use super::key::ConnectionKey;
use crate::network::packet::{NormalizedPacket, Protocol};
use log::{debug, trace};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 4096;
pub const TCP_TTL: Duration = Duration::from_secs(300);
pub const UDP_TTL: Duration = Duration::from_secs(60);

// プロトコルごとのアイドルタイムアウト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub tcp: Duration,
    pub udp: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            tcp: TCP_TTL,
            udp: UDP_TTL,
        }
    }
}

impl Timeouts {
    pub fn for_protocol(&self, protocol: Protocol) -> Duration {
        match protocol {
            Protocol::Tcp => self.tcp,
            _ => self.udp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub key: ConnectionKey,
    pub last_seen: Instant,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Occupied(ConnectionEntry),
    // 削除済み。探索はここで止まらない
    Tombstone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionStats {
    pub hits: u64,
    pub misses: u64,
    pub inserted: u64,
    pub refreshed: u64,
    pub expired: u64,
    pub rejected_full: u64,
}

enum Probe {
    Found(usize),
    Vacant(usize),
    Exhausted,
}

/// 固定容量の接続状態テーブル。
///
/// オープンアドレス法 (線形探索) で正規化キーを保持する。期限切れのエントリは
/// 探索中に見つかった時点でトゥームストーンに置き換えるため、その先に
/// 置かれた別のキーへの探索列は途切れない。トゥームストーンが容量の1/4を
/// 超えたら生きているエントリだけで再配置する。
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Slot>,
    len: usize,
    tombstones: usize,
    timeouts: Timeouts,
    stats: ConnectionStats,
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConnectionTable {
    pub fn new(capacity: usize) -> Self {
        Self::with_timeouts(capacity, Timeouts::default())
    }

    pub fn with_timeouts(capacity: usize, timeouts: Timeouts) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity.max(1)],
            len: 0,
            tombstones: 0,
            timeouts,
            stats: ConnectionStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        })
    }

    pub fn established(&mut self, packet: &NormalizedPacket) -> bool {
        self.established_at(packet, Instant::now())
    }

    /// パケットのフローが確立済みかどうか。
    ///
    /// 一致したエントリのタイムスタンプは `now` に更新される。探索中に
    /// 見つかった期限切れエントリはその場で削除される。
    pub fn established_at(&mut self, packet: &NormalizedPacket, now: Instant) -> bool {
        let Some(key) = ConnectionKey::from_packet(packet) else {
            return false;
        };

        let found = match self.probe(&key, now) {
            Probe::Found(idx) => {
                self.touch(idx, now);
                self.stats.hits += 1;
                true
            }
            Probe::Vacant(_) | Probe::Exhausted => {
                self.stats.misses += 1;
                false
            }
        };

        self.maybe_compact(now);
        found
    }

    pub fn add(&mut self, packet: &NormalizedPacket) {
        self.add_at(packet, Instant::now())
    }

    /// フローを登録する。登録済みならタイムスタンプの更新のみ。
    ///
    /// テーブルが満杯の場合は何もしない。そのフローは以後もルール評価に回る。
    pub fn add_at(&mut self, packet: &NormalizedPacket, now: Instant) {
        let Some(key) = ConnectionKey::from_packet(packet) else {
            return;
        };

        match self.probe(&key, now) {
            Probe::Found(idx) => {
                self.touch(idx, now);
                self.stats.refreshed += 1;
            }
            Probe::Vacant(idx) if self.len < self.capacity() => {
                if let Slot::Tombstone = self.slots[idx] {
                    self.tombstones -= 1;
                }
                self.slots[idx] = Slot::Occupied(ConnectionEntry { key, last_seen: now });
                self.len += 1;
                self.stats.inserted += 1;
                trace!("接続を登録しました: {}", key);
            }
            Probe::Vacant(_) | Probe::Exhausted => {
                self.stats.rejected_full += 1;
                debug!("接続テーブルが満杯のため登録を見送りました: {}", key);
            }
        }

        self.maybe_compact(now);
    }

    /// 期限切れのエントリをすべて削除し、削除数を返す
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        for idx in 0..self.slots.len() {
            if let Slot::Occupied(entry) = self.slots[idx] {
                if self.is_expired(&entry, now) {
                    self.bury(idx);
                    removed += 1;
                }
            }
        }
        self.maybe_compact(now);
        removed
    }

    pub fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
        self.len = 0;
        self.tombstones = 0;
    }

    fn home(&self, key: &ConnectionKey) -> usize {
        key.hash() as usize % self.slots.len()
    }

    // 空きスロットに当たるまで線形探索する。トゥームストーンは飛ばすが、
    // 最初に見つけた再利用可能な位置は覚えておく
    fn probe(&mut self, key: &ConnectionKey, now: Instant) -> Probe {
        let cap = self.slots.len();
        let start = self.home(key);
        let mut reusable = None;

        for step in 0..cap {
            let idx = (start + step) % cap;
            match self.slots[idx] {
                Slot::Empty => return Probe::Vacant(reusable.unwrap_or(idx)),
                Slot::Tombstone => {
                    reusable.get_or_insert(idx);
                }
                Slot::Occupied(entry) => {
                    if self.is_expired(&entry, now) {
                        self.bury(idx);
                        if entry.key == *key {
                            // キーは一意なのでこの先を探す必要はない
                            return Probe::Vacant(reusable.unwrap_or(idx));
                        }
                        reusable.get_or_insert(idx);
                    } else if entry.key == *key {
                        return Probe::Found(idx);
                    }
                }
            }
        }

        reusable.map_or(Probe::Exhausted, Probe::Vacant)
    }

    fn touch(&mut self, idx: usize, now: Instant) {
        if let Slot::Occupied(entry) = &mut self.slots[idx] {
            entry.last_seen = entry.last_seen.max(now);
        }
    }

    fn bury(&mut self, idx: usize) {
        if let Slot::Occupied(entry) = self.slots[idx] {
            trace!("期限切れの接続を削除しました: {}", entry.key);
            self.slots[idx] = Slot::Tombstone;
            self.len -= 1;
            self.tombstones += 1;
            self.stats.expired += 1;
        }
    }

    fn is_expired(&self, entry: &ConnectionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) >= self.timeouts.for_protocol(entry.key.protocol)
    }

    fn maybe_compact(&mut self, now: Instant) {
        if self.tombstones * 4 <= self.slots.len() {
            return;
        }

        let live: Vec<ConnectionEntry> = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Occupied(entry) => Some(*entry),
                _ => None,
            })
            .collect();

        self.clear();
        for entry in live {
            if self.is_expired(&entry, now) {
                self.stats.expired += 1;
                continue;
            }
            let cap = self.slots.len();
            let mut idx = self.home(&entry.key);
            while !matches!(self.slots[idx], Slot::Empty) {
                idx = (idx + 1) % cap;
            }
            self.slots[idx] = Slot::Occupied(entry);
            self.len += 1;
        }
        debug!("接続テーブルを再配置しました: 件数={}", self.len);
    }
}
