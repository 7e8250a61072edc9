use crate::core::error::FirewallResult;
use crate::core::pipeline::{PacketSource, RawPacket, VerdictSink};
use crate::network::packet::Direction;
use crate::security::firewall::Verdict;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// メモリ上のパケット列を流すソース。リプレイやテストで使う
#[derive(Debug, Default)]
pub struct MemorySource {
    packets: VecDeque<RawPacket>,
    next_id: u64,
    hold_open: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    // 使い切った後も終端を返さず、停止要求を待つ
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn push(&mut self, direction: Direction, data: impl Into<Bytes>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.packets.push_back(RawPacket {
            id,
            direction,
            data: data.into(),
        });
        id
    }

    pub fn remaining(&self) -> usize {
        self.packets.len()
    }
}

#[async_trait]
impl PacketSource for MemorySource {
    async fn next_packet(&mut self) -> FirewallResult<Option<RawPacket>> {
        match self.packets.pop_front() {
            Some(packet) => Ok(Some(packet)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// 受け取った判定を記録するだけのシンク
#[derive(Debug, Default)]
pub struct MemorySink {
    verdicts: Mutex<Vec<(u64, Verdict)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    // パケットID順
    pub async fn verdicts(&self) -> Vec<(u64, Verdict)> {
        let mut verdicts = self.verdicts.lock().await.clone();
        verdicts.sort_by_key(|(id, _)| *id);
        verdicts
    }
}

#[async_trait]
impl VerdictSink for MemorySink {
    async fn apply(&self, packet: &RawPacket, verdict: Verdict) -> FirewallResult<()> {
        self.verdicts.lock().await.push((packet.id, verdict));
        Ok(())
    }
}
