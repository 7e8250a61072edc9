use crate::config::LogFormat;
use crate::core::decision::DecisionRecord;
use crate::core::error::{FirewallError, FirewallResult};
use crate::network::packet::{decode, Direction};
use crate::security::firewall::{Firewall, Verdict};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Duration, Instant};

// 受信エラーがこの回数続いたらパイプラインを止める
const MAX_SOURCE_ERRORS: u32 = 10;
const SOURCE_RETRY_DELAY: Duration = Duration::from_millis(100);

// インターセプト層から受け取った生パケット
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub id: u64,
    pub direction: Direction,
    pub data: Bytes,
}

#[async_trait]
pub trait PacketSource: Send {
    /// 次のパケット。`None` はソースの終端
    async fn next_packet(&mut self) -> FirewallResult<Option<RawPacket>>;
}

#[async_trait]
pub trait VerdictSink: Send + Sync {
    async fn apply(&self, packet: &RawPacket, verdict: Verdict) -> FirewallResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub accepted: u64,
    pub dropped: u64,
    // デコードできずにDropしたもの (droppedには含まない)
    pub invalid: u64,
}

impl PipelineSummary {
    fn merge(&mut self, other: PipelineSummary) {
        self.accepted += other.accepted;
        self.dropped += other.dropped;
        self.invalid += other.invalid;
    }

    pub fn total(&self) -> u64 {
        self.accepted + self.dropped + self.invalid
    }
}

/// パケットをワーカーへ振り分け、判定をシンクへ返すディスパッチループ
pub struct PacketPipeline {
    firewall: Arc<Firewall>,
    workers: usize,
    queue_depth: usize,
    log_format: LogFormat,
    sweep_interval: Duration,
}

impl PacketPipeline {
    pub fn new(firewall: Arc<Firewall>) -> Self {
        Self {
            firewall,
            workers: 2,
            queue_depth: 1024,
            log_format: LogFormat::Text,
            sweep_interval: Duration::from_secs(30),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// ソースが尽きるか `shutdown` に `true` が送られるまでパケットを処理する。
    ///
    /// 停止時はキューに残ったパケットを処理し終えてから集計を返す。
    pub async fn run<S, K>(
        &self,
        mut source: S,
        sink: Arc<K>,
        mut shutdown: watch::Receiver<bool>,
    ) -> FirewallResult<PipelineSummary>
    where
        S: PacketSource,
        K: VerdictSink + 'static,
    {
        info!("パケットパイプラインを開始します: ワーカー数={}", self.workers);

        let mut senders = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let (tx, rx) = mpsc::channel(self.queue_depth);
            senders.push(tx);
            handles.push(tokio::spawn(run_worker(
                rx,
                Arc::clone(&self.firewall),
                Arc::clone(&sink),
                self.log_format,
            )));
        }

        let mut sweep = interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        let mut next_worker = 0usize;
        let mut consecutive_errors = 0u32;

        let result = if *shutdown.borrow() {
            Ok(())
        } else {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("停止要求を受け取りました");
                            break Ok(());
                        }
                    }
                    _ = sweep.tick() => {
                        let removed = self.firewall.purge_expired(std::time::Instant::now());
                        if removed > 0 {
                            debug!("期限切れの接続を{}件削除しました", removed);
                        }
                    }
                    packet = source.next_packet() => match packet {
                        Ok(Some(packet)) => {
                            consecutive_errors = 0;
                            let tx = &senders[next_worker % senders.len()];
                            next_worker = next_worker.wrapping_add(1);
                            if tx.send(packet).await.is_err() {
                                break Err(FirewallError::ChannelClosed);
                            }
                        }
                        Ok(None) => {
                            info!("パケットソースが終了しました");
                            break Ok(());
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            if consecutive_errors >= MAX_SOURCE_ERRORS {
                                error!("受信エラーが{}回続いたため停止します: {}", consecutive_errors, e);
                                break Err(e);
                            }
                            warn!("パケットの受信中にエラーが発生しました: {}", e);
                            sleep(SOURCE_RETRY_DELAY).await;
                        }
                    },
                }
            }
        };

        // 送信側を閉じてワーカーに残りを処理させる
        drop(senders);

        let mut summary = PipelineSummary::default();
        for joined in join_all(handles).await {
            match joined {
                Ok(part) => summary.merge(part),
                Err(e) => {
                    error!("ワーカーが異常終了しました: {}", e);
                    return Err(FirewallError::Pipeline(e.to_string()));
                }
            }
        }

        info!(
            "パケットパイプラインを終了します: 許可={} 拒否={} 不正={}",
            summary.accepted, summary.dropped, summary.invalid
        );
        result.map(|_| summary)
    }
}

async fn run_worker<K: VerdictSink>(
    mut rx: mpsc::Receiver<RawPacket>,
    firewall: Arc<Firewall>,
    sink: Arc<K>,
    format: LogFormat,
) -> PipelineSummary {
    let mut summary = PipelineSummary::default();

    while let Some(packet) = rx.recv().await {
        let verdict = match decode(&packet.data, packet.direction) {
            Ok(normalized) => {
                let verdict = firewall.evaluate(&normalized);
                info!("{}", DecisionRecord::new(&normalized, verdict).render(format));
                match verdict {
                    Verdict::Accept => summary.accepted += 1,
                    Verdict::Drop => summary.dropped += 1,
                }
                verdict
            }
            Err(e) => {
                debug!("パケット#{}を破棄します: {}", packet.id, e);
                summary.invalid += 1;
                Verdict::Drop
            }
        };

        if let Err(e) = sink.apply(&packet, verdict).await {
            warn!("判定の適用に失敗しました: パケット#{}: {}", packet.id, e);
        }
    }

    summary
}
