use crate::core::error::{FirewallError, FirewallResult};
use crate::core::pipeline::{PacketSource, RawPacket, VerdictSink};
use crate::network::packet::Direction;
use crate::security::firewall::Verdict;
use async_trait::async_trait;
use bytes::Bytes;
use log::{info, trace, warn};
use pnet::datalink::{self, Channel, DataLinkReceiver, MacAddr, NetworkInterface};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::Packet;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// pnetのデータリンクチャネルからIPv4パケットを取り出すソース。
///
/// 受信は専用スレッドでブロッキングに行い、チャネル経由で非同期側へ渡す。
/// 実パケットの破棄はできないため、判定は記録のみ (モニタモード) になる。
pub struct PacketCapture {
    interface: String,
    rx: mpsc::Receiver<RawPacket>,
}

impl PacketCapture {
    pub fn open(interface: &NetworkInterface, buffer_size: usize) -> FirewallResult<Self> {
        let config = datalink::Config {
            read_timeout: Some(READ_TIMEOUT),
            read_buffer_size: buffer_size,
            ..Default::default()
        };

        let receiver = match datalink::channel(interface, config) {
            Ok(Channel::Ethernet(_, rx)) => rx,
            Ok(_) => {
                return Err(FirewallError::Capture(io::Error::new(
                    io::ErrorKind::Other,
                    "未サポートのチャネルタイプです",
                )))
            }
            Err(e) => return Err(FirewallError::Capture(e)),
        };

        let (tx, rx) = mpsc::channel(1024);
        let local_mac = interface.mac;
        std::thread::Builder::new()
            .name(format!("capture-{}", interface.name))
            .spawn(move || capture_loop(receiver, tx, local_mac))?;

        info!("キャプチャを開始しました: {}", interface.name);
        Ok(Self {
            interface: interface.name.clone(),
            rx,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

#[async_trait]
impl PacketSource for PacketCapture {
    async fn next_packet(&mut self) -> FirewallResult<Option<RawPacket>> {
        Ok(self.rx.recv().await)
    }
}

fn capture_loop(
    mut receiver: Box<dyn DataLinkReceiver>,
    tx: mpsc::Sender<RawPacket>,
    local_mac: Option<MacAddr>,
) {
    let mut next_id = 0u64;

    while !tx.is_closed() {
        match receiver.next() {
            Ok(frame) => {
                let Some(packet) = frame_to_packet(frame, local_mac, next_id) else {
                    continue;
                };
                next_id += 1;
                if tx.blocking_send(packet).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!("パケットの読み取り中にエラーが発生しました: {}", e);
                break;
            }
        }
    }

    trace!("キャプチャスレッドを終了します");
}

/// イーサネットフレームからIPv4部分を取り出す。送信元MACが自分なら送信方向
pub fn frame_to_packet(frame: &[u8], local_mac: Option<MacAddr>, id: u64) -> Option<RawPacket> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }

    let direction = match local_mac {
        Some(mac) if ethernet.get_source() == mac => Direction::Outbound,
        Some(_) => Direction::Inbound,
        None => Direction::Unknown,
    };

    Some(RawPacket {
        id,
        direction,
        data: Bytes::copy_from_slice(ethernet.payload()),
    })
}

// モニタモード用: 判定をログに残すだけ
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl VerdictSink for LogSink {
    async fn apply(&self, packet: &RawPacket, verdict: Verdict) -> FirewallResult<()> {
        trace!("パケット#{}: {}", packet.id, verdict.as_str());
        Ok(())
    }
}
