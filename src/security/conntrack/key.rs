use crate::network::packet::{Ipv4Token, NormalizedPacket, PortToken, Protocol};
use std::fmt;

/// 向きを正規化した5タプル。
///
/// 2つの端点を (IP昇順, 同一IPならポート昇順) で並べるので、同じフローの
/// 往路と復路は同じキーになる。TCP/UDPでのみ作られる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub low_ip: Ipv4Token,
    pub low_port: PortToken,
    pub high_ip: Ipv4Token,
    pub high_port: PortToken,
    pub protocol: Protocol,
}

impl ConnectionKey {
    pub fn from_packet(packet: &NormalizedPacket) -> Option<Self> {
        if !packet.protocol.has_ports() {
            return None;
        }

        let src = (packet.src_ip, packet.src_port);
        let dst = (packet.dst_ip, packet.dst_port);
        let (low, high) = if src <= dst { (src, dst) } else { (dst, src) };

        Some(Self {
            low_ip: low.0,
            low_port: low.1,
            high_ip: high.0,
            high_port: high.1,
            protocol: packet.protocol,
        })
    }

    // 暗号学的な強度は不要。通常のトラフィックで散らばれば十分
    pub fn hash(&self) -> u32 {
        let mut h = self.low_ip.raw() ^ self.high_ip.raw();
        h ^= (self.low_port.raw() as u32) << 16 | self.high_port.raw() as u32;
        h ^= (self.protocol.tag() as u32) << 24;
        // 上位ビットのポート差分を剰余に使う下位ビットへ混ぜ込む
        h ^= h >> 16;
        h = h.wrapping_mul(0x045d_9f3b);
        h ^ (h >> 16)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} <-> {}:{} ({})",
            self.low_ip,
            self.low_port,
            self.high_ip,
            self.high_port,
            self.protocol.as_str()
        )
    }
}
