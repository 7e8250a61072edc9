pub mod decode;
pub mod tcp;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

pub use decode::decode;

// パケットの向き (インターセプト層から申告される)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Unknown,
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Unknown => "unknown",
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

// L4プロトコル。Anyは「その他」も兼ねる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Protocol {
    #[default]
    Any,
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn from_ip_protocol(value: u8) -> Self {
        match value {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            1 => Protocol::Icmp,
            _ => Protocol::Any,
        }
    }

    /// ポートを持つプロトコルかどうか
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }

    pub fn tag(&self) -> u8 {
        match self {
            Protocol::Any => 0,
            Protocol::Tcp => 1,
            Protocol::Udp => 2,
            Protocol::Icmp => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Any => "any",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// ワイヤ上のバイト順のまま保持するIPv4アドレス。
///
/// 比較は等価性とバイト列順序のみで行い、ホストのエンディアンで数値として
/// 解釈し直すことはない。人間向けの表記は `Display` でのみ行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Ipv4Token([u8; 4]);

impl Ipv4Token {
    pub const fn from_wire(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    // ハッシュ用のメモリ上の32bitワード (変換なし)
    pub fn raw(&self) -> u32 {
        u32::from_ne_bytes(self.0)
    }
}

impl From<Ipv4Addr> for Ipv4Token {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl fmt::Display for Ipv4Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Ipv4Addr::from(self.0))
    }
}

/// ワイヤ上のバイト順のまま保持するポート番号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PortToken([u8; 2]);

impl PortToken {
    pub const fn from_wire(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    // 設定ファイルなど人間が書いた番号から作る
    pub const fn from_host(port: u16) -> Self {
        Self(port.to_be_bytes())
    }

    pub fn raw(&self) -> u16 {
        u16::from_ne_bytes(self.0)
    }

    pub fn to_host(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }
}

impl fmt::Display for PortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_host())
    }
}

// デコード済みの正規化パケット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedPacket {
    pub direction: Direction,
    pub protocol: Protocol,
    pub src_ip: Ipv4Token,
    pub dst_ip: Ipv4Token,
    pub src_port: PortToken,
    pub dst_port: PortToken,
    pub is_new_connection: bool,
}

impl NormalizedPacket {
    /// 送信元と宛先を入れ替えた応答方向のパケット
    pub fn reversed(&self) -> Self {
        Self {
            direction: match self.direction {
                Direction::Inbound => Direction::Outbound,
                Direction::Outbound => Direction::Inbound,
                Direction::Unknown => Direction::Unknown,
            },
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            ..*self
        }
    }
}
