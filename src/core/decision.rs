use crate::config::LogFormat;
use crate::network::packet::{Direction, NormalizedPacket, Protocol};
use crate::security::firewall::Verdict;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

// 判定ログの1行分。ここで初めてアドレスとポートを人間向けの表記に変換する
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub verdict: Verdict,
    pub direction: Direction,
    pub protocol: Protocol,
    pub src_ip: Ipv4Addr,
    pub src_port: Option<u16>,
    pub dst_ip: Ipv4Addr,
    pub dst_port: Option<u16>,
}

impl DecisionRecord {
    pub fn new(packet: &NormalizedPacket, verdict: Verdict) -> Self {
        let has_ports = packet.protocol.has_ports();
        Self {
            verdict,
            direction: packet.direction,
            protocol: packet.protocol,
            src_ip: Ipv4Addr::from(packet.src_ip.octets()),
            src_port: has_ports.then(|| packet.src_port.to_host()),
            dst_ip: Ipv4Addr::from(packet.dst_ip.octets()),
            dst_port: has_ports.then(|| packet.dst_port.to_host()),
        }
    }

    pub fn render(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => self.to_string(),
            LogFormat::Json => serde_json::to_string(self).unwrap_or_else(|_| self.to_string()),
        }
    }
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let src = format!("{}:{}", self.src_ip, self.src_port.unwrap_or(0));
        let dst = format!("{}:{}", self.dst_ip, self.dst_port.unwrap_or(0));
        write!(
            f,
            "{:<5} {:<3} {:<4} {:>21} -> {}",
            self.verdict.as_str(),
            self.direction.as_str(),
            self.protocol.as_str(),
            src,
            dst
        )
    }
}
