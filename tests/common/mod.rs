#![allow(dead_code)]

use rdb_firewall::network::packet::tcp::{TCP_ACK, TCP_SYN};
use rdb_firewall::{decode, Direction, NormalizedPacket};

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

pub const SYN: u8 = TCP_SYN;
pub const SYN_ACK: u8 = TCP_SYN | TCP_ACK;
pub const ACK: u8 = TCP_ACK;

// オプションなしのIPv4ヘッダ + L4ペイロード
pub fn ipv4(protocol: u8, src: [u8; 4], dst: [u8; 4], l4: &[u8]) -> Vec<u8> {
    let total = (20 + l4.len()) as u16;
    let mut buf = Vec::with_capacity(total as usize);
    buf.push(0x45);
    buf.push(0);
    buf.extend_from_slice(&total.to_be_bytes());
    buf.extend_from_slice(&[0, 0, 0x40, 0]);
    buf.push(64);
    buf.push(protocol);
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&src);
    buf.extend_from_slice(&dst);
    buf.extend_from_slice(l4);
    buf
}

pub fn tcp_bytes(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16, flags: u8) -> Vec<u8> {
    let mut l4 = Vec::with_capacity(20);
    l4.extend_from_slice(&src_port.to_be_bytes());
    l4.extend_from_slice(&dst_port.to_be_bytes());
    l4.extend_from_slice(&[0, 0, 0, 1]);
    l4.extend_from_slice(&[0, 0, 0, 0]);
    l4.push(0x50);
    l4.push(flags);
    l4.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 0]);
    ipv4(PROTO_TCP, src, dst, &l4)
}

pub fn udp_bytes(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> Vec<u8> {
    let mut l4 = Vec::with_capacity(8);
    l4.extend_from_slice(&src_port.to_be_bytes());
    l4.extend_from_slice(&dst_port.to_be_bytes());
    l4.extend_from_slice(&8u16.to_be_bytes());
    l4.extend_from_slice(&[0, 0]);
    ipv4(PROTO_UDP, src, dst, &l4)
}

pub fn icmp_bytes(src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    ipv4(PROTO_ICMP, src, dst, &[8, 0, 0, 0, 0, 1, 0, 1])
}

pub fn tcp(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16, flags: u8) -> NormalizedPacket {
    decode(&tcp_bytes(src, src_port, dst, dst_port, flags), Direction::Inbound).unwrap()
}

pub fn udp(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16) -> NormalizedPacket {
    decode(&udp_bytes(src, src_port, dst, dst_port), Direction::Outbound).unwrap()
}

pub fn icmp(src: [u8; 4], dst: [u8; 4]) -> NormalizedPacket {
    decode(&icmp_bytes(src, dst), Direction::Inbound).unwrap()
}

// イーサネットで包んだIPv4パケットを並べたpcapファイル (リトルエンディアン)
pub fn pcap_file(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes());
    buf.extend_from_slice(&4u16.to_le_bytes());
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(&65535u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());

    for packet in packets {
        let mut frame = vec![0x02, 0, 0, 0, 0, 0x02, 0x02, 0, 0, 0, 0, 0x01, 0x08, 0x00];
        frame.extend_from_slice(packet);
        let len = (frame.len() as u32).to_le_bytes();
        buf.extend_from_slice(&[0; 8]);
        buf.extend_from_slice(&len);
        buf.extend_from_slice(&len);
        buf.extend_from_slice(&frame);
    }
    buf
}
