mod common;

use common::*;
use rdb_firewall::network::packet::{Ipv4Token, PortToken};
use rdb_firewall::{decode, Direction, PacketError, Protocol};
use std::net::Ipv4Addr;

const CLIENT: [u8; 4] = [192, 168, 1, 10];
const SERVER: [u8; 4] = [10, 0, 0, 5];

#[test]
fn syn_starts_a_connection_and_syn_ack_does_not() {
    let syn = tcp(CLIENT, 40000, SERVER, 22, SYN);
    assert!(syn.is_new_connection);
    assert_eq!(syn.protocol, Protocol::Tcp);
    assert_eq!(syn.src_ip, Ipv4Token::from(Ipv4Addr::from(CLIENT)));
    assert_eq!(syn.dst_port, PortToken::from_host(22));

    let syn_ack = tcp(SERVER, 22, CLIENT, 40000, SYN_ACK);
    assert!(!syn_ack.is_new_connection);

    let ack = tcp(CLIENT, 40000, SERVER, 22, ACK);
    assert!(!ack.is_new_connection);
}

#[test]
fn ports_keep_wire_order() {
    let bytes = udp_bytes(CLIENT, 0x1234, SERVER, 53);
    let packet = decode(&bytes, Direction::Outbound).unwrap();

    assert_eq!(packet.src_port, PortToken::from_wire([0x12, 0x34]));
    assert_eq!(packet.src_port.to_host(), 0x1234);
    assert_eq!(packet.dst_port.to_host(), 53);
    assert_eq!(packet.direction, Direction::Outbound);
    assert!(packet.is_new_connection);
}

#[test]
fn icmp_has_no_ports() {
    let packet = icmp(CLIENT, SERVER);
    assert_eq!(packet.protocol, Protocol::Icmp);
    assert_eq!(packet.src_port.to_host(), 0);
    assert_eq!(packet.dst_port.to_host(), 0);
    assert!(!packet.is_new_connection);
}

#[test]
fn header_options_shift_the_transport_header() {
    let plain = tcp_bytes(CLIENT, 5000, SERVER, 443, SYN);
    let mut with_options = plain[..20].to_vec();
    with_options[0] = 0x46;
    with_options.extend_from_slice(&[1, 1, 1, 0]);
    with_options.extend_from_slice(&plain[20..]);

    let packet = decode(&with_options, Direction::Inbound).unwrap();
    assert_eq!(packet.src_port.to_host(), 5000);
    assert_eq!(packet.dst_port.to_host(), 443);
    assert!(packet.is_new_connection);
}

#[test]
fn malformed_packets_are_rejected() {
    assert_eq!(
        decode(&[0x45; 19], Direction::Inbound),
        Err(PacketError::Truncated("IPv4ヘッダ"))
    );

    let mut v6 = tcp_bytes(CLIENT, 1, SERVER, 2, SYN);
    v6[0] = 0x65;
    assert_eq!(decode(&v6, Direction::Inbound), Err(PacketError::InvalidVersion(6)));

    let mut short_ihl = tcp_bytes(CLIENT, 1, SERVER, 2, SYN);
    short_ihl[0] = 0x44;
    assert_eq!(
        decode(&short_ihl, Direction::Inbound),
        Err(PacketError::InvalidHeaderLength(16))
    );

    let mut long_ihl = ipv4(PROTO_ICMP, CLIENT, SERVER, &[]);
    long_ihl[0] = 0x4f;
    assert_eq!(
        decode(&long_ihl, Direction::Inbound),
        Err(PacketError::InvalidHeaderLength(60))
    );

    let no_ports = ipv4(PROTO_UDP, CLIENT, SERVER, &[0, 53]);
    assert_eq!(
        decode(&no_ports, Direction::Inbound),
        Err(PacketError::Truncated("L4ポート"))
    );

    let no_flags = ipv4(PROTO_TCP, CLIENT, SERVER, &[0, 80, 0, 80, 0, 0, 0, 0]);
    assert_eq!(
        decode(&no_flags, Direction::Inbound),
        Err(PacketError::Truncated("TCPフラグ"))
    );
}

#[test]
fn errors_are_invalid_input() {
    let err = decode(&[], Direction::Unknown).unwrap_err();
    assert!(err.is_invalid_input());
}
