mod common;

use common::*;
use rdb_firewall::core::MemorySink;
use rdb_firewall::network::packet::PortToken;
use rdb_firewall::network::replay::load_pcap;
use rdb_firewall::{
    ConnectionTable, Direction, EngineConfig, Firewall, FirewallAction, FirewallRule,
    PacketPipeline, Protocol, RuleMatch, RuleSet, Verdict,
};
use std::sync::Arc;
use tokio::sync::watch;

const CLIENT: [u8; 4] = [192, 168, 1, 10];
const SERVER: [u8; 4] = [10, 0, 0, 5];

#[tokio::test]
async fn captured_session_replays_in_order() {
    let capture = pcap_file(&[
        tcp_bytes(CLIENT, 40000, SERVER, 443, SYN),
        tcp_bytes(SERVER, 443, CLIENT, 40000, SYN_ACK),
        tcp_bytes(SERVER, 8080, CLIENT, 40001, SYN),
        vec![0x45, 0],
    ]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.pcap");
    std::fs::write(&path, capture).unwrap();

    let source = load_pcap(&path, Direction::Inbound).unwrap();
    assert_eq!(source.remaining(), 4);

    let allow_https = FirewallRule::new(
        RuleMatch {
            protocol: Protocol::Tcp,
            dst_port: Some(PortToken::from_host(443)),
            ..RuleMatch::default()
        },
        FirewallAction::Accept,
    );
    let firewall = Arc::new(Firewall::with_state(
        EngineConfig {
            default_action: FirewallAction::Drop,
        },
        RuleSet::from(vec![allow_https]),
        ConnectionTable::new(64),
    ));

    let sink = Arc::new(MemorySink::new());
    let (_tx, rx) = watch::channel(false);
    let summary = PacketPipeline::new(Arc::clone(&firewall))
        .with_workers(1)
        .run(source, Arc::clone(&sink), rx)
        .await
        .unwrap();

    assert_eq!(
        sink.verdicts().await,
        vec![
            (0, Verdict::Accept),
            (1, Verdict::Accept),
            (2, Verdict::Drop),
            (3, Verdict::Drop),
        ]
    );
    assert_eq!(summary.invalid, 1);
    assert_eq!(firewall.connection_count(), 1);
}
