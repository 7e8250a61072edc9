use log::info;
use rdb_firewall::config::AppConfig;
use rdb_firewall::core::MemorySink;
use rdb_firewall::error::InitProcessError;
use rdb_firewall::network::replay::load_pcap;
use rdb_firewall::setup_firewall::setup_firewall;
use rdb_firewall::setup_logger::setup_logger;
use rdb_firewall::{Direction, PacketPipeline};
use std::sync::Arc;
use tokio::sync::watch;

// pcapファイルをオフラインで再生し、各パケットの判定を表示する。
// ルールと既定ポリシーは本体と同じ環境変数から読む。
#[tokio::main]
async fn main() -> Result<(), InitProcessError> {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: rdb-replay <file.pcap>");
        std::process::exit(1);
    };

    let config = AppConfig::from_env().map_err(|e| InitProcessError::ConfigError(e.to_string()))?;
    setup_logger(config.logging.file.as_deref())?;

    let firewall = Arc::new(setup_firewall(&config)?);
    let source = load_pcap(&path, Direction::Inbound)
        .map_err(|e| InitProcessError::CaptureError(format!("{}: {}", path, e)))?;
    info!("{}から{}パケットを再生します", path, source.remaining());

    // 状態テーブルの結果がファイル順に依存するのでワーカーは1つ
    let sink = Arc::new(MemorySink::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let summary = PacketPipeline::new(firewall)
        .with_workers(1)
        .with_log_format(config.logging.format)
        .run(source, Arc::clone(&sink), shutdown_rx)
        .await
        .map_err(|e| InitProcessError::PipelineError(e.to_string()))?;

    for (id, verdict) in sink.verdicts().await {
        println!("packet #{}: {}", id, verdict.as_str());
    }
    println!(
        "total={} accepted={} dropped={} invalid={}",
        summary.total(),
        summary.accepted,
        summary.dropped,
        summary.invalid
    );

    Ok(())
}
