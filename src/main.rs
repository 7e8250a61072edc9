use log::{error, info, warn};
use rdb_firewall::config::AppConfig;
use rdb_firewall::error::InitProcessError;
use rdb_firewall::network::{LogSink, PacketCapture};
use rdb_firewall::select_device::select_device;
use rdb_firewall::setup_firewall::setup_firewall;
use rdb_firewall::setup_logger::setup_logger;
use rdb_firewall::PacketPipeline;
use std::sync::Arc;
use tokio::sync::watch;

const CAPTURE_BUFFER_SIZE: usize = 1 << 20;

#[tokio::main]
async fn main() -> Result<(), InitProcessError> {
    // .envも読み込まれる
    let config = AppConfig::from_env().map_err(|e| InitProcessError::ConfigError(e.to_string()))?;

    setup_logger(config.logging.file.as_deref())?;
    info!("設定を読み込みました");

    let firewall = Arc::new(setup_firewall(&config)?);

    // デバイスの選択
    let interface = select_device(config.network.interface.as_deref())?;
    info!("デバイスの選択に成功しました: {}", interface.name);

    let capture = PacketCapture::open(&interface, CAPTURE_BUFFER_SIZE)
        .map_err(|e| InitProcessError::CaptureError(e.to_string()))?;
    info!("{}でパケットを監視します (Ctrl-Cで停止)", capture.interface());

    // Ctrl-Cで停止
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-Cを受け取りました。停止します"),
            Err(e) => error!("シグナルの待ち受けに失敗しました: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let pipeline = PacketPipeline::new(Arc::clone(&firewall))
        .with_workers(config.network.workers)
        .with_log_format(config.logging.format)
        .with_sweep_interval(config.state.sweep_interval);

    let summary = pipeline
        .run(capture, Arc::new(LogSink), shutdown_rx)
        .await
        .map_err(|e| InitProcessError::PipelineError(e.to_string()))?;

    info!(
        "処理したパケット: {} (許可={} 拒否={} 不正={})",
        summary.total(),
        summary.accepted,
        summary.dropped,
        summary.invalid
    );
    if let Some(stats) = firewall.state_stats() {
        match serde_json::to_string(&stats) {
            Ok(json) => info!("接続テーブル: 件数={} 統計={}", firewall.connection_count(), json),
            Err(e) => warn!("統計のシリアライズに失敗しました: {}", e),
        }
    }

    Ok(())
}
