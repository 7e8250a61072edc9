use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitProcessError {
    #[error("ロガーのセットアップに失敗しました: {0}")]
    LoggerError(String),

    #[error("設定の読み込みに失敗しました: {0}")]
    ConfigError(String),

    #[error("ルールファイルの読み込みに失敗しました: {0}")]
    RuleFileError(String),

    #[error("デバイス選択エラー: {0}")]
    DeviceSelectionError(String),

    #[error("キャプチャの開始に失敗しました: {0}")]
    CaptureError(String),

    #[error("パケット処理エラー: {0}")]
    PipelineError(String),
}
