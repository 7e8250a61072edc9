use thiserror::Error;

// デコーダのエラー。いずれも呼び出し側でパケットを破棄すれば回復できる
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("パケットが短すぎます: {0}")]
    Truncated(&'static str),

    #[error("IPv4ではありません: version={0}")]
    InvalidVersion(u8),

    #[error("無効なIPヘッダ長です: {0}バイト")]
    InvalidHeaderLength(usize),
}

impl PacketError {
    // すべてInvalidInput扱い
    pub fn is_invalid_input(&self) -> bool {
        true
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("ルールファイルの読み込みに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error("ルールファイルの{line}行目が不正です: {reason}")]
    Parse { line: usize, reason: String },

    #[error("環境変数の解析に失敗しました: {0}")]
    EnvVarParse(String),
}

#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),

    #[error("キャプチャエラー: {0}")]
    Capture(#[from] std::io::Error),

    #[error("パイプラインエラー: {0}")]
    Pipeline(String),

    #[error("チャネルが閉じられました")]
    ChannelClosed,
}

pub type FirewallResult<T> = Result<T, FirewallError>;
