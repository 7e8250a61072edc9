use crate::error::InitProcessError;
use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn setup_logger(log_file: Option<&Path>) -> Result<(), InitProcessError> {
    // RUST_LOGが未設定ならinfo
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    // タイムスタンプ付きのフォーマット
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    // ログファイルが指定されていればファイルに出力
    match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                InitProcessError::LoggerError(format!("{}: {}", path.display(), e))
            })?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder
        .try_init()
        .map_err(|e| InitProcessError::LoggerError(e.to_string()))
}
