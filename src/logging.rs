//! ログ初期化
//!
//! 標準出力は推論結果専用のため、ログはすべて標準エラーへ出力します。
//! `RUST_LOG` が設定されている場合はそちらを優先します。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{ClassifierError, Result};

/// tracingのサブスクライバを初期化
///
/// 二重初期化はエラーになるので、テストなどで複数回呼ぶ場合は結果を無視してください。
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| ClassifierError::Config(format!("Failed to initialize logger: {e}")))
}
