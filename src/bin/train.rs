//! 学習ツール
//!
//! `data/train` と `data/test` から学習し、`model.keras` に保存します。

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use leaf_classifier::cli::train_with_config;
use leaf_classifier::logging::init_logging;
use leaf_classifier::model::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(about = "Train the leaf classifier", long_about = None)]
struct Cli {
    /// 設定ファイル（省略時は config.json、無ければ既定値）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 詳細ログを出力
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" })?;

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::load_or_default(),
    };
    config.log_summary();

    let metadata = train_with_config(&config).context("training failed")?;
    info!(
        "学習完了: {} に保存しました ({} クラス)",
        config.model.model_path,
        metadata.class_labels.len()
    );

    Ok(())
}
