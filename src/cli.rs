//! CLI共通処理
//!
//! `infer` と `infer_json` は同じ処理を使い、出力形式だけが異なります。
//! 終了コード: 成功 0、使用方法エラー 2、その他の失敗 1。

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use burn::backend::{Autodiff, Wgpu};
use burn::tensor::backend::Backend;
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;
use clap::{error::ErrorKind, Parser};
use tracing::info;

use crate::error::{ClassifierError, Result};
use crate::logging::init_logging;
use crate::ml::{train_model, Classifier};
use crate::model::{AppConfig, DeviceType, ModelMetadata};
use crate::output::OutputFormat;

/// 推論CLIの引数（画像パスのみ）
#[derive(Parser, Debug)]
#[command(about = "Classify a leaf image into one of seven species", long_about = None)]
struct InferArgs {
    /// 分類する画像ファイル（`-` で始まるパスもそのまま受け付ける）
    #[arg(allow_hyphen_values = true)]
    image_path: PathBuf,
}

fn usage_error(program: &str) -> ClassifierError {
    ClassifierError::Usage(format!("Usage: {program} <image_path>"))
}

/// 推論CLIのエントリポイント。戻り値はプロセスの終了コード
pub fn run_inference_cli<I, T>(program: &str, format: OutputFormat, args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let _ = init_logging("warn");

    let args = match InferArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return 0;
        }
        Err(_) => {
            let err = usage_error(program);
            eprintln!("{err}");
            return err.exit_code();
        }
    };

    let config = AppConfig::load_or_default();
    match classify_with_config(&config, &args.image_path, format) {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    }
}

/// 設定に従ってバックエンドを選び、1枚の画像を分類して整形済み文字列を返す
pub fn classify_with_config(config: &AppConfig, image_path: &Path, format: OutputFormat) -> Result<String> {
    match config.device_type {
        DeviceType::Cpu => classify::<NdArray<f32>>(config, image_path, format, NdArrayDevice::default()),
        DeviceType::Wgpu => classify::<Wgpu>(config, image_path, format, WgpuDevice::default()),
    }
}

fn classify<B: Backend>(
    config: &AppConfig,
    image_path: &Path,
    format: OutputFormat,
    device: B::Device,
) -> Result<String> {
    let classifier = Classifier::<B>::load(&config.model.model_path, config.model.num_classes, device)?;
    let prediction = classifier.predict(image_path)?;
    info!(
        "予測: {} (class {}, {:.2}%)",
        prediction.label,
        prediction.class_index,
        prediction.confidence() * 100.0
    );
    format.render(&prediction)
}

/// 設定に従ってバックエンドを選び、学習を実行
pub fn train_with_config(config: &AppConfig) -> Result<ModelMetadata> {
    info!("使用デバイス: {}", config.device_type);
    match config.device_type {
        DeviceType::Cpu => train_model::<Autodiff<NdArray<f32>>>(config, NdArrayDevice::default()),
        DeviceType::Wgpu => train_model::<Autodiff<Wgpu>>(config, WgpuDevice::default()),
    }
}
