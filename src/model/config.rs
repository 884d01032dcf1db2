//! アプリケーション設定管理モジュール
//!
//! 計算デバイスやモデル設定、学習設定などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{ClassifierError, Result};
use crate::ml::{IMAGE_SIZE, NUM_CLASSES};

/// 設定ファイルのパスを上書きする環境変数
pub const CONFIG_ENV_VAR: &str = "LEAF_CONFIG";

/// 学習済みモデルの既定ファイル名
pub const DEFAULT_MODEL_PATH: &str = "model.keras";

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 学習済みモデル（重み＋メタデータ）のパス
    pub model_path: String,
    /// 分類クラス数
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    pub image_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            num_classes: NUM_CLASSES,
            image_size: IMAGE_SIZE,
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// 学習データのルート（クラスごとのサブディレクトリを含む）
    pub train_dir: String,
    /// 検証データのルート
    pub valid_dir: String,
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// ワーカー数
    pub num_workers: usize,
    /// 学習率
    pub learning_rate: f64,
    /// ランダムシード（重み初期化・シャッフル・データ拡張）
    pub seed: u64,
    /// Burnのチェックポイント・ログ出力先。未指定なら一時ディレクトリ
    #[serde(default)]
    pub artifact_dir: Option<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            train_dir: "data/train".to_string(),
            valid_dir: "data/test".to_string(),
            num_epochs: 5,
            batch_size: 32,
            num_workers: 1,
            learning_rate: 1e-3,
            seed: 42,
            artifact_dir: None,
        }
    }
}

/// データ拡張設定（学習データのみに適用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AugmentationSettings {
    /// せん断角度の範囲（度）。±shear_range の一様分布
    pub shear_range: f32,
    /// ズーム範囲。倍率は [1 - zoom_range, 1 + zoom_range]
    pub zoom_range: f32,
    /// ランダム左右反転
    pub horizontal_flip: bool,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// トレーニング設定
    #[serde(default)]
    pub training: TrainingSettings,
    /// データ拡張設定
    #[serde(default)]
    pub augmentation: AugmentationSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ClassifierError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ClassifierError::Config(format!("Failed to parse config {}: {e}", path.display()))
        })
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("設定ファイルの読み込みに失敗しました: {e}");
                    warn!("デフォルト設定を使用します");
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報をログに出力
    pub fn log_summary(&self) {
        info!("計算デバイス: {}", self.device_type);
        info!("モデルパス: {}", self.model.model_path);
        info!(
            "分類クラス数: {}, 入力サイズ: {}x{}",
            self.model.num_classes, self.model.image_size, self.model.image_size
        );
        info!(
            "学習データ: {}, 検証データ: {}",
            self.training.train_dir, self.training.valid_dir
        );
        info!(
            "エポック数: {}, バッチサイズ: {}, 学習率: {}, シード: {}",
            self.training.num_epochs,
            self.training.batch_size,
            self.training.learning_rate,
            self.training.seed
        );
        info!(
            "データ拡張: shear={}, zoom={}, horizontal_flip={}",
            self.augmentation.shear_range,
            self.augmentation.zoom_range,
            self.augmentation.horizontal_flip
        );
    }
}
