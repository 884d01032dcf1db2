//! 葉の種類を分類するCNN（学習・推論）
//!
//! - `ml`: モデル定義、前処理、データ拡張、データセット、学習、推論
//! - `model`: 設定ファイル、モデルアーカイブ（重み＋メタデータ）の保存・読み込み
//! - `output`: 推論結果の表示形式（プレーンテキスト / JSON）
//! - `cli`: 各バイナリの共通処理

pub mod cli;
pub mod error;
pub mod logging;
pub mod ml;
pub mod model;
pub mod output;

pub use error::{ClassifierError, Result};
pub use ml::{Classifier, Prediction, LEAF_LABELS};
pub use output::OutputFormat;
