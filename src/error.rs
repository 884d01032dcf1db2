//! エラー型の定義
//!
//! 推論CLIは `exit_code()` で終了コードを決定します。
//! メッセージ文字列ではなくバリアントで原因を判別してください。

use thiserror::Error;

/// 使用方法エラー時の終了コード
pub const EXIT_USAGE: i32 = 2;

/// その他すべての失敗時の終了コード
pub const EXIT_FAILURE: i32 = 1;

/// 分類器のエラー
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// 引数の数が不正
    #[error("{0}")]
    Usage(String),

    /// 画像の読み込み・デコード・リサイズの失敗
    #[error("Error preprocessing image: {0}")]
    Preprocess(String),

    /// モデルファイルが無い、壊れている、またはアーキテクチャが一致しない
    #[error("Error loading model: {0}")]
    ModelLoad(String),

    /// 順伝播・結果取得の失敗
    #[error("Error during inference: {0}")]
    Prediction(String),

    /// モデルの保存失敗
    #[error("Error saving model: {0}")]
    ModelSave(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    /// プロセス終了コード
    pub fn exit_code(&self) -> i32 {
        match self {
            ClassifierError::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::Preprocess(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
