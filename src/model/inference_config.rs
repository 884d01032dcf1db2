//! モデルメタデータを使用した推論設定
//!
//! 保存されたモデルメタデータを検証し、推論に必要な情報を取り出します。

use tracing::debug;

use crate::error::{ClassifierError, Result};
use crate::ml::{ModelConfig, ARCHITECTURE};
use crate::model::model_metadata::ModelMetadata;

/// モデルメタデータから推論用情報を取得
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// 全クラスラベル（出力ユニット順）
    pub class_labels: Vec<String>,

    /// モデル入力解像度
    pub image_size: usize,
}

impl InferenceConfig {
    /// メタデータを検証してInferenceConfigを作成
    ///
    /// アーキテクチャ識別子・クラス数・入力サイズのいずれかが現在のモデルと
    /// 互換でない場合は `ModelLoad` エラーを返します。
    pub fn from_metadata(metadata: &ModelMetadata, expected_classes: usize) -> Result<Self> {
        if metadata.architecture != ARCHITECTURE {
            return Err(ClassifierError::ModelLoad(format!(
                "incompatible architecture '{}' (expected '{}')",
                metadata.architecture, ARCHITECTURE
            )));
        }

        if metadata.num_classes() != expected_classes {
            return Err(ClassifierError::ModelLoad(format!(
                "model has {} class labels, expected {}",
                metadata.num_classes(),
                expected_classes
            )));
        }

        ModelConfig::new(expected_classes)
            .with_image_size(metadata.image_size)
            .validate()
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        debug!("推論設定: {} クラス, 入力 {}px", metadata.num_classes(), metadata.image_size);

        Ok(Self {
            class_labels: metadata.class_labels.clone(),
            image_size: metadata.image_size,
        })
    }

    /// クラス数を取得
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{LEAF_LABELS, NUM_CLASSES};

    fn metadata() -> ModelMetadata {
        ModelMetadata::new(LEAF_LABELS.iter().map(|s| s.to_string()).collect(), 225, 5, 42)
    }

    #[test]
    fn test_label_mapping() {
        let config = InferenceConfig::from_metadata(&metadata(), NUM_CLASSES).unwrap();

        assert_eq!(config.num_classes(), 7);
        assert_eq!(config.class_labels[0], "Acer Palmatum");
        assert_eq!(config.class_labels[6], "Tilia Cordata");
        assert_eq!(config.image_size, 225);
    }

    #[test]
    fn test_rejects_wrong_class_count() {
        let mut metadata = metadata();
        metadata.class_labels.pop();

        let err = InferenceConfig::from_metadata(&metadata, NUM_CLASSES).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }

    #[test]
    fn test_rejects_foreign_architecture() {
        let mut metadata = metadata();
        metadata.architecture = "resnet18".to_string();

        let err = InferenceConfig::from_metadata(&metadata, NUM_CLASSES).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }

    #[test]
    fn test_rejects_too_small_input() {
        let mut metadata = metadata();
        metadata.image_size = 8;

        let err = InferenceConfig::from_metadata(&metadata, NUM_CLASSES).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }
}
