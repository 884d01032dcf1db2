//! モデルメタデータの定義と永続化
//!
//! クラスラベルの順序は学習時にメタデータへ保存され、推論時はそれを使用します。
//! ディレクトリのソート順を推論側で仮定することはありません。

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ml::ARCHITECTURE;

/// モデルメタデータ
///
/// アーカイブ内に `metadata.json` として保存されます。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// 全クラスラベル（出力ユニット順）
    /// 例: ["Acer Palmatum", "Acer Rubrum", ...]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形、通常225）
    pub image_size: usize,

    /// ネットワーク構成の識別子
    pub architecture: String,

    /// 学習エポック数
    pub num_epochs: u32,

    /// 初期化に使用したシード
    pub seed: u64,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(class_labels: Vec<String>, image_size: usize, num_epochs: u32, seed: u64) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            class_labels,
            image_size,
            architecture: ARCHITECTURE.to_string(),
            num_epochs,
            seed,
            trained_at,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::LEAF_LABELS;

    #[test]
    fn test_new_uses_current_architecture() {
        let labels: Vec<String> = LEAF_LABELS.iter().map(|s| s.to_string()).collect();
        let metadata = ModelMetadata::new(labels, 225, 5, 42);

        assert_eq!(metadata.architecture, ARCHITECTURE);
        assert_eq!(metadata.num_classes(), 7);
        assert!(!metadata.trained_at.is_empty());
    }

    #[test]
    fn test_json_keeps_label_order() {
        let labels: Vec<String> = LEAF_LABELS.iter().rev().map(|s| s.to_string()).collect();
        let metadata = ModelMetadata::new(labels.clone(), 225, 5, 42);

        let json = metadata.to_json_string().unwrap();
        let restored = ModelMetadata::from_json_string(&json).unwrap();

        assert_eq!(restored.class_labels, labels);
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ModelMetadata::from_json_string("{}").is_err());
    }
}
