//! 推論結果の出力形式
//!
//! 分類処理は共通で、ここでは表示形式だけを切り替えます。

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ml::Prediction;

/// JSON出力の `features` フィールド（予測とは無関係の固定値、綴りもこのまま）
pub const STATIC_FEATURES: [&str; 2] = ["poisionous", "round shape"];

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// ラベルのみ
    Plain,
    /// `{"leaf_type": ..., "features": [...]}`
    Json,
}

/// JSON出力のペイロード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafReport {
    pub leaf_type: String,
    pub features: Vec<String>,
}

impl LeafReport {
    pub fn new(leaf_type: impl Into<String>) -> Self {
        Self {
            leaf_type: leaf_type.into(),
            features: STATIC_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl OutputFormat {
    /// 予測結果を標準出力用の文字列に整形
    pub fn render(&self, prediction: &Prediction) -> Result<String> {
        match self {
            OutputFormat::Plain => Ok(prediction.label.clone()),
            OutputFormat::Json => Ok(serde_json::to_string(&LeafReport::new(&prediction.label))?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: &str, class_index: usize) -> Prediction {
        Prediction {
            label: label.to_string(),
            class_index,
            probabilities: vec![0.0; 7],
        }
    }

    #[test]
    fn test_plain() {
        let out = OutputFormat::Plain.render(&prediction("Quercus Robur", 5)).unwrap();
        assert_eq!(out, "Quercus Robur");
    }

    #[test]
    fn test_json_exact() {
        let out = OutputFormat::Json.render(&prediction("Acer Palmatum", 0)).unwrap();
        assert_eq!(
            out,
            r#"{"leaf_type":"Acer Palmatum","features":["poisionous","round shape"]}"#
        );
    }

    #[test]
    fn test_json_features_independent_of_label() {
        for label in crate::ml::LEAF_LABELS {
            let out = OutputFormat::Json.render(&prediction(label, 0)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&out).unwrap();
            let object = value.as_object().unwrap();

            assert_eq!(object.len(), 2);
            assert_eq!(object["leaf_type"], label);
            assert_eq!(object["features"], serde_json::json!(["poisionous", "round shape"]));
        }
    }
}
