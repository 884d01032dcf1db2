//! モデル推論機能

use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::Serialize;
use tracing::debug;

use crate::error::{ClassifierError, Result};
use crate::ml::preprocess::{preprocess_image, ImageTensor};
use crate::ml::{LeafClassifier, ModelConfig};
use crate::model::{load_model_with_metadata, InferenceConfig};

/// 1枚の画像に対する予測結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// 予測ラベル
    pub label: String,
    /// 予測クラスのインデックス
    pub class_index: usize,
    /// 全クラスの確率
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// 確率分布から予測を作成
    ///
    /// 最大確率のインデックスを選びます。同値の場合は小さいインデックスが優先です。
    pub fn from_probabilities(probabilities: Vec<f32>, labels: &[String]) -> Result<Self> {
        let class_index = argmax(&probabilities).ok_or_else(|| {
            ClassifierError::Prediction("model returned no probabilities".to_string())
        })?;

        let label = labels.get(class_index).cloned().ok_or_else(|| {
            ClassifierError::Prediction(format!("class index {class_index} is out of range"))
        })?;

        Ok(Self {
            label,
            class_index,
            probabilities,
        })
    }

    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.class_index).copied().unwrap_or(0.0)
    }
}

/// 最初に現れる最大値のインデックス（NaNは無視）
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// 推論エンジン
///
/// 読み込んだ重みは変更しません。
pub struct Classifier<B: Backend> {
    model: LeafClassifier<B>,
    config: InferenceConfig,
    device: B::Device,
}

impl<B: Backend> Classifier<B> {
    /// モデルを読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P, num_classes: usize, device: B::Device) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path.as_ref())?;
        let config = InferenceConfig::from_metadata(&metadata, num_classes)?;

        let model = ModelConfig::new(config.num_classes())
            .with_image_size(config.image_size)
            .init::<B>(&device)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
        let expected_params = model.num_params();

        // モデルの重みを復元
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| ClassifierError::ModelLoad(format!("failed to restore weights: {e:?}")))?;

        // load_record は形状を検証しないため、パラメータ数でメタデータとの整合を確認
        let model = model.load_record(record);
        if model.num_params() != expected_params {
            return Err(ClassifierError::ModelLoad(format!(
                "weights do not match a {}x{} input model ({} parameters, expected {})",
                config.image_size,
                config.image_size,
                model.num_params(),
                expected_params
            )));
        }
        debug!(
            "モデルを読み込みました: {} ({} クラス)",
            model_path.as_ref().display(),
            config.num_classes()
        );

        Ok(Self { model, config, device })
    }

    /// 前処理済みテンソルを分類
    pub fn predict_tensor(&self, image: &ImageTensor) -> Result<Prediction> {
        let input = image.to_tensor::<B>(&self.device);
        let output = self.model.probabilities(input);

        let probabilities = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::Prediction(format!("failed to read model output: {e:?}")))?;

        if probabilities.len() != self.config.num_classes() {
            return Err(ClassifierError::Prediction(format!(
                "model produced {} outputs, expected {}",
                probabilities.len(),
                self.config.num_classes()
            )));
        }

        Prediction::from_probabilities(probabilities, &self.config.class_labels)
    }

    /// 単一画像を分類
    pub fn predict<P: AsRef<Path>>(&self, image_path: P) -> Result<Prediction> {
        let image = preprocess_image(image_path.as_ref(), self.config.image_size)?;
        self.predict_tensor(&image)
    }

    /// 複数画像をバッチ分類
    pub fn predict_batch(&self, image_paths: &[impl AsRef<Path>]) -> Result<Vec<Prediction>> {
        image_paths.iter().map(|path| self.predict(path)).collect()
    }
}
