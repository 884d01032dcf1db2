//! 機械学習モデルの共通定義
//!
//! 葉の種類を分類するCNNモデルと関連する設定を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

// `derive(Config)` の展開が `Result` を参照するため、エラー型の別名は修飾して使う
use crate::error::ClassifierError;

/// クラス数
pub const NUM_CLASSES: usize = 7;

/// 画像サイズ
pub const IMAGE_SIZE: usize = 225;

/// 全結合隠れ層のユニット数
pub const HIDDEN_UNITS: usize = 64;

/// ネットワーク構成の識別子（メタデータで互換性チェックに使用）
pub const ARCHITECTURE: &str = "conv32-pool2-conv64-pool2-fc64-fc";

/// クラス名の定義（学習データのディレクトリ名のソート順と一致）
pub const LEAF_LABELS: [&str; NUM_CLASSES] = [
    "Acer Palmatum",
    "Acer Rubrum",
    "Aesculus Hippocastanum",
    "Betula Pendula",
    "Fagus Sylvatica",
    "Quercus Robur",
    "Tilia Cordata",
];

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 225)]
    pub image_size: usize,
}

impl ModelConfig {
    /// 2回目のプーリング後の特徴マップの一辺
    ///
    /// Conv (3x3, no padding): size -> size - 2
    /// Pool (2x2, stride 2):   size -> size / 2 (切り捨て)
    fn feature_map_size(&self) -> usize {
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        after_conv2 / 2
    }

    /// Flatten後の特徴次元
    pub fn flattened_size(&self) -> usize {
        let size = self.feature_map_size();
        64 * size * size
    }

    /// 設定が構成可能か検証
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.num_classes == 0 {
            return Err(ClassifierError::Config("num_classes must be positive".to_string()));
        }
        if self.feature_map_size() == 0 {
            return Err(ClassifierError::Config(format!(
                "input size {} is too small (minimum 10x10)",
                self.image_size
            )));
        }
        Ok(())
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<LeafClassifier<B>> {
        self.validate()?;

        let input = self.image_size;
        let size = self.feature_map_size();
        tracing::debug!(
            "モデル構成: 入力 {input}x{input}x3 -> 特徴マップ 64x{size}x{size} -> {} -> {} -> {}",
            self.flattened_size(),
            HIDDEN_UNITS,
            self.num_classes,
        );

        Ok(LeafClassifier {
            conv1: Conv2dConfig::new([3, 32], [3, 3]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(self.flattened_size(), HIDDEN_UNITS).init(device),
            fc2: LinearConfig::new(HIDDEN_UNITS, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// 葉分類用CNNモデル
///
/// # アーキテクチャ
/// - Conv 3x3 (32) + ReLU + MaxPool 2x2
/// - Conv 3x3 (64) + ReLU + MaxPool 2x2
/// - Flatten
/// - FC: d -> 64 + ReLU
/// - FC: 64 -> num_classes
/// - Softmax (`probabilities`)
///
/// 入力はチャネル最後 `[batch, height, width, 3]` です。
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,

    fc1: Linear<B>, // d -> 64
    fc2: Linear<B>, // 64 -> num_classes

    activation: Relu,
}

impl<B: Backend> LeafClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, height, width, 3]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        // NHWC -> NCHW
        let x = images.permute([0, 3, 1, 2]);

        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let [batch_size, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// クラス確率（各行の和は1）
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// 順伝播と損失計算（学習用）
    ///
    /// ロジットに対する交差エントロピーは softmax + categorical cross-entropy と等価です。
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
