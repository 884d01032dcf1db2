//! 推論用の画像前処理
//!
//! 画像を読み込み、正方形にリサイズ（アスペクト比は維持しない）して
//! [0, 1] に正規化し、バッチ次元を付けます。

use std::path::Path;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, RgbImage};

use crate::error::{ClassifierError, Result};

/// 前処理済み画像 `[1, height, width, 3]`（チャネル最後）
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    size: usize,
}

impl ImageTensor {
    /// テンソル形状 `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size, self.size, 3]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Burnのテンソルに変換
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data(TensorData::new(self.data.clone(), self.shape()), device)
    }
}

/// RGB画像をリサイズ済みの画素列（HWC、0-255）に変換
///
/// Keras系の `load_img` と同様に最近傍補間を使用します。
pub fn resize_rgb(image: &RgbImage, size: usize) -> RgbImage {
    image::imageops::resize(image, size as u32, size as u32, FilterType::Nearest)
}

/// RGB画像を [0, 1] のf32列（HWC順）に変換
pub fn normalize_rgb(image: &RgbImage) -> Vec<f32> {
    image.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
}

/// 画像ファイルを読み込んでRGBに変換
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .map_err(|e| ClassifierError::Preprocess(format!("{}: {e}", path.display())))?;
    Ok(img.to_rgb8())
}

/// 画像を読み込んで推論用テンソルを作成
pub fn preprocess_image(path: &Path, size: usize) -> Result<ImageTensor> {
    let rgb = load_rgb(path)?;
    let resized = resize_rgb(&rgb, size);
    let data = normalize_rgb(&resized);

    debug_assert_eq!(data.len(), size * size * 3);

    Ok(ImageTensor { data, size })
}
