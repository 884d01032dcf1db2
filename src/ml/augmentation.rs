//! 学習データ用のデータ拡張
//!
//! ランダムせん断・ランダムズーム・ランダム左右反転のみを扱います。
//! 範囲外の画素は最も近い境界画素で埋めます。検証データには適用しません。

use image::{imageops, ImageBuffer, RgbImage};
use rand::Rng;

use crate::model::AugmentationSettings;

/// データ拡張器
#[derive(Debug, Clone)]
pub struct Augmenter {
    settings: AugmentationSettings,
}

impl Augmenter {
    pub fn new(settings: AugmentationSettings) -> Self {
        Self { settings }
    }

    /// 画像にランダムな拡張を適用
    pub fn augment<R: Rng>(&self, image: &RgbImage, rng: &mut R) -> RgbImage {
        let shear = if self.settings.shear_range > 0.0 {
            let range = self.settings.shear_range;
            rng.gen_range(-range..=range).to_radians()
        } else {
            0.0
        };

        let (zoom_x, zoom_y) = if self.settings.zoom_range > 0.0 {
            let low = 1.0 - self.settings.zoom_range;
            let high = 1.0 + self.settings.zoom_range;
            (rng.gen_range(low..=high), rng.gen_range(low..=high))
        } else {
            (1.0, 1.0)
        };

        let mut result = if shear == 0.0 && zoom_x == 1.0 && zoom_y == 1.0 {
            image.clone()
        } else {
            affine_nearest(image, shear, zoom_x, zoom_y)
        };

        if self.settings.horizontal_flip && rng.gen_bool(0.5) {
            result = imageops::flip_horizontal(&result);
        }

        result
    }
}

/// 画像中心を基準にせん断＋ズームの逆写像でサンプリング
///
/// 出力 (row, col) は入力の
/// `row' = zx * dr - sin(shear) * zy * dc`、`col' = cos(shear) * zy * dc` から取得します。
/// 倍率が1より大きいと縮小、小さいと拡大になります。
fn affine_nearest(image: &RgbImage, shear: f32, zoom_x: f32, zoom_y: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let center_row = (height as f32 - 1.0) / 2.0;
    let center_col = (width as f32 - 1.0) / 2.0;
    let (sin, cos) = shear.sin_cos();
    let max_row = (height - 1) as f32;
    let max_col = (width - 1) as f32;

    ImageBuffer::from_fn(width, height, |col, row| {
        let dr = row as f32 - center_row;
        let dc = col as f32 - center_col;

        let src_row = zoom_x * dr - sin * zoom_y * dc + center_row;
        let src_col = cos * zoom_y * dc + center_col;

        let r = src_row.round().clamp(0.0, max_row) as u32;
        let c = src_col.round().clamp(0.0, max_col) as u32;
        *image.get_pixel(c, r)
    })
}
