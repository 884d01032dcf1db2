//! ディレクトリ構造の画像データセットとバッチャー
//!
//! `root/<クラス名>/**/*.png` の形式を想定します（クラスディレクトリ以下は再帰的に走査）。
//! クラスIDはサブディレクトリ名を辞書順に並べた位置です。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ClassifierError, Result};
use crate::ml::augmentation::Augmenter;
use crate::ml::preprocess::{load_rgb, normalize_rgb, resize_rgb};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
}

/// 学習データセット（パスのリストのみ保持）
#[derive(Debug, Clone)]
pub struct LeafDataset {
    samples: Vec<(PathBuf, usize)>, // (画像パス, クラスID)
    class_names: Vec<String>,
}

impl LeafDataset {
    /// ディレクトリから学習データを読み込む
    ///
    /// クラス順はサブディレクトリ名の辞書順です。
    pub fn from_directory(data_dir: &Path) -> Result<Self> {
        let read_dir = |dir: &Path| {
            std::fs::read_dir(dir)
                .map_err(|e| ClassifierError::Dataset(format!("Failed to read {}: {e}", dir.display())))
        };

        let mut class_dirs = Vec::new();
        for entry in read_dir(data_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                let class_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| {
                        ClassifierError::Dataset(format!("Invalid directory name: {}", path.display()))
                    })?
                    .to_string();
                class_dirs.push((class_name, path));
            }
        }
        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut samples = Vec::new();
        let mut class_names = Vec::with_capacity(class_dirs.len());

        for (class_id, (class_name, class_dir)) in class_dirs.into_iter().enumerate() {
            let mut files: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(&class_dir).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    ClassifierError::Dataset(format!("Failed to read {}: {e}", class_dir.display()))
                })?;
                if is_image_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }

            debug!("クラス {}: {} ({} 枚)", class_id, class_name, files.len());
            samples.extend(files.into_iter().map(|path| (path, class_id)));
            class_names.push(class_name);
        }

        if class_names.is_empty() {
            return Err(ClassifierError::Dataset(format!(
                "No class directories found in {}",
                data_dir.display()
            )));
        }

        if samples.is_empty() {
            return Err(ClassifierError::Dataset(format!(
                "No training samples found in {}",
                data_dir.display()
            )));
        }

        Ok(Self { samples, class_names })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// クラスごとのサンプル数
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_names.len()];
        for (_, label) in &self.samples {
            counts[*label] += 1;
        }
        counts
    }
}

/// データセットアイテム（画像パスのみ保持）
#[derive(Clone, Debug)]
pub struct LeafItem {
    pub path: PathBuf,
    pub label: usize,
}

impl Dataset<LeafItem> for LeafDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        let (path, label) = self.samples.get(index)?;
        Some(LeafItem {
            path: path.clone(),
            label: *label,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// バッチャー
///
/// 学習用は `with_augmentation` でデータ拡張を有効にします。
/// 乱数生成器は複数ワーカーで共有します。
#[derive(Clone)]
pub struct LeafBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
    augmenter: Option<Augmenter>,
    rng: Arc<Mutex<StdRng>>,
}

impl<B: Backend> LeafBatcher<B> {
    /// 拡張なし（検証用）
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self {
            device,
            image_size,
            augmenter: None,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(0))),
        }
    }

    /// 拡張あり（学習用）
    pub fn with_augmentation(device: B::Device, image_size: usize, augmenter: Augmenter, seed: u64) -> Self {
        Self {
            device,
            image_size,
            augmenter: Some(augmenter),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// 1枚の画像を読み込んでHWCのf32列に変換
    fn load_item(&self, path: &Path) -> Result<Vec<f32>> {
        let rgb = load_rgb(path)?;
        let mut resized = resize_rgb(&rgb, self.image_size);

        if let Some(augmenter) = &self.augmenter {
            // ロックが汚染されていても乱数状態はそのまま使える
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            resized = augmenter.augment(&resized, &mut *rng);
        }

        Ok(normalize_rgb(&resized))
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// [batch_size, size, size, 3]
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher<B> {
    fn batch(&self, items: Vec<LeafItem>, _device: &B::Device) -> LeafBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;
        let mut all_pixels = Vec::with_capacity(batch_size * size * size * 3);
        let mut targets_vec = Vec::with_capacity(batch_size);

        for item in items {
            match self.load_item(&item.path) {
                Ok(pixels) => all_pixels.extend_from_slice(&pixels),
                Err(e) => {
                    // 読めない画像はゼロで埋めて学習を継続
                    warn!("画像読み込み失敗 {}: {}", item.path.display(), e);
                    all_pixels.extend(std::iter::repeat(0.0f32).take(size * size * 3));
                }
            }
            targets_vec.push(item.label as i64);
        }

        let images = Tensor::<B, 4>::from_data(TensorData::new(all_pixels, [batch_size, size, size, 3]), &self.device);
        let targets = Tensor::<B, 1, Int>::from_ints(targets_vec.as_slice(), &self.device);

        LeafBatch { images, targets }
    }
}
