//! モデル学習
//!
//! 学習データ・検証データのディレクトリからデータローダーを作り、
//! BurnのLearnerで学習してモデルアーカイブを保存します。

use std::path::{Path, PathBuf};

use burn::{
    data::dataloader::DataLoaderBuilder,
    module::Module,
    optim::AdamConfig,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, LearningStrategy, TrainOutput, TrainStep, ValidStep,
    },
};
use tracing::{info, warn};

use crate::error::{ClassifierError, Result};
use crate::ml::augmentation::Augmenter;
use crate::ml::dataset::{LeafBatch, LeafBatcher, LeafDataset};
use crate::ml::{LeafClassifier, ModelConfig, LEAF_LABELS};
use crate::model::{print_metadata_info, save_model_with_metadata, AppConfig, ModelMetadata};

/// TrainStep実装 (学習時の順伝播 + 逆伝播)
impl<B: AutodiffBackend> TrainStep<LeafBatch<B>, ClassificationOutput<B>> for LeafClassifier<B> {
    fn step(&self, batch: LeafBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);
        let grads = item.loss.backward();
        TrainOutput::new(self, grads, item)
    }
}

/// ValidStep実装 (検証時の順伝播のみ)
impl<B: Backend> ValidStep<LeafBatch<B>, ClassificationOutput<B>> for LeafClassifier<B> {
    fn step(&self, batch: LeafBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// 学習・検証データセットを読み込み、クラス構成を検証する
///
/// 両者のクラス順は一致している必要があり、クラス数はモデルの出力数と等しい必要があります。
pub fn load_datasets(
    train_dir: &Path,
    valid_dir: &Path,
    num_classes: usize,
) -> Result<(LeafDataset, LeafDataset)> {
    let dataset_train = LeafDataset::from_directory(train_dir)?;
    let dataset_valid = LeafDataset::from_directory(valid_dir)?;

    info!(
        "Found {} images belonging to {} classes ({})",
        burn::data::dataset::Dataset::len(&dataset_train),
        dataset_train.num_classes(),
        train_dir.display()
    );
    info!(
        "Found {} images belonging to {} classes ({})",
        burn::data::dataset::Dataset::len(&dataset_valid),
        dataset_valid.num_classes(),
        valid_dir.display()
    );

    if dataset_train.class_names() != dataset_valid.class_names() {
        return Err(ClassifierError::Dataset(format!(
            "class directories differ between {} [{}] and {} [{}]",
            train_dir.display(),
            dataset_train.class_names().join(", "),
            valid_dir.display(),
            dataset_valid.class_names().join(", ")
        )));
    }

    if dataset_train.num_classes() != num_classes {
        return Err(ClassifierError::Dataset(format!(
            "expected {} class directories, found {}",
            num_classes,
            dataset_train.num_classes()
        )));
    }

    if dataset_train.class_names().iter().map(String::as_str).ne(LEAF_LABELS.iter().copied()) {
        warn!(
            "クラス名が既定のラベルと異なります: {}（メタデータに実際の順序を保存します）",
            dataset_train.class_names().join(", ")
        );
    }

    for (name, count) in dataset_train.class_names().iter().zip(dataset_train.class_counts()) {
        info!("  クラス '{}': {} 枚", name, count);
    }

    Ok((dataset_train, dataset_valid))
}

/// モデル学習を実行
///
/// 学習済みモデルとメタデータを `config.model.model_path` に保存し、保存したメタデータを返します。
pub fn train_model<B: AutodiffBackend>(config: &AppConfig, device: B::Device) -> Result<ModelMetadata> {
    let training = &config.training;
    let image_size = config.model.image_size;
    let num_classes = config.model.num_classes;

    let (dataset_train, dataset_valid) = load_datasets(
        Path::new(&training.train_dir),
        Path::new(&training.valid_dir),
        num_classes,
    )?;
    let class_labels = dataset_train.class_names().to_vec();

    // 重み初期化・シャッフルを再現可能にする
    B::seed(&device, training.seed);

    let augmenter = Augmenter::new(config.augmentation.clone());
    let batcher_train =
        LeafBatcher::<B>::with_augmentation(device.clone(), image_size, augmenter, training.seed);
    let batcher_valid = LeafBatcher::<B::InnerBackend>::new(device.clone(), image_size);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(training.batch_size)
        .shuffle(training.seed)
        .num_workers(training.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(training.batch_size)
        .num_workers(training.num_workers)
        .build(dataset_valid);

    let model = ModelConfig::new(num_classes)
        .with_image_size(image_size)
        .init::<B>(&device)?;

    // アーティファクトディレクトリ（チェックポイント・メトリクスログ）
    let (artifact_dir, is_temporary) = match &training.artifact_dir {
        Some(dir) => (PathBuf::from(dir), false),
        None => (std::env::temp_dir().join("leaf_classifier_training"), true),
    };
    std::fs::create_dir_all(&artifact_dir)?;
    let artifact_dir_str = artifact_dir.to_string_lossy().to_string();

    info!("学習を開始します...");
    info!(
        "エポック数: {}, バッチサイズ: {}, 学習率: {}",
        training.num_epochs, training.batch_size, training.learning_rate
    );

    let learner = LearnerBuilder::new(&artifact_dir_str)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(training.num_epochs)
        .summary()
        .build(model, AdamConfig::new().init(), training.learning_rate);

    let model_trained = learner.fit(dataloader_train, dataloader_valid);
    let trained_model = model_trained.model;

    info!("学習が完了しました（パラメータ数: {}）", trained_model.num_params());

    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let model_binary = recorder
        .record(trained_model.into_record(), ())
        .map_err(|e| ClassifierError::ModelSave(format!("Failed to serialize weights: {e:?}")))?;

    let metadata = ModelMetadata::new(
        class_labels,
        image_size,
        training.num_epochs as u32,
        training.seed,
    );

    let model_path = PathBuf::from(&config.model.model_path);
    save_model_with_metadata(&model_path, &metadata, &model_binary)?;
    info!(
        "モデルを保存しました: {} ({:.2} MB)",
        model_path.display(),
        model_binary.len() as f64 / 1024.0 / 1024.0
    );
    print_metadata_info(&metadata);

    if is_temporary {
        std::fs::remove_dir_all(&artifact_dir).ok();
    }

    Ok(metadata)
}
