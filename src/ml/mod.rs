pub mod ml_model;
pub mod preprocess;
pub mod augmentation;
pub mod dataset;
pub mod training;
pub mod inference;

pub use ml_model::{LeafClassifier, ModelConfig, ARCHITECTURE, HIDDEN_UNITS, IMAGE_SIZE, LEAF_LABELS, NUM_CLASSES};
pub use preprocess::{preprocess_image, ImageTensor};
pub use augmentation::Augmenter;
pub use dataset::{LeafBatch, LeafBatcher, LeafDataset, LeafItem};
pub use training::{load_datasets, train_model};
pub use inference::{Classifier, Prediction};
