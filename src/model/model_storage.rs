//! モデルとメタデータの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（クラスラベル順、入力サイズなど）
//! - model.bin       - モデルの重み（Burnレコードのバイナリ）

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use tracing::info;

use crate::error::{ClassifierError, Result};
use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

fn save_err(context: &str, e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelSave(format!("{context}: {e}"))
}

fn load_err(context: &str, e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelLoad(format!("{context}: {e}"))
}

fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| save_err("Failed to set tar entry path", e))?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .map_err(|e| save_err(&format!("Failed to add {name} to archive"), e))
}

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 出力パスはそのまま使用します（拡張子の付け替えはしません）。
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<()> {
    // 親ディレクトリが存在しない場合は作成
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| save_err(&format!("Failed to create directory {}", parent.display()), e))?;
        }
    }

    let file = File::create(output_path)
        .map_err(|e| save_err(&format!("Failed to create {}", output_path.display()), e))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // gzipストリームまで確実に書き切る
    tar_builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| save_err("Failed to finalize archive", e))?;

    Ok(())
}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(path).map_err(|e| load_err(&format!("Failed to open {}", path.display()), e))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// アーカイブからモデルメタデータのみを読み込む
pub fn load_metadata(path: &Path) -> Result<ModelMetadata> {
    let mut archive = open_archive(path)?;

    let entries = archive.entries().map_err(|e| load_err("Failed to read archive", e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| load_err("Failed to read archive entry", e))?;
        let is_metadata = entry
            .path()
            .map(|p| p.to_str() == Some(METADATA_ENTRY))
            .unwrap_or(false);

        if is_metadata {
            let mut json_str = String::new();
            entry
                .read_to_string(&mut json_str)
                .map_err(|e| load_err("Failed to read metadata.json", e))?;
            return ModelMetadata::from_json_string(&json_str)
                .map_err(|e| load_err("Invalid metadata.json", e));
        }
    }

    Err(ClassifierError::ModelLoad(format!(
        "{METADATA_ENTRY} not found in {}",
        path.display()
    )))
}

/// メタデータとモデルバイナリを共に読み込む
pub fn load_model_with_metadata(path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let mut archive = open_archive(path)?;

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    let entries = archive.entries().map_err(|e| load_err("Failed to read archive", e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| load_err("Failed to read archive entry", e))?;
        let name = entry
            .path()
            .map_err(|e| load_err("Invalid archive entry path", e))?
            .to_string_lossy()
            .into_owned();

        match name.as_str() {
            METADATA_ENTRY => {
                let mut json_str = String::new();
                entry
                    .read_to_string(&mut json_str)
                    .map_err(|e| load_err("Failed to read metadata.json", e))?;
                metadata_opt = Some(
                    ModelMetadata::from_json_string(&json_str)
                        .map_err(|e| load_err("Invalid metadata.json", e))?,
                );
            }
            MODEL_ENTRY => {
                let mut buffer = Vec::new();
                entry
                    .read_to_end(&mut buffer)
                    .map_err(|e| load_err("Failed to read model.bin", e))?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(ClassifierError::ModelLoad(format!(
            "{METADATA_ENTRY} not found in {}",
            path.display()
        ))),
        (_, None) => Err(ClassifierError::ModelLoad(format!(
            "{MODEL_ENTRY} not found in {}",
            path.display()
        ))),
    }
}

/// メタデータをログに出力
pub fn print_metadata_info(metadata: &ModelMetadata) {
    info!("=== モデルメタデータ ===");
    info!("クラスラベル: {}", metadata.class_labels.join(", "));
    info!("モデル入力サイズ: {}x{}", metadata.image_size, metadata.image_size);
    info!("アーキテクチャ: {}", metadata.architecture);
    info!("学習エポック数: {}", metadata.num_epochs);
    info!("シード: {}", metadata.seed);
    info!("学習日時: {}", metadata.trained_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::LEAF_LABELS;

    fn sample_metadata() -> ModelMetadata {
        ModelMetadata::new(LEAF_LABELS.iter().map(|s| s.to_string()).collect(), 225, 5, 42)
    }

    #[test]
    fn test_save_and_load_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.keras");
        let metadata = sample_metadata();
        let binary = vec![1u8, 2, 3, 4, 5];

        save_model_with_metadata(&path, &metadata, &binary).unwrap();
        assert!(path.exists());

        let (loaded_metadata, loaded_binary) = load_model_with_metadata(&path).unwrap();
        assert_eq!(loaded_metadata, metadata);
        assert_eq!(loaded_binary, binary);

        assert_eq!(load_metadata(&path).unwrap(), metadata);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out").join("model.keras");

        save_model_with_metadata(&path, &sample_metadata(), &[0u8; 8]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model_with_metadata(&dir.path().join("missing.keras")).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }

    #[test]
    fn test_corrupt_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.keras");
        std::fs::write(&path, b"definitely not a gzip archive").unwrap();

        let err = load_model_with_metadata(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }

    #[test]
    fn test_archive_without_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.keras");

        let file = File::create(&path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        let json = sample_metadata().to_json_string().unwrap();
        append_entry(&mut builder, METADATA_ENTRY, json.as_bytes()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = load_model_with_metadata(&path).unwrap_err();
        assert!(err.to_string().contains("model.bin not found"));
    }
}
