use std::path::Path;
use std::process::{Command, Output};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn_ndarray::{NdArray, NdArrayDevice};
use image::{ImageBuffer, Rgb, RgbImage};
use tempfile::tempdir;

use leaf_classifier::ml::{ModelConfig, LEAF_LABELS, NUM_CLASSES};
use leaf_classifier::model::{save_model_with_metadata, AppConfig, ModelMetadata};

fn run_in(bin: &str, dir: &Path, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .current_dir(dir)
        .env("LEAF_CONFIG", dir.join("config.json"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn infer(dir: &Path, args: &[&str]) -> Output {
    run_in(env!("CARGO_BIN_EXE_infer"), dir, args)
}

fn infer_json(dir: &Path, args: &[&str]) -> Output {
    run_in(env!("CARGO_BIN_EXE_infer_json"), dir, args)
}

/// 未学習モデルを小さい入力サイズで保存し、設定ファイルから参照させる
fn prepare_model(dir: &Path) {
    let device = NdArrayDevice::default();
    let model = ModelConfig::new(NUM_CLASSES)
        .with_image_size(32)
        .init::<NdArray<f32>>(&device)
        .unwrap();
    let bytes = NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
        .record(model.into_record(), ())
        .unwrap();
    prepare_model_bytes(dir, &bytes);
}

/// 任意の重みバイト列でモデルファイルと設定ファイルを作成
fn prepare_model_bytes(dir: &Path, bytes: &[u8]) {
    let labels = LEAF_LABELS.iter().map(|s| s.to_string()).collect();
    let metadata = ModelMetadata::new(labels, 32, 0, 42);
    let model_path = dir.join("weights").join("model.keras");
    save_model_with_metadata(&model_path, &metadata, bytes).unwrap();

    let mut config = AppConfig::default();
    config.model.model_path = model_path.to_string_lossy().to_string();
    config.save(dir.join("config.json")).unwrap();
}

fn write_leaf(path: &Path) {
    let img: RgbImage = ImageBuffer::from_fn(50, 70, |x, y| Rgb([(x * 5) as u8, 120, (y * 3) as u8]));
    img.save(path).unwrap();
}

fn assert_no_panic(output: &Output) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"), "unexpected panic: {stderr}");
}

#[test]
fn no_arguments_prints_usage() {
    let dir = tempdir().unwrap();
    for output in [infer(dir.path(), &[]), infer_json(dir.path(), &[])] {
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Usage:"));
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn two_arguments_prints_usage() {
    let dir = tempdir().unwrap();
    for output in [infer(dir.path(), &["a.png", "b.png"]), infer_json(dir.path(), &["a.png", "b.png"])] {
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Usage:"));
    }
}

#[test]
fn missing_model_exits_with_failure() {
    let dir = tempdir().unwrap();
    let output = infer(dir.path(), &["does-not-exist.png"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading model"));
    assert_no_panic(&output);
}

#[test]
fn nonexistent_image_exits_with_failure() {
    let dir = tempdir().unwrap();
    prepare_model(dir.path());

    for output in [
        infer(dir.path(), &["does-not-exist.png"]),
        infer_json(dir.path(), &["does-not-exist.png"]),
    ] {
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Error preprocessing image"));
        assert!(output.stdout.is_empty());
        assert_no_panic(&output);
    }
}

#[test]
fn plain_output_is_a_known_label_and_stable() {
    let dir = tempdir().unwrap();
    prepare_model(dir.path());
    write_leaf(&dir.path().join("leaf.png"));

    let first = infer(dir.path(), &["leaf.png"]);
    let second = infer(dir.path(), &["leaf.png"]);
    assert_eq!(first.status.code(), Some(0), "{}", String::from_utf8_lossy(&first.stderr));

    let label = String::from_utf8(first.stdout).unwrap();
    assert!(LEAF_LABELS.contains(&label.trim_end()));
    assert_eq!(label, String::from_utf8(second.stdout).unwrap());
}

#[test]
fn json_output_has_exactly_two_fields() {
    let dir = tempdir().unwrap();
    prepare_model(dir.path());
    write_leaf(&dir.path().join("leaf.png"));

    let plain = infer(dir.path(), &["leaf.png"]);
    let output = infer_json(dir.path(), &["leaf.png"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["features"], serde_json::json!(["poisionous", "round shape"]));

    let plain_label = String::from_utf8(plain.stdout).unwrap();
    assert_eq!(object["leaf_type"], plain_label.trim_end());
}

#[test]
fn corrupt_weights_exit_with_failure() {
    let dir = tempdir().unwrap();
    prepare_model_bytes(dir.path(), b"garbage");
    write_leaf(&dir.path().join("leaf.png"));

    for output in [infer(dir.path(), &["leaf.png"]), infer_json(dir.path(), &["leaf.png"])] {
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading model"));
        assert!(output.stdout.is_empty());
        assert_no_panic(&output);
    }
}

#[test]
fn hyphen_leading_image_path_is_classified() {
    let dir = tempdir().unwrap();
    prepare_model(dir.path());
    write_leaf(&dir.path().join("-leaf.png"));

    let output = infer(dir.path(), &["-leaf.png"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let label = String::from_utf8(output.stdout).unwrap();
    assert!(LEAF_LABELS.contains(&label.trim_end()));
}
