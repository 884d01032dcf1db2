//! 画像1枚を分類してラベルを出力する

use leaf_classifier::cli::run_inference_cli;
use leaf_classifier::OutputFormat;

fn main() {
    let code = run_inference_cli("infer", OutputFormat::Plain, std::env::args_os());
    std::process::exit(code);
}
