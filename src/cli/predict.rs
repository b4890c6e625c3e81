// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::path::Path;
use std::process;

#[cfg(feature = "annotate")]
use crate::annotate::{annotate_image, find_next_run_dir};

use serde::Serialize;

use crate::cli::args::PredictArgs;
use crate::cli::logging::{set_verbose, verdict_label};
use crate::preprocessing::decode_image;
use crate::results::PostureReport;
use crate::source::Source;
use crate::{InferenceConfig, InferencePipeline, VERSION};
use crate::{error, section, verbose, warn};

/// One line of `--json` output.
#[derive(Serialize)]
struct JsonLine<'a> {
    path: &'a str,
    #[serde(flatten)]
    report: &'a PostureReport,
}

/// Run posture classification over every image of a source.
#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
pub fn run_prediction(args: &PredictArgs) {
    set_verbose(args.verbose && !args.json);

    let mut config = InferenceConfig::new()
        .with_keypoint_space(args.keypoint_space)
        .with_flags(args.flags)
        .with_threads(args.threads);
    if let Some((h, w)) = args.input_size() {
        config = config.with_imgsz(h, w);
    }

    let pipeline = match InferencePipeline::load(&args.model, config) {
        Ok(p) => p,
        Err(e) => {
            error!("Error loading model: {e}");
            process::exit(1);
        }
    };

    let paths = match Source::from(args.source.as_str()).paths() {
        Ok(paths) => paths,
        Err(e) => {
            error!("Invalid source '{}': {e}", args.source);
            process::exit(1);
        }
    };
    if paths.is_empty() {
        warn!("No images found in '{}'", args.source);
        process::exit(1);
    }

    let (in_h, in_w) = pipeline.input_size();
    section!("Posture Inference {VERSION} 🚀 Rust ONNX CPU");
    verbose!("{} summary: 17 keypoints, imgsz=({in_h}, {in_w}), keypoints in {} space", args.model, args.keypoint_space);
    verbose!("");

    #[cfg(feature = "annotate")]
    let save_dir = if args.save {
        let dir = find_next_run_dir("runs/posture", "predict");
        if let Err(e) = fs::create_dir_all(&dir) {
            error!("Failed to create save directory {dir}: {e}");
            process::exit(1);
        }
        Some(std::path::PathBuf::from(dir))
    } else {
        None
    };

    #[cfg(not(feature = "annotate"))]
    if args.save {
        warn!("--save requires the 'annotate' feature. Compile with --features annotate to enable saving.");
    }

    let total = paths.len();
    let mut processed = 0usize;
    let mut good = 0usize;
    let mut failed = 0usize;
    let mut total_preprocess = 0.0;
    let mut total_inference = 0.0;
    let mut total_postprocess = 0.0;

    for (i, path) in paths.iter().enumerate() {
        let path_str = path.display().to_string();
        let image = match fs::read(path).map_err(Into::into).and_then(|bytes| decode_image(&bytes)) {
            Ok(image) => image,
            Err(e) => {
                error!("{path_str}: {e}");
                failed += 1;
                continue;
            }
        };
        let analysis = match pipeline.analyze(&image) {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("{path_str}: {e}");
                failed += 1;
                continue;
            }
        };
        let report = pipeline.report(&analysis);

        processed += 1;
        if report.good {
            good += 1;
        }
        total_preprocess += analysis.speed.preprocess.unwrap_or(0.0);
        total_inference += analysis.speed.inference.unwrap_or(0.0);
        total_postprocess += analysis.speed.postprocess.unwrap_or(0.0);

        if args.json {
            let line = JsonLine {
                path: &path_str,
                report: &report,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!("{path_str}: failed to serialize report: {e}");
                }
            }
        } else if args.verbose {
            verbose!(
                "image {}/{} {}: {}x{} {}{}, {:.1}ms",
                i + 1,
                total,
                path_str,
                analysis.orig_shape.0,
                analysis.orig_shape.1,
                verdict_label(report.good),
                format_flags(&report),
                analysis.speed.inference.unwrap_or(0.0)
            );
        } else {
            println!("{path_str}: {}{}", verdict_label(report.good), format_flags(&report));
        }

        #[cfg(feature = "annotate")]
        if let Some(ref dir) = save_dir {
            let annotated = annotate_image(&image, &analysis.source_skeleton(), &analysis.verdict);
            let target = dir.join(output_name(path));
            if let Err(e) = annotated.save(&target) {
                error!("Failed to save {}: {e}", target.display());
            }
        }
    }

    let n = processed.max(1) as f64;
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image at shape (1, 3, {}, {})",
        total_preprocess / n,
        total_inference / n,
        total_postprocess / n,
        in_h,
        in_w
    );
    verbose!("Posture: {good}/{processed} good");

    #[cfg(feature = "annotate")]
    if let Some(ref dir) = save_dir {
        verbose!("Results saved to {}", dir.display());
    }

    if failed > 0 {
        warn!("{failed}/{total} images could not be processed");
        process::exit(1);
    }
}

/// Flag suffix such as " (uneven shoulders, slouching)"; empty when none were reported.
fn format_flags(report: &PostureReport) -> String {
    let descriptions = report.flag_descriptions();
    if descriptions.is_empty() {
        String::new()
    } else {
        format!(" ({})", descriptions.join(", "))
    }
}

/// File name for an annotated copy; formats the encoder can't write fall back to PNG.
#[cfg_attr(not(feature = "annotate"), allow(dead_code))]
fn output_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "bmp"))
        .unwrap_or_else(|| "png".to_string());
    format!("{stem}.{ext}")
}
