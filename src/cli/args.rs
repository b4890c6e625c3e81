// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

use crate::inference::KeypointSpace;

/// Default model path.
pub const DEFAULT_MODEL: &str = "hrnet_pose.onnx";

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Predict Options:
    --model, -m <MODEL>          Path to ONNX pose model [default: hrnet_pose.onnx]
    --source, -s <SOURCE>        Image file, directory, or glob such as images/*.jpg
    --flags                      Print the posture flags that fired
    --json                       Print one JSON report per image
    --keypoint-space <SPACE>     Pixel space of keypoints: source or model-input [default: source]
    --imgsz <H,W>                Model input size override
    --threads <N>                ONNX Runtime intra-op threads, 0 for auto [default: 0]
    --save                       Save annotated images to runs/posture/predict
    --verbose                    Show verbose output

Examples:
    posture-inference predict --model hrnet_pose.onnx --source person.jpg
    posture-inference predict -m hrnet_pose.onnx -s frames/ --flags --save
    posture-inference predict -m hrnet_pose.onnx -s "frames/*.png" --json --keypoint-space model-input"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify sitting posture in an image or a directory of images
    Predict(PredictArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Path to ONNX pose model file
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Input source (image, directory, or glob)
    #[arg(short, long)]
    pub source: String,

    /// Include triggered posture flags in the output
    #[arg(long, default_value_t = false)]
    pub flags: bool,

    /// Print reports as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Pixel space of reported keypoints (source or model-input)
    #[arg(long, default_value = "source")]
    pub keypoint_space: KeypointSpace,

    /// Model input size as H,W
    #[arg(long, value_delimiter = ',', num_args = 1..=2)]
    pub imgsz: Option<Vec<usize>>,

    /// Number of intra-op threads (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Save annotated images to runs/posture/predict
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

impl PredictArgs {
    /// Model input size override as (height, width); a single value is square.
    #[must_use]
    pub fn input_size(&self) -> Option<(usize, usize)> {
        match self.imgsz.as_deref() {
            Some([h, w]) => Some((*h, *w)),
            Some([s]) => Some((*s, *s)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_args_defaults() {
        let args = Cli::parse_from(["app", "predict", "--source", "person.jpg"]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, DEFAULT_MODEL);
                assert_eq!(predict_args.source, "person.jpg");
                assert_eq!(predict_args.keypoint_space, KeypointSpace::Source);
                assert!(!predict_args.flags);
                assert!(!predict_args.json);
                assert!(!predict_args.save);
                assert!(predict_args.verbose);
                assert_eq!(predict_args.input_size(), None);
                assert_eq!(predict_args.threads, 0);
            }
        }
    }

    #[test]
    fn test_predict_args_custom() {
        let args = Cli::parse_from([
            "app",
            "predict",
            "--model",
            "custom.onnx",
            "--source",
            "frames/",
            "--flags",
            "--json",
            "--keypoint-space",
            "model-input",
            "--imgsz",
            "384,288",
            "--verbose",
            "false",
        ]);
        match args.command {
            Commands::Predict(predict_args) => {
                assert_eq!(predict_args.model, "custom.onnx");
                assert_eq!(predict_args.source, "frames/");
                assert!(predict_args.flags);
                assert!(predict_args.json);
                assert_eq!(predict_args.keypoint_space, KeypointSpace::ModelInput);
                assert_eq!(predict_args.input_size(), Some((384, 288)));
                assert!(!predict_args.verbose);
            }
        }
    }

    #[test]
    fn test_source_is_required() {
        assert!(Cli::try_parse_from(["app", "predict"]).is_err());
    }

    #[test]
    fn test_invalid_keypoint_space() {
        assert!(
            Cli::try_parse_from(["app", "predict", "-s", "a.jpg", "--keypoint-space", "screen"])
                .is_err()
        );
    }
}
