//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vtriage_media::TriageConfig;

/// Heuristic video tampering triage.
///
/// Samples frames, locates faces, scores them and prints a JSON report.
/// Flags override the `TRIAGE_*` environment configuration.
#[derive(Debug, Parser)]
#[command(name = "vtriage", version, long_about = None)]
pub struct Args {
    /// Video file to analyze
    #[arg(required_unless_present = "print_schema")]
    pub video: Option<PathBuf>,

    /// Frames per second to sample
    #[arg(long)]
    pub fps: Option<f64>,

    /// ONNX classifier weights
    #[arg(long, conflicts_with = "no_model")]
    pub weights: Option<PathBuf>,

    /// Skip the classifier and use placeholder scores
    #[arg(long)]
    pub no_model: bool,

    /// SeetaFace detector model
    #[arg(long)]
    pub face_model: Option<PathBuf>,

    /// OpenCV Haar cascade XML (needs the `opencv` feature)
    #[arg(long)]
    pub cascade: Option<PathBuf>,

    /// Keep extracted frames in this directory
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Run time limit in seconds, 0 for none
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seed for random placeholder scores
    #[arg(long)]
    pub placeholder_seed: Option<u64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Print the JSON schema of the report and exit
    #[arg(long)]
    pub print_schema: bool,
}

impl Args {
    /// Overlay flags onto `config`.
    pub fn apply(&self, config: &mut TriageConfig) {
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
        if let Some(weights) = &self.weights {
            config.classifier.weights_path = Some(weights.clone());
        }
        if self.no_model {
            config.classifier.weights_path = None;
        }
        if let Some(model) = &self.face_model {
            config.face.seeta_model_path = Some(model.clone());
        }
        if let Some(cascade) = &self.cascade {
            config.face.cascade_path = Some(cascade.clone());
        }
        if let Some(dir) = &self.frames_dir {
            config.frames_dir = Some(dir.clone());
        }
        if let Some(secs) = self.timeout {
            config.run_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(seed) = self.placeholder_seed {
            config.classifier.placeholder_seed = Some(seed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "vtriage",
            "clip.mp4",
            "--fps",
            "2",
            "--weights",
            "/models/x.onnx",
            "--frames-dir",
            "/tmp/keep",
            "--timeout",
            "0",
        ])
        .unwrap();

        let mut config = TriageConfig::default();
        args.apply(&mut config);

        assert_eq!(args.video, Some(PathBuf::from("clip.mp4")));
        assert_eq!(config.target_fps, 2.0);
        assert_eq!(
            config.classifier.weights_path,
            Some(PathBuf::from("/models/x.onnx"))
        );
        assert_eq!(config.frames_dir, Some(PathBuf::from("/tmp/keep")));
        assert!(config.run_timeout.is_none());
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::try_parse_from(["vtriage", "clip.mp4"]).unwrap();
        let mut config = TriageConfig::default();
        args.apply(&mut config);

        assert_eq!(config.target_fps, 0.5);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(600)));
        assert!(!args.pretty);
    }

    #[test]
    fn test_no_model() {
        let args = Args::try_parse_from(["vtriage", "clip.mp4", "--no-model"]).unwrap();
        let mut config = TriageConfig::default();
        args.apply(&mut config);
        assert!(config.classifier.weights_path.is_none());
    }

    #[test]
    fn test_video_required_unless_printing_schema() {
        assert!(Args::try_parse_from(["vtriage"]).is_err());
        assert!(Args::try_parse_from(["vtriage", "--print-schema"]).is_ok());
    }

    #[test]
    fn test_weights_conflict_with_no_model() {
        assert!(Args::try_parse_from(["vtriage", "a.mp4", "--weights", "w.onnx", "--no-model"]).is_err());
    }
}
