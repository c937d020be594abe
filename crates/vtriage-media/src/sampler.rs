//! Frame sampling.
//!
//! Decodes a video with FFmpeg and keeps every `step`-th frame, where
//! `step = max(1, round(native_fps / target_fps))`. Kept frames are written
//! as `frame_000000.jpg`, `frame_000001.jpg`, ... into the run's frame scope
//! and renumbered densely from zero, so an `N`-frame video yields
//! `ceil(N / step)` frames.
//!
//! A source that cannot be inspected or decoded is not an error: it produces
//! [`SampleOutcome::Unreadable`] so the caller can stop with a no-data
//! report. Only cancellation and timeouts propagate as errors.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vtriage_models::FrameRef;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Target rates below this are clamped before dividing.
pub const MIN_TARGET_FPS: f64 = 0.001;

/// Native rate assumed when the container does not report one.
pub const DEFAULT_NATIVE_FPS: f64 = 25.0;

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = "jpg";

/// A frame emitted by the sampler.
pub type SampledFrame = FrameRef;

/// What the sampler produced for one source.
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// Frames in source order. May be empty for a stream with no frames.
    Frames {
        frames: Vec<SampledFrame>,
        step: u32,
        native_fps: f64,
    },
    /// The source could not be opened or decoded.
    Unreadable { reason: String },
}

impl SampleOutcome {
    pub fn frames(&self) -> &[SampledFrame] {
        match self {
            Self::Frames { frames, .. } => frames,
            Self::Unreadable { .. } => &[],
        }
    }

    pub fn into_frames(self) -> Vec<SampledFrame> {
        match self {
            Self::Frames { frames, .. } => frames,
            Self::Unreadable { .. } => Vec::new(),
        }
    }

    /// True when there is nothing to analyze.
    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }
}

/// Decoder stride for a target sampling rate.
pub fn sampling_step(native_fps: f64, target_fps: f64) -> u32 {
    let target = target_fps.max(MIN_TARGET_FPS);
    let step = (native_fps / target).round();

    if !step.is_finite() || step < 1.0 {
        1
    } else {
        step.min(u32::MAX as f64) as u32
    }
}

/// Number of frames emitted for a source of `total_frames` frames.
pub fn expected_frame_count(total_frames: u64, step: u32) -> u64 {
    total_frames.div_ceil(step.max(1) as u64)
}

/// FFmpeg filter keeping decoded frames 0, step, 2*step, ...
pub fn select_filter(step: u32) -> String {
    format!("select='not(mod(n\\,{}))'", step.max(1))
}

/// Extracts frames from a video into a destination directory.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    runner: FfmpegRunner,
    jpeg_quality: u8,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(FfmpegRunner::new())
    }
}

impl FrameSampler {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            jpeg_quality: 2,
        }
    }

    /// Set JPEG quality for written frames (2 = best, 31 = worst).
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(2, 31);
        self
    }

    /// Sample `video` at `target_fps` into `destination`.
    pub async fn extract_frames(
        &self,
        video: &Path,
        target_fps: f64,
        destination: &Path,
    ) -> MediaResult<SampleOutcome> {
        let info = match probe_video(video).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Cannot open {}: {}", video.display(), e);
                return Ok(SampleOutcome::Unreadable {
                    reason: e.to_string(),
                });
            }
        };

        let native_fps = info.fps.unwrap_or(DEFAULT_NATIVE_FPS);
        let step = sampling_step(native_fps, target_fps);

        info!(
            "Sampling {} ({}x{} {}) at {:.3} fps: native {:.3} fps, step {}, expecting {} frames",
            video.display(),
            info.width,
            info.height,
            info.codec,
            target_fps,
            native_fps,
            step,
            info.frame_count
                .map(|n| expected_frame_count(n, step).to_string())
                .unwrap_or_else(|| "an unknown number of".to_string())
        );

        let pattern = destination.join(format!("{FRAME_PREFIX}%06d.{FRAME_EXTENSION}"));
        let cmd = FfmpegCommand::new(video, &pattern)
            .video_only()
            .video_filter(select_filter(step))
            .variable_frame_rate()
            .start_number(0)
            .jpeg_quality(self.jpeg_quality);

        let duration_ms = (info.duration * 1000.0) as i64;
        let run = self
            .runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    "Sampling progress: {:.1}% ({} frames decoded)",
                    progress.percentage(duration_ms),
                    progress.frame
                );
            })
            .await;

        let decode_error = match run {
            Ok(()) => None,
            Err(e) if e.is_interruption() => return Err(e),
            Err(e) => Some(e),
        };

        let frames = collect_frames(destination, step, native_fps).await?;

        match decode_error {
            Some(e) if frames.is_empty() => {
                warn!("Decoding {} failed: {}", video.display(), e);
                Ok(SampleOutcome::Unreadable {
                    reason: e.to_string(),
                })
            }
            Some(e) => {
                warn!(
                    "Decoding {} stopped early, keeping {} frames: {}",
                    video.display(),
                    frames.len(),
                    e
                );
                Ok(SampleOutcome::Frames {
                    frames,
                    step,
                    native_fps,
                })
            }
            None => {
                info!("Sampled {} frames from {}", frames.len(), video.display());
                Ok(SampleOutcome::Frames {
                    frames,
                    step,
                    native_fps,
                })
            }
        }
    }
}

/// List the frame files FFmpeg wrote and number them densely in order.
pub async fn collect_frames(
    destination: &Path,
    step: u32,
    native_fps: f64,
) -> MediaResult<Vec<SampledFrame>> {
    let mut numbered: Vec<(u64, PathBuf)> = Vec::new();

    let mut entries = tokio::fs::read_dir(destination).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(n) = frame_number(&path) {
            numbered.push((n, path));
        }
    }

    numbered.sort_by_key(|(n, _)| *n);

    numbered
        .into_iter()
        .enumerate()
        .map(|(index, (_, path))| {
            let index = u32::try_from(index)
                .map_err(|_| MediaError::internal("too many sampled frames"))?;
            Ok(FrameRef::new(index, step, native_fps, path))
        })
        .collect()
}

/// Parse `frame_000123.jpg` into 123.
fn frame_number(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != FRAME_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FRAME_PREFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtriage_models::FrameIndex;

    #[test]
    fn test_sampling_step() {
        assert_eq!(sampling_step(30.0, 0.5), 60);
        assert_eq!(sampling_step(25.0, 1.0), 25);
        assert_eq!(sampling_step(29.97, 2.0), 15);
        // Faster than native never skips below one.
        assert_eq!(sampling_step(30.0, 120.0), 1);
    }

    #[test]
    fn test_sampling_step_clamps_tiny_targets() {
        assert_eq!(sampling_step(25.0, 0.0), 25_000);
        assert_eq!(sampling_step(25.0, -3.0), 25_000);
        assert_eq!(sampling_step(25.0, 0.0005), 25_000);
    }

    #[test]
    fn test_expected_frame_count() {
        assert_eq!(expected_frame_count(300, 60), 5);
        assert_eq!(expected_frame_count(301, 60), 6);
        assert_eq!(expected_frame_count(1, 60), 1);
        assert_eq!(expected_frame_count(0, 60), 0);
        assert_eq!(expected_frame_count(7, 1), 7);
    }

    #[test]
    fn test_select_filter() {
        assert_eq!(select_filter(60), "select='not(mod(n\\,60))'");
        assert_eq!(select_filter(0), "select='not(mod(n\\,1))'");
    }

    #[test]
    fn test_frame_number() {
        assert_eq!(frame_number(Path::new("/x/frame_000012.jpg")), Some(12));
        assert_eq!(frame_number(Path::new("/x/frame_000012.png")), None);
        assert_eq!(frame_number(Path::new("/x/thumb_000012.jpg")), None);
    }

    #[tokio::test]
    async fn test_collect_frames_dense_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        for n in [2u32, 0, 1, 10] {
            tokio::fs::write(dir.path().join(format!("frame_{n:06}.jpg")), b"x")
                .await
                .unwrap();
        }
        tokio::fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        let frames = collect_frames(dir.path(), 30, 30.0).await.unwrap();

        assert_eq!(frames.len(), 4);
        let indices: Vec<_> = frames.iter().map(|f| f.index).collect();
        assert_eq!(
            indices,
            vec![FrameIndex(0), FrameIndex(1), FrameIndex(2), FrameIndex(3)]
        );
        assert!(frames[3].path.ends_with("frame_000010.jpg"));
        assert!((frames[2].timestamp_secs - 2.0).abs() < 1e-9);
        assert!(frames.windows(2).all(|w| w[0].source_index < w[1].source_index));
    }

    #[tokio::test]
    async fn test_missing_video_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = FrameSampler::default()
            .extract_frames(Path::new("/no/such/video.mp4"), 0.5, dir.path())
            .await
            .unwrap();

        assert!(outcome.is_empty());
        assert!(matches!(outcome, SampleOutcome::Unreadable { .. }));
    }
}
