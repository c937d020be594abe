//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output path or image sequence pattern
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Emit frames with their own timestamps instead of a constant rate.
    ///
    /// Without this FFmpeg duplicates frames to fill the gaps a `select`
    /// filter leaves behind.
    pub fn variable_frame_rate(self) -> Self {
        self.output_arg("-fps_mode").output_arg("vfr")
    }

    /// First number used in an image sequence output pattern.
    pub fn start_number(self, n: u32) -> Self {
        self.output_arg("-start_number").output_arg(n.to_string())
    }

    /// JPEG quality scale (2 = best, 31 = worst).
    pub fn jpeg_quality(self, q: u8) -> Self {
        self.output_arg("-q:v").output_arg(q.to_string())
    }

    /// Drop audio, subtitle and data streams.
    pub fn video_only(self) -> Self {
        self.output_args(["-an", "-sn", "-dn"])
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking, cancellation and a
/// time limit.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel: CancelSignal,
    timeout: Option<Duration>,
}

enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;
        self.cancel.check()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines feed the callback; everything else is kept for errors.
        let stderr_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains('=') && !line.contains(' ') {
                    if let Some(progress) = current.apply_line(&line) {
                        progress_callback(progress);
                    }
                    continue;
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }

            tail.join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        let status = result?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }

    /// Wait for the child, killing it on cancellation or timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let timeout = self.timeout;
        let timed_out = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let interrupt = tokio::select! {
            status = child.wait() => return Ok(status?),
            _ = self.cancel.cancelled() => Interrupt::Cancelled,
            _ = timed_out => Interrupt::TimedOut(timeout.unwrap_or_default()),
        };

        if let Err(e) = child.kill().await {
            warn!("Failed to kill FFmpeg process: {}", e);
        }

        match interrupt {
            Interrupt::Cancelled => {
                info!("FFmpeg cancelled, process killed");
                Err(MediaError::Cancelled)
            }
            Interrupt::TimedOut(limit) => {
                warn!("FFmpeg timed out after {:?}, process killed", limit);
                Err(MediaError::Timeout(limit.as_secs()))
            }
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "/tmp/frames/frame_%06d.jpg")
            .video_filter("select='not(mod(n\\,30))'")
            .variable_frame_rate()
            .start_number(0)
            .jpeg_quality(2);

        let args = cmd.build_args();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();

        assert_eq!(args[0], "-y");
        assert_eq!(args[input_pos + 1], "input.mp4");
        assert!(vf_pos > input_pos, "filters are output options");
        assert!(args.contains(&"vfr".to_string()));
        assert!(args.contains(&"-start_number".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/frames/frame_%06d.jpg");
    }

    #[test]
    fn test_progress_goes_to_stderr() {
        let args = FfmpegCommand::new("a.mp4", "b.jpg").build_args();
        let pos = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[pos + 1], "pipe:2");
    }

    #[test]
    fn test_video_only() {
        let args = FfmpegCommand::new("a.mp4", "b.jpg").video_only().build_args();
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"-sn".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_runner_does_not_spawn() {
        let (tx, cancel) = CancelSignal::channel();
        tx.send(true).unwrap();

        let runner = FfmpegRunner::new().with_cancel(cancel);
        let cmd = FfmpegCommand::new("missing.mp4", "out.jpg");

        // Either FFmpeg is absent or the run is refused before spawning.
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::Cancelled | MediaError::FfmpegNotFound));
    }
}
