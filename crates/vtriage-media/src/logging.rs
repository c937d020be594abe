//! Structured run logging.
//!
//! Every lifecycle event of an analysis run carries the run ID and the
//! source path, so interleaved runs can be told apart.

use std::path::Path;
use tracing::{error, info, warn, Span};
use vtriage_models::RunId;

/// Logger for one analysis run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    video: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId, video: &Path) -> Self {
        Self {
            run_id: run_id.to_string(),
            video: video.display().to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, video = %self.video, "Run started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_id = %self.run_id, video = %self.video, "Run progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, video = %self.video, "Run warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, video = %self.video, "Run error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, video = %self.video, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn video(&self) -> &str {
        &self.video
    }

    /// Span attached to the run's async work and blocking tasks.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("triage_run", run_id = %self.run_id, video = %self.video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_fields() {
        let run_id = RunId::from_string("run-42");
        let logger = RunLogger::new(&run_id, Path::new("/videos/clip.mp4"));

        assert_eq!(logger.run_id(), "run-42");
        assert_eq!(logger.video(), "/videos/clip.mp4");
        logger.log_start("sampling at 0.5 fps");
        let _span = logger.create_span();
    }
}
