//! Triage metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Completed runs by outcome (`scored`, `no_data`, `error`).
    pub const RUNS_TOTAL: &str = "triage_runs_total";

    /// Frames written by the sampler.
    pub const FRAMES_SAMPLED_TOTAL: &str = "triage_frames_sampled_total";

    /// Crops that could not be preprocessed for the classifier.
    pub const CROPS_DROPPED_TOTAL: &str = "triage_crops_dropped_total";

    /// Wall-clock duration of a run in seconds, by outcome.
    pub const RUN_DURATION_SECONDS: &str = "triage_run_duration_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a finished run.
pub fn record_run(outcome: &'static str, duration_secs: f64) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record frames produced by the sampler.
pub fn record_frames_sampled(count: usize) {
    counter!(names::FRAMES_SAMPLED_TOTAL).increment(count as u64);
}

/// Record crops dropped during preprocessing.
pub fn record_crops_dropped(count: usize) {
    if count > 0 {
        counter!(names::CROPS_DROPPED_TOTAL).increment(count as u64);
    }
}
