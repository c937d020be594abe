//! Triage pipeline orchestration.
//!
//! One run goes sampler, then face location with heuristics and
//! preprocessing per frame, then a single classifier call, then fusion and
//! ranking. Per-frame work runs on the rayon pool inside a blocking task;
//! results keep frame order.
//!
//! Soft failures never leave [`TriagePipeline::analyze`] as errors: an
//! unreadable source becomes the no-data report, a frame that cannot be
//! decoded or a crop that cannot be preprocessed is skipped and counted, and
//! a classifier that fails at inference time is replaced by the placeholder.
//! Only cancellation, the run timeout, frame storage failures and task join
//! failures are errors.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, warn, Instrument};
use vtriage_models::{
    AnalysisReport, ClassifierScore, CropId, FrameRef, HeuristicScore, RunId, RunStats,
};

use crate::cancel::CancelSignal;
use crate::classifier::{
    placeholder_for, preprocess, ClassifierCache, ClassifierSelection, FaceClassifier,
    PreparedCrop,
};
use crate::command::FfmpegRunner;
use crate::config::TriageConfig;
use crate::error::{MediaError, MediaResult};
use crate::face::{build_locator, locate_faces, FaceLocator};
use crate::fusion::{fuse_scores, rank, CropInfo};
use crate::heuristics::score_crop;
use crate::logging::RunLogger;
use crate::metrics;
use crate::sampler::{FrameSampler, SampleOutcome};
use crate::storage::FrameScope;

/// Notes of the no-data report.
pub const NO_FRAMES_NOTE: &str = "Could not open video or extract frames.";

/// Closing note of every scored report.
pub const HEURISTIC_NOTE: &str =
    "This is heuristic output. Train a classifier on DFDC/FaceForensics++ for production.";

/// Builder for [`TriagePipeline`].
pub struct TriagePipelineBuilder {
    config: TriageConfig,
    locator: Option<Arc<dyn FaceLocator>>,
    classifier: Option<ClassifierSelection>,
    cache: Option<Arc<ClassifierCache>>,
    cancel: CancelSignal,
}

impl TriagePipelineBuilder {
    pub fn new(config: TriageConfig) -> Self {
        Self {
            config,
            locator: None,
            classifier: None,
            cache: None,
            cancel: CancelSignal::never(),
        }
    }

    /// Use this face locator instead of the configured one.
    pub fn locator(mut self, locator: Arc<dyn FaceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Use this classifier instead of loading the configured weights.
    pub fn classifier(mut self, selection: ClassifierSelection) -> Self {
        self.classifier = Some(selection);
        self
    }

    /// Share loaded models with other pipelines.
    pub fn classifier_cache(mut self, cache: Arc<ClassifierCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> TriagePipeline {
        let locator = self
            .locator
            .unwrap_or_else(|| build_locator(&self.config.face));

        let classifier = self.classifier.unwrap_or_else(|| {
            let weights = self.config.classifier.weights_path.as_deref();
            match &self.cache {
                Some(cache) => cache.get_or_load(weights, &self.config.classifier),
                None => crate::classifier::load_classifier(weights, &self.config.classifier),
            }
        });

        let fallback: Arc<dyn FaceClassifier> = Arc::new(placeholder_for(&self.config.classifier));

        TriagePipeline {
            config: self.config,
            locator,
            classifier,
            fallback,
            cancel: self.cancel,
        }
    }
}

/// Video triage pipeline.
pub struct TriagePipeline {
    config: TriageConfig,
    locator: Arc<dyn FaceLocator>,
    classifier: ClassifierSelection,
    fallback: Arc<dyn FaceClassifier>,
    cancel: CancelSignal,
}

/// Result of [`TriagePipeline::analyze`]. Owns the frame directory; a
/// temporary directory is removed when this is dropped.
#[derive(Debug)]
pub struct AnalysisRun {
    run_id: RunId,
    started_at: DateTime<Utc>,
    elapsed: Duration,
    report: AnalysisReport,
    scope: FrameScope,
}

impl AnalysisRun {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn report(&self) -> &AnalysisReport {
        &self.report
    }

    /// Take the report. Frame paths in it dangle once a temporary
    /// directory has been removed.
    pub fn into_report(self) -> AnalysisReport {
        self.report
    }

    /// Where the sampled frames live while this run is alive.
    pub fn frames_dir(&self) -> &Path {
        self.scope.path()
    }

    pub fn frames_are_temporary(&self) -> bool {
        self.scope.is_temporary()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Per-frame work done on the rayon pool.
enum FrameWork {
    Unreadable,
    Cropped {
        crops: Vec<CropWork>,
        full_frame: bool,
    },
}

struct CropWork {
    id: CropId,
    info: CropInfo,
    heuristic: Option<HeuristicScore>,
    prepared: Option<PreparedCrop>,
}

/// Classifier output for the prepared batch.
struct Classified {
    scores: Vec<ClassifierScore>,
    classifier: &'static str,
    placeholder: bool,
    fallback_reason: Option<String>,
}

impl TriagePipeline {
    pub fn builder(config: TriageConfig) -> TriagePipelineBuilder {
        TriagePipelineBuilder::new(config)
    }

    /// Pipeline with the configured locator and classifier.
    pub fn new(config: TriageConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ClassifierSelection {
        &self.classifier
    }

    pub fn locator_name(&self) -> &'static str {
        self.locator.name()
    }

    /// Analyze `video`, sampling at `target_fps`.
    pub async fn analyze(&self, video: &Path, target_fps: f64) -> MediaResult<AnalysisRun> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, video);
        let started_at = Utc::now();
        let started = Instant::now();

        logger.log_start(&format!(
            "target {:.3} fps, locator {}, classifier {}",
            target_fps,
            self.locator.name(),
            self.classifier.classifier().name()
        ));

        // Fires on the caller's signal or when this run times out.
        let (stop, cancel) = self.cancel.child();
        let run = self
            .run(video, target_fps, &run_id, &cancel, &logger, started)
            .instrument(logger.create_span());

        let result = match self.config.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    stop.send_replace(true);
                    Err(MediaError::Timeout(limit.as_secs()))
                }
            },
            None => run.await,
        };

        let elapsed = started.elapsed();
        match result {
            Ok((report, scope)) => {
                let outcome = if report.is_no_data() { "no_data" } else { "scored" };
                metrics::record_run(outcome, elapsed.as_secs_f64());
                logger.log_completion(&match report.fake_probability() {
                    Some(p) => format!(
                        "fake probability {:.4} over {} crops in {:.1}s",
                        p,
                        report.ranked_frames().len(),
                        elapsed.as_secs_f64()
                    ),
                    None => format!("no frames in {:.1}s", elapsed.as_secs_f64()),
                });

                Ok(AnalysisRun {
                    run_id,
                    started_at,
                    elapsed,
                    report,
                    scope,
                })
            }
            Err(e) => {
                metrics::record_run("error", elapsed.as_secs_f64());
                logger.log_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        video: &Path,
        target_fps: f64,
        run_id: &RunId,
        cancel: &CancelSignal,
        logger: &RunLogger,
        started: Instant,
    ) -> MediaResult<(AnalysisReport, FrameScope)> {
        cancel.check()?;

        let scope = match &self.config.frames_dir {
            Some(root) => FrameScope::persistent(root, run_id)?,
            None => FrameScope::temporary(self.config.work_dir.as_deref())?,
        };

        let mut runner = FfmpegRunner::new().with_cancel(cancel.clone());
        if let Some(limit) = self.config.run_timeout {
            runner = runner.with_timeout(limit.saturating_sub(started.elapsed()));
        }
        let sampler = FrameSampler::new(runner).with_jpeg_quality(self.config.jpeg_quality);

        let frames = match sampler.extract_frames(video, target_fps, scope.path()).await? {
            SampleOutcome::Unreadable { reason } => {
                logger.log_warning(&format!("source unreadable: {}", reason));
                return Ok((AnalysisReport::no_data(NO_FRAMES_NOTE), scope));
            }
            SampleOutcome::Frames {
                frames,
                step,
                native_fps,
            } => {
                metrics::record_frames_sampled(frames.len());
                if frames.is_empty() {
                    logger.log_warning("sampler produced no frames");
                    return Ok((AnalysisReport::no_data(NO_FRAMES_NOTE), scope));
                }
                logger.log_progress(&format!(
                    "{} frames sampled (every {} of {:.2} fps)",
                    frames.len(),
                    step,
                    native_fps
                ));
                frames
            }
        };

        let report = self.score_frames(frames, cancel).await?;
        Ok((report, scope))
    }

    /// Score frames that are already on disk.
    pub async fn analyze_frames(&self, frames: Vec<FrameRef>) -> MediaResult<AnalysisReport> {
        self.score_frames(frames, &self.cancel).await
    }

    async fn score_frames(
        &self,
        frames: Vec<FrameRef>,
        cancel: &CancelSignal,
    ) -> MediaResult<AnalysisReport> {
        cancel.check()?;

        if frames.is_empty() {
            return Ok(AnalysisReport::no_data(NO_FRAMES_NOTE));
        }

        let frames_sampled = frames.len();
        let work = self.process_frames(frames, cancel.clone()).await?;
        cancel.check()?;

        let mut stats = RunStats {
            frames_sampled: frames_sampled as u32,
            ..RunStats::default()
        };
        let mut crops: HashMap<CropId, CropInfo> = HashMap::new();
        let mut heuristics: HashMap<CropId, HeuristicScore> = HashMap::new();
        let mut batch: Vec<PreparedCrop> = Vec::new();

        for frame in work {
            let FrameWork::Cropped {
                crops: frame_crops,
                full_frame,
            } = frame
            else {
                stats.frames_unreadable += 1;
                continue;
            };

            if full_frame {
                stats.full_frame_fallbacks += 1;
            }
            for crop in frame_crops {
                stats.crops_located += 1;
                crops.insert(crop.id, crop.info);
                if let Some(h) = crop.heuristic {
                    heuristics.insert(crop.id, h);
                }
                match crop.prepared {
                    Some(prepared) => batch.push(prepared),
                    None => stats.crops_dropped += 1,
                }
            }
        }

        if stats.frames_unreadable as usize == frames_sampled {
            warn!("None of the {} sampled frames could be decoded", frames_sampled);
            return Ok(AnalysisReport::no_data(NO_FRAMES_NOTE));
        }

        metrics::record_crops_dropped(stats.crops_dropped as usize);

        let classified = self.classify(batch).await?;
        cancel.check()?;

        stats.crops_classified = classified.scores.len() as u32;
        stats.classifier = classified.classifier.to_string();
        stats.placeholder_scores = classified.placeholder;

        let verdict = rank(fuse_scores(&classified.scores, &crops, &heuristics));
        let notes = self.notes(&stats, classified.fallback_reason.as_deref());

        if let Some(top) = verdict.top() {
            debug!(
                crop = %top.crop,
                score = top.combined,
                "Most suspicious crop at {:.2}s",
                top.frame.timestamp_secs
            );
        }

        debug!(
            frames = stats.frames_sampled,
            crops = stats.crops_located,
            classified = stats.crops_classified,
            "Frames analyzed"
        );

        Ok(AnalysisReport::scored(&verdict, notes, stats))
    }

    async fn process_frames(
        &self,
        frames: Vec<FrameRef>,
        cancel: CancelSignal,
    ) -> MediaResult<Vec<FrameWork>> {
        let locator = Arc::clone(&self.locator);
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            frames
                .par_iter()
                .map(|frame| {
                    cancel.check()?;
                    Ok(process_frame(locator.as_ref(), frame))
                })
                .collect::<MediaResult<Vec<_>>>()
        })
        .await
        .map_err(|e| MediaError::internal(format!("Frame analysis task failed: {}", e)))?
    }

    /// Score the whole batch in one call, falling back to the placeholder if
    /// the loaded model fails.
    async fn classify(&self, batch: Vec<PreparedCrop>) -> MediaResult<Classified> {
        let primary = Arc::clone(self.classifier.classifier());

        if batch.is_empty() {
            return Ok(Classified {
                scores: Vec::new(),
                classifier: primary.name(),
                placeholder: primary.is_placeholder(),
                fallback_reason: None,
            });
        }

        let span = tracing::Span::current();
        let (batch, result) = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let result = primary.predict(&batch);
            (batch, result.map(|scores| (scores, primary.name(), primary.is_placeholder())))
        })
        .await
        .map_err(|e| MediaError::internal(format!("Classifier task failed: {}", e)))?;

        let failure = match result {
            Ok((scores, name, placeholder)) if scores.len() == batch.len() => {
                return Ok(Classified {
                    scores: to_scores(&batch, &scores),
                    classifier: name,
                    placeholder,
                    fallback_reason: None,
                });
            }
            Ok((scores, _, _)) => format!(
                "classifier returned {} scores for {} crops",
                scores.len(),
                batch.len()
            ),
            Err(e) => e.to_string(),
        };

        warn!("Classifier failed, falling back to placeholder scores: {}", failure);
        let scores = self.fallback.predict(&batch)?;

        Ok(Classified {
            scores: to_scores(&batch, &scores),
            classifier: self.fallback.name(),
            placeholder: true,
            fallback_reason: Some(failure),
        })
    }

    fn notes(&self, stats: &RunStats, fallback_reason: Option<&str>) -> String {
        let mut notes: Vec<String> = Vec::new();

        if let Some(reason) = self.classifier.placeholder_reason() {
            notes.push(format!(
                "No trained classifier was used ({}); classifier scores are placeholders.",
                reason
            ));
        }
        if let Some(reason) = fallback_reason {
            notes.push(format!(
                "The classifier failed during inference ({}); scores were replaced by placeholders.",
                reason
            ));
        }
        if stats.frames_unreadable > 0 {
            notes.push(format!(
                "{} of {} frames could not be decoded and were skipped.",
                stats.frames_unreadable, stats.frames_sampled
            ));
        }
        if stats.crops_dropped > 0 {
            notes.push(format!(
                "{} crops could not be prepared for the classifier and were skipped.",
                stats.crops_dropped
            ));
        }
        notes.push(HEURISTIC_NOTE.to_string());

        notes.join(" ")
    }
}

fn process_frame(locator: &dyn FaceLocator, frame: &FrameRef) -> FrameWork {
    let image = match image::open(frame.path()) {
        Ok(image) => image.to_rgb8(),
        Err(e) => {
            warn!(frame = %frame.index, "Skipping unreadable frame {}: {}", frame.path().display(), e);
            return FrameWork::Unreadable;
        }
    };

    let located = locate_faces(locator, frame, &image);
    let full_frame = located.full_frame;

    let crops = located
        .crops
        .into_iter()
        .map(|crop| {
            let heuristic = score_crop(&crop.image);
            let prepared = match preprocess(crop.id, &crop.image) {
                Ok(prepared) => Some(prepared),
                Err(e) => {
                    debug!(crop = %crop.id, "Dropping crop: {}", e);
                    None
                }
            };
            CropWork {
                id: crop.id,
                info: CropInfo {
                    frame: crop.frame,
                    bbox: crop.bbox,
                    full_frame: crop.full_frame,
                },
                heuristic,
                prepared,
            }
        })
        .collect();

    FrameWork::Cropped { crops, full_frame }
}

fn to_scores(batch: &[PreparedCrop], scores: &[f32]) -> Vec<ClassifierScore> {
    batch
        .iter()
        .zip(scores)
        .map(|(crop, &score)| ClassifierScore {
            crop: crop.id,
            raw_probability: if score.is_finite() {
                (score as f64).clamp(0.0, 1.0)
            } else {
                0.0
            },
        })
        .collect()
}
