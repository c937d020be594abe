//! Sampling and full runs against scripted `ffprobe`/`ffmpeg` stand-ins.
//!
//! The stand-ins are shell scripts put first on `PATH`. The "video" handed
//! to them is a shell fragment describing the source:
//! - `FRAMES`, `FPS`: what ffprobe reports and how many frames exist
//! - `FAIL_AFTER`: ffmpeg exits 1 after writing this many frames
//! - `META_FAIL`: ffprobe exits 1
//! - `FIXTURE`: JPEG copied for every emitted frame
//!
//! The ffmpeg script honours the `select` step it is given, so frame counts
//! come from the real command line.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use image::{GrayImage, Rgb, RgbImage};
use tempfile::TempDir;
use vtriage_media::classifier::ClassifierSelection;
use vtriage_media::sampler::expected_frame_count;
use vtriage_media::{
    FaceLocator, FrameSampler, MediaError, MediaResult, NoFaceLocator, SampleOutcome,
    TriageConfig, TriagePipeline,
};
use vtriage_models::{AnalysisReport, FrameIndex, PixelRect};

const FFPROBE: &str = r#"#!/bin/sh
for last in "$@"; do :; done
. "$last"
if [ -n "$META_FAIL" ]; then
    echo "Invalid data found when processing input" >&2
    exit 1
fi
printf '{"streams":[{"codec_type":"video","codec_name":"mjpeg","width":64,"height":48,"r_frame_rate":"%s/1","avg_frame_rate":"%s/1","nb_frames":"%s"}],"format":{"duration":"1.0"}}\n' "$FPS" "$FPS" "$FRAMES"
"#;

const FFMPEG: &str = r#"#!/bin/sh
prev=""
for arg in "$@"; do
    case "$prev" in
        -i) input="$arg" ;;
        -vf) filter="$arg" ;;
    esac
    prev="$arg"
done
pattern="$prev"
. "$input"
step=$(printf '%s' "$filter" | sed -n 's/.*n\\,\([0-9][0-9]*\)).*/\1/p')
written=0
i=0
while [ "$i" -lt "$FRAMES" ]; do
    if [ $((i % step)) -eq 0 ]; then
        if [ -n "$FAIL_AFTER" ] && [ "$written" -ge "$FAIL_AFTER" ]; then
            echo "Error while decoding stream #0:0" >&2
            exit 1
        fi
        cp "$FIXTURE" "$(printf "$pattern" "$written")"
        written=$((written + 1))
    fi
    i=$((i + 1))
done
[ -z "$FAIL_AFTER" ] || exit 1
echo "progress=end" >&2
"#;

static STUBS: OnceLock<PathBuf> = OnceLock::new();

fn install_stubs() {
    STUBS.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("vtriage-ffmpeg-stubs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, script) in [("ffprobe", FFPROBE), ("ffmpeg", FFMPEG)] {
            let path = dir.join(name);
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut paths = vec![dir.clone()];
        paths.extend(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default()));
        std::env::set_var("PATH", std::env::join_paths(paths).unwrap());
        dir
    });
}

struct FakeVideo {
    dir: TempDir,
    path: PathBuf,
}

impl FakeVideo {
    fn new(frames: u32, fps: u32, extra: &str) -> Self {
        install_stubs();

        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.jpg");
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]))
            .save(&fixture)
            .unwrap();

        let path = dir.path().join("clip.mp4");
        std::fs::write(
            &path,
            format!(
                "FRAMES={frames}\nFPS={fps}\nFIXTURE={}\n{extra}\n",
                fixture.display()
            ),
        )
        .unwrap();

        Self { dir, path }
    }

    fn fixture(&self) -> PathBuf {
        self.dir.path().join("fixture.jpg")
    }
}

fn placeholder_pipeline(config: TriageConfig, locator: Arc<dyn FaceLocator>) -> TriagePipeline {
    let selection = ClassifierSelection::placeholder(&config.classifier, "no weights in tests");
    TriagePipeline::builder(config)
        .locator(locator)
        .classifier(selection)
        .build()
}

fn frame_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("frame_")
        })
        .count()
}

#[tokio::test]
async fn test_sampler_emits_every_step_frame() {
    let video = FakeVideo::new(10, 30, "");
    let out = tempfile::tempdir().unwrap();

    let outcome = FrameSampler::default()
        .extract_frames(&video.path, 10.0, out.path())
        .await
        .unwrap();

    let SampleOutcome::Frames {
        frames,
        step,
        native_fps,
    } = outcome
    else {
        panic!("expected frames, got {outcome:?}");
    };

    assert_eq!(step, 3);
    assert!((native_fps - 30.0).abs() < 1e-9);
    assert_eq!(frames.len() as u64, expected_frame_count(10, 3));

    let indices: Vec<FrameIndex> = frames.iter().map(|f| f.index).collect();
    assert_eq!(indices, (0..4).map(FrameIndex).collect::<Vec<_>>());
    let sources: Vec<u64> = frames.iter().map(|f| f.source_index).collect();
    assert_eq!(sources, vec![0, 3, 6, 9]);
    assert!(frames.windows(2).all(|w| w[0].timestamp_secs < w[1].timestamp_secs));
    assert!((frames[1].timestamp_secs - 0.1).abs() < 1e-9);
    assert!(frames.iter().all(|f| f.path.starts_with(out.path()) && f.path.exists()));
}

#[tokio::test]
async fn test_sampler_keeps_frames_written_before_failure() {
    let video = FakeVideo::new(10, 30, "FAIL_AFTER=2");
    let out = tempfile::tempdir().unwrap();

    let outcome = FrameSampler::default()
        .extract_frames(&video.path, 10.0, out.path())
        .await
        .unwrap();

    assert!(matches!(outcome, SampleOutcome::Frames { .. }));
    assert_eq!(outcome.frames().len(), 2);
}

#[tokio::test]
async fn test_decode_failure_without_frames_is_unreadable() {
    let video = FakeVideo::new(10, 30, "FAIL_AFTER=0");
    let out = tempfile::tempdir().unwrap();

    let outcome = FrameSampler::default()
        .extract_frames(&video.path, 10.0, out.path())
        .await
        .unwrap();

    let SampleOutcome::Unreadable { reason } = &outcome else {
        panic!("expected an unreadable source, got {outcome:?}");
    };
    assert!(reason.contains("FFmpeg"));
}

#[tokio::test]
async fn test_metadata_failure_is_unreadable() {
    let video = FakeVideo::new(10, 30, "META_FAIL=1");
    let out = tempfile::tempdir().unwrap();

    let outcome = FrameSampler::default()
        .extract_frames(&video.path, 10.0, out.path())
        .await
        .unwrap();

    assert!(matches!(outcome, SampleOutcome::Unreadable { .. }));
    assert_eq!(frame_files(out.path()), 0);
}

#[tokio::test]
async fn test_persistent_frames_dir_ignores_stale_frames() {
    let broken = FakeVideo::new(10, 30, "FAIL_AFTER=0");
    let root = tempfile::tempdir().unwrap();
    for n in 0..3 {
        std::fs::copy(broken.fixture(), root.path().join(format!("frame_{n:06}.jpg"))).unwrap();
    }

    let config = TriageConfig {
        frames_dir: Some(root.path().to_path_buf()),
        ..TriageConfig::default()
    };
    let pipeline = placeholder_pipeline(config, Arc::new(NoFaceLocator));

    let run = pipeline.analyze(&broken.path, 10.0).await.unwrap();

    assert!(run.report().is_no_data(), "got {:?}", run.report());
    assert_eq!(frame_files(run.frames_dir()), 0);
    assert_eq!(frame_files(root.path()), 3);
}

#[tokio::test]
async fn test_shorter_video_does_not_inherit_earlier_frames() {
    let long = FakeVideo::new(12, 30, "");
    let short = FakeVideo::new(4, 30, "");
    let root = tempfile::tempdir().unwrap();

    let config = TriageConfig {
        frames_dir: Some(root.path().to_path_buf()),
        ..TriageConfig::default()
    };
    let pipeline = placeholder_pipeline(config, Arc::new(NoFaceLocator));

    let first = pipeline.analyze(&long.path, 10.0).await.unwrap();
    let second = pipeline.analyze(&short.path, 10.0).await.unwrap();

    assert_ne!(first.frames_dir(), second.frames_dir());
    assert_eq!(first.report().ranked_frames().len(), 4);

    let AnalysisReport::Scored { stats, .. } = second.report() else {
        panic!("expected a scored report, got {:?}", second.report());
    };
    assert_eq!(stats.frames_sampled, 2);
    assert_eq!(second.report().ranked_frames().len(), 2);
}

/// Sleeps on every frame and counts how many it was handed.
struct SlowLocator {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FaceLocator for SlowLocator {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn locate(&self, _gray: &GrayImage) -> MediaResult<Vec<PixelRect>> {
        std::thread::sleep(self.delay);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_stops_frame_work() {
    let workers = rayon::current_num_threads();
    let video = FakeVideo::new((2 * workers + 1) as u32, 1, "");

    let calls = Arc::new(AtomicUsize::new(0));
    let locator = SlowLocator {
        delay: Duration::from_millis(1500),
        calls: Arc::clone(&calls),
    };
    // Frames are kept on disk so late frames would still decode.
    let root = tempfile::tempdir().unwrap();
    let config = TriageConfig {
        run_timeout: Some(Duration::from_secs(1)),
        frames_dir: Some(root.path().to_path_buf()),
        ..TriageConfig::default()
    };
    let pipeline = placeholder_pipeline(config, Arc::new(locator));

    let err = pipeline.analyze(&video.path, 1.0).await.unwrap_err();
    assert!(matches!(err, MediaError::Timeout(1)));

    // Long enough for two more waves of frames if nothing stopped them.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let settled = calls.load(Ordering::SeqCst);
    assert!(
        settled <= workers,
        "{settled} frames processed after the timeout, at most {workers} were in flight"
    );
}
