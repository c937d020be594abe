use vtriage_media::classifier::load_classifier;
use vtriage_media::command::{check_ffmpeg, check_ffprobe};
use vtriage_media::{build_locator, FrameScope, TriageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = TriageConfig::from_env();

    println!(
        "vtriage-selfcheck: starting with work_dir={}",
        config
            .work_dir
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| std::env::temp_dir().display().to_string())
    );

    ensure_workdir(&config)?;
    ensure_tools()?;
    report_models(&config);

    println!("vtriage-selfcheck: ok");
    Ok(())
}

fn ensure_workdir(config: &TriageConfig) -> anyhow::Result<()> {
    let scope = FrameScope::temporary(config.work_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("work dir not writable: {}", e))?;
    std::fs::write(scope.path().join("write-check"), b"ok")?;
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("{}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("vtriage-selfcheck: ffmpeg={}", ffmpeg.display());
    println!("vtriage-selfcheck: ffprobe={}", ffprobe.display());
    Ok(())
}

/// Missing models are reported, not fatal: the pipeline degrades to
/// full-frame crops and placeholder scores.
fn report_models(config: &TriageConfig) {
    let locator = build_locator(&config.face);
    println!("vtriage-selfcheck: face locator={}", locator.name());

    let selection = load_classifier(config.classifier.weights_path.as_deref(), &config.classifier);
    match selection.placeholder_reason() {
        Some(reason) => println!("vtriage-selfcheck: classifier=placeholder ({})", reason),
        None => println!(
            "vtriage-selfcheck: classifier={}",
            selection.classifier().name()
        ),
    }
}
