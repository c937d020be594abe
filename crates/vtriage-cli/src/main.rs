//! Video triage binary.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use vtriage_cli::{init_tracing, Args};
use vtriage_media::{CancelSignal, TriageConfig, TriagePipeline};
use vtriage_models::AnalysisReport;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.print_schema {
        let schema = schemars::schema_for!(AnalysisReport);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let video = args.video.clone().context("missing VIDEO argument")?;

    let mut config = TriageConfig::from_env();
    args.apply(&mut config);
    info!("Triage config: {:?}", config);

    // Ctrl-C cancels the run; FFmpeg is killed and frames are cleaned up.
    let (cancel_tx, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            cancel_tx.send(true).ok();
        }
    });

    let pipeline = TriagePipeline::builder(config.clone()).cancel(cancel).build();
    let run = pipeline
        .analyze(&video, config.target_fps)
        .await
        .with_context(|| format!("analysis of {} failed", video.display()))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(run.report())?
    } else {
        serde_json::to_string(run.report())?
    };
    println!("{json}");

    info!(
        run_id = %run.run_id(),
        started_at = %run.started_at().to_rfc3339(),
        "Run finished in {:.1}s",
        run.elapsed().as_secs_f64()
    );
    if !run.frames_are_temporary() {
        info!("Frames kept in {}", run.frames_dir().display());
    }

    Ok(())
}
