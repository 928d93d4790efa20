//! Regenerate stale snapshots.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Args;

use poiframe_common::config::AppConfig;
use poiframe_media_store::SqliteStore;
use poiframe_regen_scheduler::{BatchReport, Scheduler, SchedulerOptions};
use poiframe_render_engine::invoker::{FfmpegInvoker, TransformInvoker};
use poiframe_render_engine::probe::FfprobeProbe;

/// Exit code when some outputs were skipped, failed, or not attempted.
const PARTIAL_SUCCESS: u8 = 2;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Base directory for output paths (defaults to the database directory)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Fallback output width
    #[arg(long)]
    pub out_w: Option<u32>,

    /// Fallback output height
    #[arg(long)]
    pub out_h: Option<u32>,

    /// Fallback max duration (seconds)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Print ffmpeg commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SnapshotArgs, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let db = args.db.clone().unwrap_or_else(|| config.database.clone());
    let store = SqliteStore::open(&db)?;
    let options = scheduler_options(&args, config, store.base_dir());

    let probe = FfprobeProbe::new(config.render.ffprobe_bin.clone());
    let invoker = FfmpegInvoker::new(
        config.render.ffmpeg_bin.clone(),
        config.render.default_codec.clone(),
    )
    .dry_run(args.dry_run);

    if !invoker.is_available() {
        tracing::warn!(
            binary = %config.render.ffmpeg_bin,
            "ffmpeg not found on PATH; every rebuild will fail"
        );
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current output");
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    tracing::info!(
        db = %db.display(),
        media_root = %options.media_root.display(),
        output_root = %options.output_root.display(),
        dry_run = args.dry_run,
        "Running snapshot batch"
    );

    let report = tokio::task::spawn_blocking(move || {
        let (mut store, mut probe, mut invoker) = (store, probe, invoker);
        Scheduler::new(&mut store, &mut probe, &mut invoker, options)
            .with_cancel_flag(cancel)
            .run()
    })
    .await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }

    Ok(ExitCode::from(exit_status(&report)))
}

fn scheduler_options(args: &SnapshotArgs, config: &AppConfig, base_dir: PathBuf) -> SchedulerOptions {
    let output_root = args.out_dir.clone().unwrap_or_else(|| base_dir.clone());
    SchedulerOptions {
        media_root: base_dir,
        output_root,
        fallback_width: args.out_w.or(config.render.width),
        fallback_height: args.out_h.or(config.render.height),
        fallback_duration_secs: args.duration.or(config.render.max_duration_secs),
        ..SchedulerOptions::from_render_defaults(&config.render)
    }
}

fn exit_status(report: &BatchReport) -> u8 {
    if report.has_problems() {
        PARTIAL_SUCCESS
    } else {
        0
    }
}
