//! Reframe a whole clip along a POI keyframe path.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use poiframe_common::config::AppConfig;
use poiframe_media_model::keyframe::parse_poi_csv;
use poiframe_render_engine::invoker::{
    AudioMode, FfmpegInvoker, RateControl, TransformInvoker, TransformRequest,
};
use poiframe_transform_core::FilterChain;

#[derive(Args, Debug)]
pub struct ReframeArgs {
    /// Input video
    #[arg(long = "in", default_value = "in.mov")]
    pub input: PathBuf,

    /// POI keyframes (CSV: t,x,y,z with a header row)
    #[arg(long, default_value = "poi.csv")]
    pub poi: PathBuf,

    /// Output video
    #[arg(long = "out", default_value = "out_reframe.mp4")]
    pub output: PathBuf,

    /// Output width
    #[arg(long, default_value = "1920")]
    pub out_w: u32,

    /// Output height
    #[arg(long, default_value = "1080")]
    pub out_h: u32,

    /// Video encoder
    #[arg(long, default_value = "h264_videotoolbox")]
    pub venc: String,

    /// Video bitrate
    #[arg(long, default_value = "20M")]
    pub vb: String,

    /// Print the ffmpeg command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: ReframeArgs, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let content = std::fs::read_to_string(&args.poi)
        .with_context(|| format!("Failed to read POI file {}", args.poi.display()))?;
    let samples = parse_poi_csv(&content)
        .with_context(|| format!("Invalid POI file {}", args.poi.display()))?;

    let request = reframe_request(&args, &samples)?;
    tracing::info!(
        keyframes = samples.len(),
        input = %args.input.display(),
        output = %args.output.display(),
        "Reframing clip"
    );

    let mut invoker = FfmpegInvoker::new(
        config.render.ffmpeg_bin.clone(),
        config.render.default_codec.clone(),
    )
    .dry_run(args.dry_run);
    invoker.invoke(&request)?;

    if !args.dry_run {
        println!("Reframed clip written to: {}", args.output.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn reframe_request(
    args: &ReframeArgs,
    samples: &[poiframe_media_model::keyframe::PoiSample],
) -> anyhow::Result<TransformRequest> {
    let filter = FilterChain::continuous(args.out_w, args.out_h, samples)?;
    Ok(TransformRequest {
        input: args.input.clone(),
        output: args.output.clone(),
        width: args.out_w,
        height: args.out_h,
        frame_rate: None,
        codec: Some(args.venc.clone()),
        filter: filter.to_string(),
        seek_secs: None,
        max_duration_secs: None,
        audio: AudioMode::Copy,
        rate_control: RateControl::Bitrate(args.vb.clone()),
    })
}
