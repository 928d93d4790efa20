//! Technical metadata probing.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::recording::TechnicalMetadata;

/// Something that can read technical metadata from a media file.
///
/// Failures are non-fatal for callers: they carry on with what they know.
pub trait MetadataProbe {
    /// Probe the file. Fields the probe cannot determine are `None`.
    fn probe(&mut self, path: &Path) -> PoiframeResult<TechnicalMetadata>;

    /// Probe name for logging.
    fn name(&self) -> &str;
}

/// Probe backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MetadataProbe for FfprobeProbe {
    fn probe(&mut self, path: &Path) -> PoiframeResult<TechnicalMetadata> {
        tracing::debug!(path = %path.display(), "Probing media metadata");
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,codec_name",
                "-show_entries",
                "format=duration,start_time",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| PoiframeError::probe(format!("Failed to start {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(PoiframeError::probe(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_json(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    start_time: Option<String>,
}

/// Parse ffprobe's JSON report into metadata.
pub fn parse_probe_json(raw: &str) -> PoiframeResult<TechnicalMetadata> {
    let parsed: ProbeOutput = serde_json::from_str(raw)
        .map_err(|e| PoiframeError::probe(format!("Unreadable ffprobe output: {e}")))?;

    let stream = parsed.streams.into_iter().next();
    let (width, height, frame_rate, codec) = match stream {
        Some(stream) => (
            stream.width.filter(|w| *w > 0),
            stream.height.filter(|h| *h > 0),
            stream.avg_frame_rate.as_deref().and_then(parse_frame_rate),
            stream.codec_name.filter(|c| !c.is_empty()),
        ),
        None => (None, None, None, None),
    };

    let (duration_secs, start_secs) = match parsed.format {
        Some(format) => (
            format.duration.as_deref().and_then(parse_seconds),
            format.start_time.as_deref().and_then(parse_seconds),
        ),
        None => (None, None),
    };

    Ok(TechnicalMetadata {
        width,
        height,
        frame_rate,
        codec,
        duration_secs,
        start_secs,
    })
}

/// Parse a frame rate given as a rational (`30000/1001`) or a decimal (`25`).
///
/// A zero denominator, an unparsable value, or a non-positive rate is
/// reported as unknown.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
