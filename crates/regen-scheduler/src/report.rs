//! Batch outcome reporting.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use poiframe_common::error::PoiframeError;
use poiframe_media_model::output::OutputId;
use poiframe_media_model::recording::RecordingId;

use crate::staleness::RebuildReason;

/// Why an output (or a whole recording) was not attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The recording's source file does not exist.
    InputMissing { path: PathBuf },
    /// Neither the output nor the fallback gives a target size.
    NoTargetSize,
    /// The bound keyframe cannot be framed.
    InvalidKeyframe { message: String },
    /// The binding violates its shape invariants.
    InvalidBinding { message: String },
}

impl SkipReason {
    /// The skip an error stands for. `None` for errors that count as
    /// failures.
    pub fn from_error(err: &PoiframeError) -> Option<Self> {
        match err {
            PoiframeError::InputMissing { path } => Some(Self::InputMissing { path: path.clone() }),
            PoiframeError::OutputConfigurationIncomplete { .. } => Some(Self::NoTargetSize),
            PoiframeError::InvalidKeyframeSequence { message } => Some(Self::InvalidKeyframe {
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InputMissing { path } => write!(f, "missing input {}", path.display()),
            SkipReason::NoTargetSize => f.write_str("no target size configured"),
            SkipReason::InvalidKeyframe { message } => write!(f, "invalid keyframe: {message}"),
            SkipReason::InvalidBinding { message } => write!(f, "invalid binding: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rebuilt {
    pub recording_id: RecordingId,
    pub output_id: OutputId,
    pub path: PathBuf,
    pub reason: RebuildReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub recording_id: RecordingId,
    /// `None` when the whole recording was skipped.
    pub output_id: Option<OutputId>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failed {
    pub recording_id: RecordingId,
    /// `None` for recording-level failures (store reads, probe writes).
    pub output_id: Option<OutputId>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeWarning {
    pub recording_id: RecordingId,
    pub message: String,
}

/// Everything that happened in one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub recordings: usize,
    pub rebuilt: Vec<Rebuilt>,
    /// Outputs found fresh.
    pub up_to_date: Vec<OutputId>,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failed>,
    pub probe_warnings: Vec<ProbeWarning>,
    /// The run stopped early on request.
    pub cancelled: bool,
}

impl BatchReport {
    /// Whether anything was skipped, failed, or left unattempted.
    pub fn has_problems(&self) -> bool {
        !self.skipped.is_empty() || !self.failed.is_empty() || self.cancelled
    }

    /// File a non-fatal error under skipped or failed.
    pub fn record_error(&mut self, recording_id: RecordingId, output_id: Option<OutputId>, err: &PoiframeError) {
        match SkipReason::from_error(err) {
            Some(reason) => self.skipped.push(Skipped {
                recording_id,
                output_id,
                reason,
            }),
            None => self.failed.push(Failed {
                recording_id,
                output_id,
                message: err.to_string(),
            }),
        }
    }

    /// Ids of the outputs rebuilt in this run.
    pub fn rebuilt_ids(&self) -> Vec<OutputId> {
        self.rebuilt.iter().map(|r| r.output_id).collect()
    }

    /// Human-readable end-of-batch summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} recording(s): {} rebuilt, {} up to date, {} skipped, {} failed",
            self.recordings,
            self.rebuilt.len(),
            self.up_to_date.len(),
            self.skipped.len(),
            self.failed.len()
        );

        for skipped in &self.skipped {
            let _ = match skipped.output_id {
                Some(output_id) => writeln!(
                    out,
                    "  skipped output {output_id} (recording {}): {}",
                    skipped.recording_id, skipped.reason
                ),
                None => writeln!(
                    out,
                    "  skipped recording {}: {}",
                    skipped.recording_id, skipped.reason
                ),
            };
        }
        for failed in &self.failed {
            let _ = match failed.output_id {
                Some(output_id) => writeln!(
                    out,
                    "  failed output {output_id} (recording {}): {}",
                    failed.recording_id, failed.message
                ),
                None => writeln!(
                    out,
                    "  failed recording {}: {}",
                    failed.recording_id, failed.message
                ),
            };
        }
        for warning in &self.probe_warnings {
            let _ = writeln!(
                out,
                "  probe warning (recording {}): {}",
                warning.recording_id, warning.message
            );
        }
        if self.cancelled {
            out.push_str("  cancelled before all outputs were processed\n");
        }
        out
    }
}
