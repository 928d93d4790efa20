//! Derived outputs and the bindings that tie them to their inputs.

use serde::{Deserialize, Serialize};

use poiframe_common::clock::Timestamp;

use crate::keyframe::{CameraProfile, Keyframe};
use crate::recording::{CropWindow, RecordingId};

/// Store identifier of a derived output.
pub type OutputId = i64;

/// What a derived output is framed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// A letterboxed snapshot over a configured time range. No keyframe.
    FixedWindow,
    /// A short clip framed around one keyframe's instant and position.
    KeyframeBound,
}

impl OutputKind {
    /// The `kind` column value used by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::FixedWindow => "snapshot_base",
            OutputKind::KeyframeBound => "snapshot_poi",
        }
    }

    /// Parse a store `kind` value. Non-output kinds yield `None`.
    pub fn from_store_kind(kind: &str) -> Option<Self> {
        match kind {
            "snapshot_base" => Some(OutputKind::FixedWindow),
            "snapshot_poi" => Some(OutputKind::KeyframeBound),
            _ => None,
        }
    }
}

/// A file produced from a source recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedOutput {
    pub id: OutputId,
    pub recording_id: RecordingId,
    pub kind: OutputKind,
    /// Output path, absolute or relative to the output base directory.
    pub path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Falls back to the recording's frame rate when unset.
    pub frame_rate: Option<f64>,
    /// Falls back to the recording's codec when unset.
    pub codec: Option<String>,
    /// Overrides the recording's window field by field.
    pub window: CropWindow,
    /// Last successful render. `None` if never rendered.
    pub modified: Option<Timestamp>,
    pub note: Option<String>,
}

impl DerivedOutput {
    /// Target size, falling back to `fallback` per dimension.
    pub fn target_size(&self, fallback: (Option<u32>, Option<u32>)) -> Option<(u32, u32)> {
        let width = self.width.or(fallback.0).filter(|w| *w > 0)?;
        let height = self.height.or(fallback.1).filter(|h| *h > 0)?;
        Some((width, height))
    }
}

/// Keyframe values captured when the binding was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeSnapshot {
    pub time_secs: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub zoom: Option<f64>,
    pub distance: Option<f64>,
}

/// An edit binding: one output, its recording, and (for keyframe-bound
/// outputs) the live keyframe it is framed on.
///
/// The camera and keyframe snapshots record provenance at binding time and
/// are never consulted for framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub binding_id: i64,
    pub recording_id: RecordingId,
    pub output: DerivedOutput,
    pub keyframe: Option<Keyframe>,
    pub keyframe_snapshot: KeyframeSnapshot,
    pub camera: CameraProfile,
}

impl OutputBinding {
    /// Check the shape invariants of a binding.
    ///
    /// A keyframe-bound output must carry a keyframe that belongs to the same
    /// recording; every output must belong to the binding's recording.
    pub fn validate(&self) -> Result<(), String> {
        if self.output.recording_id != self.recording_id {
            return Err(format!(
                "output {} belongs to recording {}, binding says {}",
                self.output.id, self.output.recording_id, self.recording_id
            ));
        }
        if self.output.kind == OutputKind::KeyframeBound {
            let keyframe = self
                .keyframe
                .as_ref()
                .ok_or_else(|| format!("output {} is keyframe-bound but has no keyframe", self.output.id))?;
            if keyframe.recording_id != self.recording_id {
                return Err(format!(
                    "keyframe {} belongs to recording {}, not {}",
                    keyframe.id, keyframe.recording_id, self.recording_id
                ));
            }
        }
        Ok(())
    }
}
