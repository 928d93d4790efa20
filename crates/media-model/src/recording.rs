//! Source recordings and their probed technical metadata.

use serde::{Deserialize, Serialize};

use poiframe_common::clock::Timestamp;

/// Store identifier of a source recording.
pub type RecordingId = i64;

/// Technical metadata of a media file. Every field is filled lazily.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frames per second as a decimal.
    pub frame_rate: Option<f64>,
    /// Codec identifier as reported by the probe (e.g. `h264`, `prores`).
    pub codec: Option<String>,
    pub duration_secs: Option<f64>,
    /// Container start offset in seconds.
    pub start_secs: Option<f64>,
}

impl TechnicalMetadata {
    /// True when every field is known.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// True when no field is known.
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.frame_rate.is_none()
            && self.codec.is_none()
            && self.duration_secs.is_none()
            && self.start_secs.is_none()
    }

    /// Names of the unset fields, in store column order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.width.is_none() {
            missing.push("width");
        }
        if self.height.is_none() {
            missing.push("height");
        }
        if self.frame_rate.is_none() {
            missing.push("frame_rate");
        }
        if self.codec.is_none() {
            missing.push("codec");
        }
        if self.duration_secs.is_none() {
            missing.push("duration");
        }
        if self.start_secs.is_none() {
            missing.push("start_time");
        }
        missing
    }

    /// The subset of `probed` that fills gaps in `self`.
    ///
    /// Fields already known here are never taken from the probe, so the
    /// result only carries values that are new to the store.
    pub fn gaps_filled_from(&self, probed: &TechnicalMetadata) -> TechnicalMetadata {
        TechnicalMetadata {
            width: self.width.is_none().then_some(probed.width).flatten(),
            height: self.height.is_none().then_some(probed.height).flatten(),
            frame_rate: self
                .frame_rate
                .is_none()
                .then_some(probed.frame_rate)
                .flatten(),
            codec: self
                .codec
                .is_none()
                .then(|| probed.codec.clone())
                .flatten(),
            duration_secs: self
                .duration_secs
                .is_none()
                .then_some(probed.duration_secs)
                .flatten(),
            start_secs: self
                .start_secs
                .is_none()
                .then_some(probed.start_secs)
                .flatten(),
        }
    }

    /// Copy every set field of `fill` into the matching unset field of `self`.
    pub fn absorb(&mut self, fill: &TechnicalMetadata) {
        self.width = self.width.or(fill.width);
        self.height = self.height.or(fill.height);
        self.frame_rate = self.frame_rate.or(fill.frame_rate);
        if self.codec.is_none() {
            self.codec = fill.codec.clone();
        }
        self.duration_secs = self.duration_secs.or(fill.duration_secs);
        self.start_secs = self.start_secs.or(fill.start_secs);
    }
}

/// Time window applied when cutting a snapshot out of a recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    /// Seek offset into the recording (seconds).
    pub start_secs: Option<f64>,
    /// Maximum clip length (seconds).
    pub max_duration_secs: Option<f64>,
}

impl CropWindow {
    /// Resolve this (more specific) window against a fallback window.
    ///
    /// Each field is taken from `self` when set, otherwise from `fallback`.
    pub fn or(self, fallback: CropWindow) -> CropWindow {
        CropWindow {
            start_secs: self.start_secs.or(fallback.start_secs),
            max_duration_secs: self.max_duration_secs.or(fallback.max_duration_secs),
        }
    }
}

/// A long-form source recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecording {
    pub id: RecordingId,

    /// File path, absolute or relative to the store's base directory.
    pub path: String,

    pub metadata: TechnicalMetadata,

    /// Default snapshot window for outputs that configure none.
    pub window: CropWindow,

    /// Last known modify time of the raw file.
    pub raw_modified: Option<Timestamp>,

    /// Last time the keyframe set as a whole changed (add/remove/reorder).
    pub keyframes_modified: Option<Timestamp>,

    /// Last successful regeneration of this recording's outputs.
    /// `None` means the recording has never been rendered.
    pub outputs_modified: Option<Timestamp>,

    pub note: Option<String>,
}

impl SourceRecording {
    /// A recording with nothing but an id and a path.
    pub fn new(id: RecordingId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            metadata: TechnicalMetadata::default(),
            window: CropWindow::default(),
            raw_modified: None,
            keyframes_modified: None,
            outputs_modified: None,
            note: None,
        }
    }

    /// Whether outputs were ever rendered from this recording.
    pub fn has_been_rendered(&self) -> bool {
        self.outputs_modified.is_some()
    }
}
