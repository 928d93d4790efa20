//! Staleness decisions.
//!
//! Derivation is a small dependency graph per recording:
//!
//! ```text
//! raw file ─────────────┬──▶ fixed-window outputs
//!                       │
//! keyframe set ──┐      ├──▶ keyframe-bound outputs
//! keyframe k ────┴──────┘
//! ```
//!
//! Every node carries a modify time; an output is stale when something it
//! depends on is newer than its own last render.

use serde::Serialize;

use poiframe_common::clock::{is_newer, Timestamp};
use poiframe_media_model::output::{OutputBinding, OutputKind};
use poiframe_media_model::recording::SourceRecording;

/// Why an output is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    /// The recording or the output has no regeneration timestamp yet.
    NeverRendered,
    /// The raw file changed since the last regeneration.
    SourceChanged,
    /// The bound keyframe itself was edited.
    KeyframeChanged,
    /// The keyframe set as a whole was edited.
    KeyframeSetChanged,
    /// Some keyframe changed and the bound one carries no update time.
    UntrackedKeyframe,
}

impl std::fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RebuildReason::NeverRendered => "never rendered",
            RebuildReason::SourceChanged => "source changed",
            RebuildReason::KeyframeChanged => "keyframe changed",
            RebuildReason::KeyframeSetChanged => "keyframe set changed",
            RebuildReason::UntrackedKeyframe => "keyframe without update time",
        };
        f.write_str(text)
    }
}

/// Outcome of a staleness check for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Rebuild(RebuildReason),
    UpToDate,
}

impl Decision {
    pub fn is_rebuild(self) -> bool {
        matches!(self, Decision::Rebuild(_))
    }
}

/// Recording-level staleness, computed once per recording run.
///
/// `needs_base` and `keyframes_changed` summarise the recording against its
/// own regeneration stamp. Per-output decisions measure against the earlier
/// of that stamp and the output's own stamp, so an output that was skipped,
/// failed, or cancelled in a run that stamped the recording stays stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingStaleness {
    /// Last regeneration of the recording's outputs.
    pub outputs_modified: Option<Timestamp>,
    /// Raw file modify time.
    pub raw_modified: Option<Timestamp>,
    /// Keyframe-set modify time.
    pub keyframes_modified: Option<Timestamp>,
    /// Newest update time among the recording's keyframes.
    pub newest_keyframe: Option<Timestamp>,
    /// Fixed-window outputs are stale.
    pub needs_base: bool,
    /// Some keyframe input is newer than the last regeneration.
    pub keyframes_changed: bool,
}

impl RecordingStaleness {
    /// Assess a recording.
    ///
    /// `raw_modified` is the raw file's modify time (stored, or read from
    /// disk when the store has none); `newest_keyframe` is the newest update
    /// time among the recording's individual keyframes.
    pub fn assess(
        recording: &SourceRecording,
        raw_modified: Option<Timestamp>,
        newest_keyframe: Option<Timestamp>,
    ) -> Self {
        let conv = recording.outputs_modified;
        let never_rendered = !recording.has_been_rendered();
        Self {
            outputs_modified: conv,
            raw_modified,
            keyframes_modified: recording.keyframes_modified,
            newest_keyframe,
            needs_base: never_rendered || is_newer(raw_modified, conv),
            keyframes_changed: never_rendered
                || is_newer(recording.keyframes_modified, conv)
                || is_newer(newest_keyframe, conv),
        }
    }

    /// The stamp an output's inputs are compared against. `None` when
    /// either the recording or the output was never rendered.
    fn reference(&self, binding: &OutputBinding) -> Option<Timestamp> {
        match (self.outputs_modified, binding.output.modified) {
            (Some(recording), Some(output)) => Some(recording.min(output)),
            _ => None,
        }
    }

    /// Decide whether one bound output must be rebuilt.
    ///
    /// A keyframe-bound output whose own keyframe is unchanged is exempt
    /// from a rebuild triggered by a sibling keyframe, unless the keyframe
    /// set itself changed.
    pub fn decide(&self, binding: &OutputBinding) -> Decision {
        let Some(reference) = self.reference(binding) else {
            return Decision::Rebuild(RebuildReason::NeverRendered);
        };
        let reference = Some(reference);

        if is_newer(self.raw_modified, reference) {
            return Decision::Rebuild(RebuildReason::SourceChanged);
        }

        match binding.output.kind {
            OutputKind::FixedWindow => Decision::UpToDate,
            OutputKind::KeyframeBound => {
                let set_changed = is_newer(self.keyframes_modified, reference);
                if !set_changed && !is_newer(self.newest_keyframe, reference) {
                    return Decision::UpToDate;
                }
                let keyframe_updated = binding.keyframe.as_ref().and_then(|kf| kf.updated_at);

                if is_newer(keyframe_updated, reference) {
                    Decision::Rebuild(RebuildReason::KeyframeChanged)
                } else if set_changed {
                    Decision::Rebuild(RebuildReason::KeyframeSetChanged)
                } else if keyframe_updated.is_none() {
                    Decision::Rebuild(RebuildReason::UntrackedKeyframe)
                } else {
                    Decision::UpToDate
                }
            }
        }
    }
}
