//! In-memory store for tests and dry experiments.

use std::collections::BTreeMap;

use poiframe_common::clock::Timestamp;
use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::keyframe::{CameraProfile, Keyframe, KeyframeId};
use poiframe_media_model::output::{DerivedOutput, KeyframeSnapshot, OutputBinding, OutputId, OutputKind};
use poiframe_media_model::recording::{RecordingId, SourceRecording, TechnicalMetadata};

use crate::MediaStore;

#[derive(Debug, Clone)]
struct StoredBinding {
    binding_id: i64,
    recording_id: RecordingId,
    output_id: OutputId,
    keyframe_id: Option<KeyframeId>,
}

/// A [`MediaStore`] held entirely in memory.
///
/// Bindings reference outputs and keyframes by id, so edits made through
/// [`MemoryStore::keyframe_mut`] are seen by later reads the same way a
/// database row update would be.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    initialized: bool,
    recordings: BTreeMap<RecordingId, SourceRecording>,
    outputs: BTreeMap<OutputId, DerivedOutput>,
    keyframes: BTreeMap<KeyframeId, Keyframe>,
    bindings: Vec<StoredBinding>,
    writes: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            initialized: true,
            recordings: BTreeMap::new(),
            outputs: BTreeMap::new(),
            keyframes: BTreeMap::new(),
            bindings: vec![],
            writes: 0,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose schema check fails.
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            ..Self::default()
        }
    }

    pub fn insert_recording(&mut self, recording: SourceRecording) {
        self.recordings.insert(recording.id, recording);
    }

    pub fn insert_keyframe(&mut self, keyframe: Keyframe) {
        self.keyframes.insert(keyframe.id, keyframe);
    }

    /// Add an output and bind it to its recording (and keyframe, if given).
    pub fn bind_output(&mut self, output: DerivedOutput, keyframe_id: Option<KeyframeId>) {
        let binding_id = self.bindings.len() as i64 + 1;
        self.bindings.push(StoredBinding {
            binding_id,
            recording_id: output.recording_id,
            output_id: output.id,
            keyframe_id,
        });
        self.outputs.insert(output.id, output);
    }

    pub fn recording(&self, id: RecordingId) -> Option<&SourceRecording> {
        self.recordings.get(&id)
    }

    pub fn recording_mut(&mut self, id: RecordingId) -> Option<&mut SourceRecording> {
        self.recordings.get_mut(&id)
    }

    pub fn output(&self, id: OutputId) -> Option<&DerivedOutput> {
        self.outputs.get(&id)
    }

    pub fn keyframe_mut(&mut self, id: KeyframeId) -> Option<&mut Keyframe> {
        self.keyframes.get_mut(&id)
    }

    /// Number of single-row writes performed so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn recording_entry(&mut self, id: RecordingId) -> PoiframeResult<&mut SourceRecording> {
        self.recordings
            .get_mut(&id)
            .ok_or_else(|| PoiframeError::store(format!("no recording {id}")))
    }
}

impl MediaStore for MemoryStore {
    fn ensure_schema(&self) -> PoiframeResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PoiframeError::configuration_missing("in-memory store not initialized"))
        }
    }

    fn list_recordings(&self) -> PoiframeResult<Vec<SourceRecording>> {
        Ok(self.recordings.values().cloned().collect())
    }

    fn newest_keyframe_update(&self, recording_id: RecordingId) -> PoiframeResult<Option<Timestamp>> {
        Ok(self
            .keyframes
            .values()
            .filter(|kf| kf.recording_id == recording_id)
            .filter_map(|kf| kf.updated_at)
            .max())
    }

    fn list_bindings(&self, recording_id: RecordingId) -> PoiframeResult<Vec<OutputBinding>> {
        let mut bindings: Vec<OutputBinding> = self
            .bindings
            .iter()
            .filter(|b| b.recording_id == recording_id)
            .filter_map(|b| {
                let output = self.outputs.get(&b.output_id)?.clone();
                let keyframe = b.keyframe_id.and_then(|id| self.keyframes.get(&id)).cloned();
                let keyframe_snapshot = keyframe
                    .as_ref()
                    .map(|kf| KeyframeSnapshot {
                        time_secs: kf.time_secs,
                        x: kf.x,
                        y: kf.y,
                        zoom: kf.zoom,
                        distance: kf.distance,
                    })
                    .unwrap_or_default();
                Some(OutputBinding {
                    binding_id: b.binding_id,
                    recording_id: b.recording_id,
                    output,
                    keyframe,
                    keyframe_snapshot,
                    camera: CameraProfile::default(),
                })
            })
            .collect();

        bindings.sort_by_key(|b| (kind_order(b.output.kind), b.output.id));
        Ok(bindings)
    }

    fn fill_metadata(&mut self, recording_id: RecordingId, fill: &TechnicalMetadata) -> PoiframeResult<()> {
        if fill.is_empty() {
            return Ok(());
        }
        self.recording_entry(recording_id)?.metadata.absorb(fill);
        self.writes += 1;
        Ok(())
    }

    fn set_recording_outputs_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()> {
        self.recording_entry(recording_id)?.outputs_modified = Some(at);
        self.writes += 1;
        Ok(())
    }

    fn set_output_modified(&mut self, output_id: OutputId, at: Timestamp) -> PoiframeResult<()> {
        let output = self
            .outputs
            .get_mut(&output_id)
            .ok_or_else(|| PoiframeError::store(format!("no output {output_id}")))?;
        output.modified = Some(at);
        self.writes += 1;
        Ok(())
    }

    fn set_raw_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()> {
        self.recording_entry(recording_id)?.raw_modified = Some(at);
        self.writes += 1;
        Ok(())
    }
}

/// Same order as the `kind` column sorts in SQL.
fn kind_order(kind: OutputKind) -> &'static str {
    kind.as_str()
}
