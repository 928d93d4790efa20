//! poiframe Media Store
//!
//! The persistent state the scheduler reads and advances:
//! - **Recordings:** `media_file` rows of kind `original`
//! - **Outputs:** `media_file` rows of kind `snapshot_base` / `snapshot_poi`,
//!   linked to their recording through `parent_id`
//! - **Keyframes:** `poi` rows
//! - **Bindings:** `edit_point` rows tying an output to its recording and keyframe
//!
//! [`MediaStore`] is the seam the scheduler depends on. [`SqliteStore`] is
//! the production implementation; [`MemoryStore`] backs tests.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::*;
pub use schema::*;
pub use sqlite::*;

use std::path::{Path, PathBuf};

use poiframe_common::clock::Timestamp;
use poiframe_common::error::PoiframeResult;
use poiframe_media_model::output::{OutputBinding, OutputId};
use poiframe_media_model::recording::{RecordingId, SourceRecording, TechnicalMetadata};

/// Read and single-row write access to recordings, keyframes and outputs.
///
/// Every write method touches exactly one row and is durable when it
/// returns; callers never hold a transaction across an external call.
pub trait MediaStore {
    /// Verify the schema exists.
    ///
    /// # Errors
    ///
    /// [`PoiframeError::ConfigurationMissing`](poiframe_common::error::PoiframeError::ConfigurationMissing)
    /// when the store was never initialized.
    fn ensure_schema(&self) -> PoiframeResult<()>;

    /// All source recordings, ordered by id.
    fn list_recordings(&self) -> PoiframeResult<Vec<SourceRecording>>;

    /// Newest `updated_at` among the recording's keyframes.
    fn newest_keyframe_update(&self, recording_id: RecordingId) -> PoiframeResult<Option<Timestamp>>;

    /// Bindings of a recording: fixed-window outputs first, then
    /// keyframe-bound ones, each group by output id.
    fn list_bindings(&self, recording_id: RecordingId) -> PoiframeResult<Vec<OutputBinding>>;

    /// Store each set field of `fill` where the recording has no value yet.
    fn fill_metadata(&mut self, recording_id: RecordingId, fill: &TechnicalMetadata) -> PoiframeResult<()>;

    /// Record a successful regeneration of the recording's outputs.
    fn set_recording_outputs_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()>;

    /// Record a successful render of one output.
    fn set_output_modified(&mut self, output_id: OutputId, at: Timestamp) -> PoiframeResult<()>;

    /// Record the raw file's modify time.
    fn set_raw_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()>;
}

/// Resolve a stored path against a base directory. Absolute paths are kept.
pub fn resolve_path(base_dir: &Path, stored: &str) -> PathBuf {
    let path = Path::new(stored);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
