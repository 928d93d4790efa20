//! SQLite-backed store.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, Row};

use poiframe_common::clock::{format_timestamp, parse_timestamp, Timestamp};
use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::keyframe::{CameraProfile, Keyframe};
use poiframe_media_model::output::{
    DerivedOutput, KeyframeSnapshot, OutputBinding, OutputId, OutputKind,
};
use poiframe_media_model::recording::{
    CropWindow, RecordingId, SourceRecording, TechnicalMetadata,
};

use crate::MediaStore;

const BINDINGS_SQL: &str = "
    SELECT ep.id AS ep_id,
           ep.original_media_id AS ep_original_id,
           ep.camera_id AS ep_camera_id,
           ep.poi_t AS snap_t,
           ep.poi_x AS snap_x,
           ep.poi_y AS snap_y,
           ep.poi_z AS snap_z,
           ep.poi_distance AS snap_distance,
           ep.camera_name AS camera_name,
           ep.camera_note AS camera_note,
           ep.lens_focal_min AS lens_focal_min,
           ep.lens_focal_max AS lens_focal_max,
           ep.lens_stop_min AS lens_stop_min,
           ep.lens_stop_max AS lens_stop_max,
           ep.stop_type AS stop_type,
           mf.id AS out_id,
           mf.parent_id AS out_parent_id,
           mf.path AS out_path,
           mf.kind AS out_kind,
           mf.width AS out_width,
           mf.height AS out_height,
           mf.frame_rate AS out_frame_rate,
           mf.codec AS out_codec,
           mf.cfg_start AS out_cfg_start,
           mf.cfg_max_duration AS out_cfg_max_duration,
           mf.conv_mtime AS out_conv_mtime,
           mf.note AS out_note,
           p.id AS poi_id,
           p.media_id AS poi_media_id,
           p.t AS poi_t,
           p.x AS poi_x,
           p.y AS poi_y,
           p.z AS poi_z,
           p.distance AS poi_distance,
           p.default_camera_id AS poi_camera_id,
           p.updated_at AS poi_updated_at
    FROM edit_point ep
    JOIN media_file mf ON mf.id = ep.output_media_id
    LEFT JOIN poi p ON p.id = ep.poi_id
    WHERE ep.original_media_id = ?1
    ORDER BY mf.kind, mf.id";

/// Store over a SQLite database file.
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open an existing database. The file is never created here.
    ///
    /// # Errors
    ///
    /// [`PoiframeError::ConfigurationMissing`] if the file does not exist or
    /// cannot be opened.
    pub fn open(path: &Path) -> PoiframeResult<Self> {
        if !path.exists() {
            return Err(PoiframeError::configuration_missing(format!(
                "database {} does not exist. Run `poiframe init-db` first.",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            PoiframeError::configuration_missing(format!("cannot open {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Database file path as given to [`SqliteStore::open`].
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative media paths are resolved against: the directory
    /// holding the database file.
    pub fn base_dir(&self) -> PathBuf {
        let absolute = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn update_conv_mtime(&self, id: i64, at: Timestamp) -> PoiframeResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE media_file SET conv_mtime = ?1 WHERE id = ?2",
                params![format_timestamp(&at), id],
            )
            .map_err(db_error)?;
        expect_one_row(changed, id)
    }
}

impl MediaStore for SqliteStore {
    fn ensure_schema(&self) -> PoiframeResult<()> {
        self.conn
            .prepare("SELECT 1 FROM media_file, poi, edit_point LIMIT 1")
            .map(|_| ())
            .map_err(|e| {
                PoiframeError::configuration_missing(format!(
                    "database schema missing ({e}). Run `poiframe init-db` first."
                ))
            })
    }

    fn list_recordings(&self) -> PoiframeResult<Vec<SourceRecording>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, path, width, height, frame_rate, codec, duration, start_time,
                        cfg_start, cfg_max_duration, raw_mtime, poi_mtime, conv_mtime, note
                 FROM media_file
                 WHERE parent_id IS NULL AND kind = 'original'
                 ORDER BY id",
            )
            .map_err(db_error)?;

        let recordings = stmt
            .query_map([], |row| {
                Ok(SourceRecording {
                    id: row.get("id")?,
                    path: row.get("path")?,
                    metadata: TechnicalMetadata {
                        width: dimension(row.get("width")?),
                        height: dimension(row.get("height")?),
                        frame_rate: row.get("frame_rate")?,
                        codec: row.get("codec")?,
                        duration_secs: row.get("duration")?,
                        start_secs: row.get("start_time")?,
                    },
                    window: CropWindow {
                        start_secs: row.get("cfg_start")?,
                        max_duration_secs: row.get("cfg_max_duration")?,
                    },
                    raw_modified: timestamp(row, "raw_mtime")?,
                    keyframes_modified: timestamp(row, "poi_mtime")?,
                    outputs_modified: timestamp(row, "conv_mtime")?,
                    note: row.get("note")?,
                })
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        Ok(recordings)
    }

    fn newest_keyframe_update(&self, recording_id: RecordingId) -> PoiframeResult<Option<Timestamp>> {
        let mut stmt = self
            .conn
            .prepare("SELECT updated_at FROM poi WHERE media_id = ?1 AND updated_at IS NOT NULL")
            .map_err(db_error)?;

        let values = stmt
            .query_map([recording_id], |row| row.get::<_, String>(0))
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        // Parsed before comparing: stored offsets are not uniform.
        Ok(values.iter().filter_map(|v| parse_timestamp(v)).max())
    }

    fn list_bindings(&self, recording_id: RecordingId) -> PoiframeResult<Vec<OutputBinding>> {
        let mut stmt = self.conn.prepare(BINDINGS_SQL).map_err(db_error)?;

        let rows = stmt
            .query_map([recording_id], binding_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        let mut bindings = Vec::with_capacity(rows.len());
        for (binding, kind) in rows {
            match binding {
                Some(binding) => bindings.push(binding),
                None => tracing::warn!(recording_id, kind = %kind, "Ignoring edit point with unknown output kind"),
            }
        }
        Ok(bindings)
    }

    fn fill_metadata(&mut self, recording_id: RecordingId, fill: &TechnicalMetadata) -> PoiframeResult<()> {
        if fill.is_empty() {
            return Ok(());
        }
        // Sizes read back through `dimension`, so a stored 0 counts as a gap.
        let changed = self
            .conn
            .execute(
                "UPDATE media_file
                 SET width = CASE WHEN width > 0 THEN width ELSE COALESCE(?1, width) END,
                     height = CASE WHEN height > 0 THEN height ELSE COALESCE(?2, height) END,
                     frame_rate = COALESCE(frame_rate, ?3),
                     codec = COALESCE(codec, ?4),
                     duration = COALESCE(duration, ?5),
                     start_time = COALESCE(start_time, ?6)
                 WHERE id = ?7",
                params![
                    fill.width,
                    fill.height,
                    fill.frame_rate,
                    fill.codec,
                    fill.duration_secs,
                    fill.start_secs,
                    recording_id
                ],
            )
            .map_err(db_error)?;
        expect_one_row(changed, recording_id)
    }

    fn set_recording_outputs_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()> {
        self.update_conv_mtime(recording_id, at)
    }

    fn set_output_modified(&mut self, output_id: OutputId, at: Timestamp) -> PoiframeResult<()> {
        self.update_conv_mtime(output_id, at)
    }

    fn set_raw_modified(&mut self, recording_id: RecordingId, at: Timestamp) -> PoiframeResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE media_file SET raw_mtime = ?1 WHERE id = ?2",
                params![format_timestamp(&at), recording_id],
            )
            .map_err(db_error)?;
        expect_one_row(changed, recording_id)
    }
}

/// One bindings row. The binding is `None` for an unknown output kind,
/// returned alongside the raw kind for reporting.
fn binding_from_row(row: &Row<'_>) -> rusqlite::Result<(Option<OutputBinding>, String)> {
    let kind_raw: String = row.get("out_kind")?;
    let Some(kind) = OutputKind::from_store_kind(&kind_raw) else {
        return Ok((None, kind_raw));
    };

    let recording_id: RecordingId = row.get("ep_original_id")?;
    let output = DerivedOutput {
        id: row.get("out_id")?,
        recording_id: row
            .get::<_, Option<RecordingId>>("out_parent_id")?
            .unwrap_or(recording_id),
        kind,
        path: row.get("out_path")?,
        width: dimension(row.get("out_width")?),
        height: dimension(row.get("out_height")?),
        frame_rate: row.get("out_frame_rate")?,
        codec: row.get("out_codec")?,
        window: CropWindow {
            start_secs: row.get("out_cfg_start")?,
            max_duration_secs: row.get("out_cfg_max_duration")?,
        },
        modified: timestamp(row, "out_conv_mtime")?,
        note: row.get("out_note")?,
    };

    let keyframe = match row.get::<_, Option<i64>>("poi_id")? {
        Some(id) => Some(Keyframe {
            id,
            recording_id: row.get("poi_media_id")?,
            time_secs: row.get("poi_t")?,
            x: row.get("poi_x")?,
            y: row.get("poi_y")?,
            zoom: row.get("poi_z")?,
            distance: row.get("poi_distance")?,
            camera_id: row.get("poi_camera_id")?,
            updated_at: timestamp(row, "poi_updated_at")?,
        }),
        None => None,
    };

    let binding = OutputBinding {
        binding_id: row.get("ep_id")?,
        recording_id,
        output,
        keyframe,
        keyframe_snapshot: KeyframeSnapshot {
            time_secs: row.get("snap_t")?,
            x: row.get("snap_x")?,
            y: row.get("snap_y")?,
            zoom: row.get("snap_z")?,
            distance: row.get("snap_distance")?,
        },
        camera: CameraProfile {
            id: row.get("ep_camera_id")?,
            name: row.get("camera_name")?,
            note: row.get("camera_note")?,
            lens_focal_min: row.get("lens_focal_min")?,
            lens_focal_max: row.get("lens_focal_max")?,
            lens_stop_min: row.get("lens_stop_min")?,
            lens_stop_max: row.get("lens_stop_max")?,
            stop_type: row.get("stop_type")?,
        },
    };
    Ok((Some(binding), kind_raw))
}

fn timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Timestamp>> {
    let raw: Option<String> = row.get(column)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Non-positive or out-of-range sizes are treated as unset.
fn dimension(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok()).filter(|v| *v > 0)
}

fn expect_one_row(changed: usize, id: i64) -> PoiframeResult<()> {
    if changed == 1 {
        Ok(())
    } else {
        Err(PoiframeError::store(format!(
            "expected to update media_file {id}, updated {changed} rows"
        )))
    }
}

fn db_error(err: rusqlite::Error) -> PoiframeError {
    PoiframeError::store(err.to_string())
}
