//! SQLite schema.

use std::path::Path;

use rusqlite::Connection;

use poiframe_common::error::{PoiframeError, PoiframeResult};

/// Tables for cameras, media files, keyframes, bindings and markers.
///
/// Every statement is `IF NOT EXISTS`, so applying it twice is harmless.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS camera (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  note TEXT,
  lens_focal_min REAL,
  lens_focal_max REAL,
  lens_stop_min REAL,
  lens_stop_max REAL,
  stop_type TEXT,
  lens_note TEXT
);

-- kind: 'original' | 'snapshot_base' | 'snapshot_poi'
CREATE TABLE IF NOT EXISTS media_file (
  id INTEGER PRIMARY KEY,
  parent_id INTEGER REFERENCES media_file(id),
  path TEXT NOT NULL,
  kind TEXT NOT NULL,
  width INTEGER,
  height INTEGER,
  frame_rate REAL,
  codec TEXT,
  duration REAL,
  start_time REAL,
  cfg_start REAL,
  cfg_max_duration REAL,
  raw_mtime TEXT,
  poi_mtime TEXT,
  conv_mtime TEXT,
  note TEXT
);

CREATE TABLE IF NOT EXISTS poi (
  id INTEGER PRIMARY KEY,
  media_id INTEGER NOT NULL REFERENCES media_file(id),
  t REAL,
  x REAL,
  y REAL,
  z REAL,
  distance REAL,
  default_camera_id INTEGER REFERENCES camera(id),
  updated_at TEXT
);

CREATE TABLE IF NOT EXISTS edit_point (
  id INTEGER PRIMARY KEY,
  original_media_id INTEGER NOT NULL REFERENCES media_file(id),
  output_media_id INTEGER NOT NULL REFERENCES media_file(id),
  poi_id INTEGER REFERENCES poi(id),
  camera_id INTEGER REFERENCES camera(id),
  poi_t REAL,
  poi_x REAL,
  poi_y REAL,
  poi_z REAL,
  poi_distance REAL,
  camera_name TEXT,
  camera_note TEXT,
  lens_focal_min REAL,
  lens_focal_max REAL,
  lens_stop_min REAL,
  lens_stop_max REAL,
  stop_type TEXT
);

CREATE TABLE IF NOT EXISTS marker (
  id INTEGER PRIMARY KEY,
  media_id INTEGER NOT NULL REFERENCES media_file(id),
  t REAL NOT NULL,
  type TEXT NOT NULL,
  text TEXT
);

CREATE INDEX IF NOT EXISTS idx_media_file_parent ON media_file(parent_id);
CREATE INDEX IF NOT EXISTS idx_poi_media ON poi(media_id);
CREATE INDEX IF NOT EXISTS idx_edit_point_original ON edit_point(original_media_id);
"#;

/// Apply the schema to an open connection.
pub fn create_schema(conn: &Connection) -> PoiframeResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| PoiframeError::store(format!("Failed to create schema: {e}")))
}

/// Create (or, with `reset`, recreate) a database file with the schema.
pub fn init_database(path: &Path, reset: bool) -> PoiframeResult<()> {
    if reset && path.exists() {
        std::fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "Removed existing database");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
        .map_err(|e| PoiframeError::store(format!("Failed to open {}: {e}", path.display())))?;
    create_schema(&conn)?;

    tracing::info!(path = %path.display(), "Database schema ready");
    Ok(())
}
