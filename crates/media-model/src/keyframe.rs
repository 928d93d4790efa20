//! Point-of-interest keyframes and camera metadata.

use serde::{Deserialize, Serialize};

use poiframe_common::clock::Timestamp;

use crate::recording::RecordingId;

/// Store identifier of a keyframe.
pub type KeyframeId = i64;

/// Store identifier of a camera profile.
pub type CameraId = i64;

/// A stored point-of-interest sample belonging to one recording.
///
/// Keyframes are supplied by external annotation tooling; the scheduler only
/// reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub recording_id: RecordingId,
    /// Offset into the recording's snapshot window (seconds).
    pub time_secs: Option<f64>,
    /// Horizontal crop center (source pixels).
    pub x: Option<f64>,
    /// Vertical crop center (source pixels).
    pub y: Option<f64>,
    /// Zoom factor; `1.0` shows the full frame.
    pub zoom: Option<f64>,
    /// Subject distance as annotated. Carried for downstream consumers.
    pub distance: Option<f64>,
    pub camera_id: Option<CameraId>,
    pub updated_at: Option<Timestamp>,
}

impl Keyframe {
    /// The sample used for single-point framing.
    ///
    /// Missing time defaults to `0`, missing or zero zoom to `1`. Missing
    /// centers cannot be defaulted and yield `None`.
    pub fn sample(&self) -> Option<PoiSample> {
        Some(PoiSample {
            time_secs: self.time_secs.unwrap_or(0.0),
            x: self.x?,
            y: self.y?,
            zoom: self.zoom.filter(|z| *z != 0.0).unwrap_or(1.0),
        })
    }
}

/// A fully specified `(t, x, y, zoom)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoiSample {
    pub time_secs: f64,
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl PoiSample {
    pub fn new(time_secs: f64, x: f64, y: f64, zoom: f64) -> Self {
        Self {
            time_secs,
            x,
            y,
            zoom,
        }
    }
}

/// Camera and lens description. Inert for framing math.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraProfile {
    pub id: Option<CameraId>,
    pub name: Option<String>,
    pub note: Option<String>,
    pub lens_focal_min: Option<f64>,
    pub lens_focal_max: Option<f64>,
    pub lens_stop_min: Option<f64>,
    pub lens_stop_max: Option<f64>,
    pub stop_type: Option<String>,
}

/// Errors raised while reading a POI CSV file.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoiCsvError {
    #[error("Line {line}: POI rows must be t,x,y,z (got {cells} cells)")]
    ShortRow { line: usize, cells: usize },

    #[error("Line {line}: cannot parse {column} value {value:?}")]
    BadNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
}

/// Parse POI keyframes from CSV text.
///
/// The first line is a header and is skipped. Blank lines (including lines
/// of only separators and whitespace) are ignored. Each data row needs at
/// least four cells `t,x,y,z`; extra cells are ignored.
pub fn parse_poi_csv(content: &str) -> Result<Vec<PoiSample>, PoiCsvError> {
    const COLUMNS: [&str; 4] = ["t", "x", "y", "z"];

    let mut samples = vec![];
    for (idx, line) in content.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if cells.len() < COLUMNS.len() {
            return Err(PoiCsvError::ShortRow {
                line: line_no,
                cells: cells.len(),
            });
        }

        let mut values = [0.0f64; 4];
        for (slot, (cell, column)) in values.iter_mut().zip(cells.iter().zip(COLUMNS)) {
            *slot = cell.parse::<f64>().map_err(|_| PoiCsvError::BadNumber {
                line: line_no,
                column,
                value: cell.to_string(),
            })?;
        }

        samples.push(PoiSample::new(values[0], values[1], values[2], values[3]));
    }
    Ok(samples)
}
