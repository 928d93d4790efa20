//! Piecewise-linear axis expressions from POI keyframes.
//!
//! # Algorithm
//!
//! 1. **Validate** the samples: at least two, finite, strictly increasing time.
//! 2. **Seed** the fallback used outside the annotated span: centers hold the
//!    first value before the first sample and the last value after the last
//!    one; zoom relaxes to `1` (full frame) on both sides.
//! 3. **Wrap** the fallback from the last segment back to the first in
//!    `if(between(t, t_i, t_{i+1}), lerp_i, <accumulated>)`, so the earliest
//!    matching segment wins when scanning in time order.

use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::keyframe::PoiSample;

use crate::expr::Expr;

/// Which keyframe component an expression drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal crop center.
    CenterX,
    /// Vertical crop center.
    CenterY,
    /// Zoom factor.
    Zoom,
}

impl Axis {
    /// Value of this axis in a sample.
    pub fn pick(self, sample: &PoiSample) -> f64 {
        match self {
            Axis::CenterX => sample.x,
            Axis::CenterY => sample.y,
            Axis::Zoom => sample.zoom,
        }
    }

    /// Neutral value outside the annotated span, if the axis has one.
    fn neutral(self) -> Option<f64> {
        match self {
            Axis::Zoom => Some(1.0),
            Axis::CenterX | Axis::CenterY => None,
        }
    }
}

/// One expression per axis for a continuous reframe.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiExprs {
    pub center_x: Expr,
    pub center_y: Expr,
    pub zoom: Expr,
}

/// Build the interpolation expression for one axis.
///
/// `points` are `(time, value)` pairs ordered by time.
///
/// # Errors
///
/// [`PoiframeError::InvalidKeyframeSequence`] when fewer than two points are
/// given, when any value is not finite, or when consecutive times are not
/// strictly increasing.
pub fn build_axis_expr(points: &[(f64, f64)], axis: Axis) -> PoiframeResult<Expr> {
    validate_points(points)?;

    let (first_t, first_v) = points[0];
    let (_, last_v) = points[points.len() - 1];

    let mut expr = match axis.neutral() {
        Some(neutral) => Expr::Const(neutral),
        None => Expr::Before {
            at: first_t,
            then: Box::new(Expr::Const(first_v)),
            otherwise: Box::new(Expr::Const(last_v)),
        },
    };

    for pair in points.windows(2).rev() {
        let (t0, a) = pair[0];
        let (t1, b) = pair[1];
        expr = Expr::Between {
            t0,
            t1,
            then: Box::new(Expr::Lerp { t0, t1, a, b }),
            otherwise: Box::new(expr),
        };
    }

    Ok(expr)
}

/// Build center and zoom expressions for a keyframe path.
pub fn build_poi_exprs(samples: &[PoiSample]) -> PoiframeResult<PoiExprs> {
    let axis_points = |axis: Axis| -> Vec<(f64, f64)> {
        samples
            .iter()
            .map(|sample| (sample.time_secs, axis.pick(sample)))
            .collect()
    };

    let exprs = PoiExprs {
        center_x: build_axis_expr(&axis_points(Axis::CenterX), Axis::CenterX)?,
        center_y: build_axis_expr(&axis_points(Axis::CenterY), Axis::CenterY)?,
        zoom: build_axis_expr(&axis_points(Axis::Zoom), Axis::Zoom)?,
    };

    tracing::debug!(
        keyframes = samples.len(),
        segments = exprs.zoom.segment_count(),
        "Built POI expressions"
    );

    Ok(exprs)
}

fn validate_points(points: &[(f64, f64)]) -> PoiframeResult<()> {
    if points.len() < 2 {
        return Err(PoiframeError::invalid_keyframes(format!(
            "continuous interpolation needs at least 2 keyframes, got {}",
            points.len()
        )));
    }

    for (idx, (t, v)) in points.iter().enumerate() {
        if !t.is_finite() || !v.is_finite() {
            return Err(PoiframeError::invalid_keyframes(format!(
                "keyframe {idx} has a non-finite value (t={t}, value={v})"
            )));
        }
    }

    for (idx, pair) in points.windows(2).enumerate() {
        let (t0, t1) = (pair[0].0, pair[1].0);
        if t1 <= t0 {
            return Err(PoiframeError::invalid_keyframes(format!(
                "keyframe times must strictly increase: t[{}]={t0} then t[{}]={t1}",
                idx,
                idx + 1
            )));
        }
    }

    Ok(())
}
