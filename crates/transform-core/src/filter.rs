//! Crop-then-scale filter chains.
//!
//! Every chain ends in the same framing step:
//!
//! ```text
//! crop=w='W/(Z)':h='H/(Z)':x='max(0,min(iw-ow,(Cx)-ow/2))':y='max(0,min(ih-oh,(Cy)-oh/2))',scale=W:H
//! ```
//!
//! where `Z`, `Cx`, `Cy` are constants for snapshots and interpolation
//! trees for continuous reframes. What comes before the crop decides the
//! coordinate space `Cx`/`Cy` live in.

use std::fmt;

use poiframe_common::error::PoiframeResult;
use poiframe_media_model::keyframe::PoiSample;

use crate::builder::{build_poi_exprs, PoiExprs};
use crate::expr::Expr;

/// Scaling applied before the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prelude {
    /// Crop directly in source pixel space.
    SourceSpace,
    /// Scale to cover `W×H` (`force_original_aspect_ratio=increase`).
    Cover,
    /// Scale to fit inside `W×H` and pad to exactly `W×H`.
    Letterbox,
}

/// Zoom and center expressions for the crop step.
#[derive(Debug, Clone, PartialEq)]
pub struct CropFraming {
    pub zoom: Expr,
    pub center_x: Expr,
    pub center_y: Expr,
}

impl CropFraming {
    /// A fixed crop around one point.
    pub fn fixed(center_x: f64, center_y: f64, zoom: f64) -> Self {
        Self {
            zoom: Expr::Const(zoom),
            center_x: Expr::Const(center_x),
            center_y: Expr::Const(center_y),
        }
    }
}

impl From<PoiExprs> for CropFraming {
    fn from(exprs: PoiExprs) -> Self {
        Self {
            zoom: exprs.zoom,
            center_x: exprs.center_x,
            center_y: exprs.center_y,
        }
    }
}

/// A complete `-vf` filter chain producing a `width×height` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub width: u32,
    pub height: u32,
    pub prelude: Prelude,
    pub framing: CropFraming,
}

impl FilterChain {
    /// Fixed-window snapshot: letterbox the whole frame, then the identity
    /// crop (zoom 1 centered on the padded frame).
    pub fn fixed_window(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            prelude: Prelude::Letterbox,
            framing: CropFraming::fixed(width as f64 / 2.0, height as f64 / 2.0, 1.0),
        }
    }

    /// Keyframe-bound snapshot: one sample's center and zoom, in source
    /// pixels. Sibling keyframes are not consulted.
    pub fn single_point(width: u32, height: u32, sample: &PoiSample) -> Self {
        Self {
            width,
            height,
            prelude: Prelude::SourceSpace,
            framing: CropFraming::fixed(sample.x, sample.y, sample.zoom),
        }
    }

    /// Continuous reframe across a keyframe path, in the covered `W×H` space.
    pub fn continuous(width: u32, height: u32, samples: &[PoiSample]) -> PoiframeResult<Self> {
        Ok(Self {
            width,
            height,
            prelude: Prelude::Cover,
            framing: build_poi_exprs(samples)?.into(),
        })
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = (self.width, self.height);
        match self.prelude {
            Prelude::SourceSpace => {}
            Prelude::Cover => write!(f, "scale={w}:{h}:force_original_aspect_ratio=increase,")?,
            Prelude::Letterbox => write!(
                f,
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,"
            )?,
        }
        write!(
            f,
            "crop=w='{w}/({z})':h='{h}/({z})':x='max(0,min(iw-ow,({cx})-ow/2))':y='max(0,min(ih-oh,({cy})-oh/2))',scale={w}:{h}",
            z = self.framing.zoom,
            cx = self.framing.center_x,
            cy = self.framing.center_y,
        )
    }
}
