//! poiframe Transform Core
//!
//! Turns POI keyframes into the expressions a video filter evaluates per
//! output frame:
//! - **Expressions:** a small conditional/interpolation tree that renders to
//!   ffmpeg expression syntax and can be evaluated in-process
//! - **Builder:** piecewise-linear per-axis expressions from time-tagged samples
//! - **Filters:** the crop-then-scale filter chain consumed by the invoker
//!
//! This crate is pure computation: no I/O and no process spawning.

pub mod builder;
pub mod expr;
pub mod filter;

pub use builder::{build_axis_expr, build_poi_exprs, Axis, PoiExprs};
pub use expr::Expr;
pub use filter::{CropFraming, FilterChain, Prelude};
