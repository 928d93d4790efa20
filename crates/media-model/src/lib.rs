//! poiframe Media Model
//!
//! Defines the data contracts shared by the store, the transform builder,
//! and the regeneration scheduler:
//! - **Recording:** a long-form source file with probed technical metadata
//! - **Keyframe:** a timed point-of-interest sample (`t`, `x`, `y`, `zoom`)
//! - **Output:** a derived snapshot and the binding that ties it to its inputs
//!
//! Optional fields are `Option`s throughout: "unset" is never encoded as zero.
//! Keyframe coordinates are in source pixels; zoom is a scale factor where
//! `1.0` shows the full frame.

pub mod keyframe;
pub mod output;
pub mod recording;

pub use keyframe::*;
pub use output::*;
pub use recording::*;
