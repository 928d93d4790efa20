//! poiframe Render Engine
//!
//! The two external-process seams of the pipeline:
//!
//! ```text
//! source.mov ── ffprobe ──▶ TechnicalMetadata
//!
//! source.mov ──┐
//!              ├── ffmpeg (-vf crop/scale chain) ──▶ snapshot.mp4
//! request ─────┘
//! ```
//!
//! Both sit behind traits so the scheduler can be driven by fakes in tests.

pub mod invoker;
pub mod probe;

pub use invoker::*;
pub use probe::*;
