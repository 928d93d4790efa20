//! poiframe Regeneration Scheduler
//!
//! Decides which derived snapshots are stale with respect to their source
//! recording and keyframes, rebuilds them through a [`TransformInvoker`],
//! and advances the stored timestamps that mark them fresh.
//!
//! [`TransformInvoker`]: poiframe_render_engine::invoker::TransformInvoker

pub mod report;
pub mod scheduler;
pub mod staleness;

pub use report::*;
pub use scheduler::*;
pub use staleness::*;
