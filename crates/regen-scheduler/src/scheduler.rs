//! The regeneration loop.
//!
//! # Algorithm (per recording)
//!
//! 1. **Locate** the source file; skip the recording if it is gone.
//! 2. **Probe** once when any technical field is unset, and store only the
//!    fields the store did not have.
//! 3. **Assess** recording-level staleness from the raw file, the keyframe
//!    set and the newest individual keyframe.
//! 4. **Rebuild** each stale output, judged against the earlier of the
//!    recording stamp and its own: build its filter chain, invoke the
//!    transform, stamp the output on success.
//! 5. **Stamp** the recording with the same batch time if anything was
//!    rebuilt, and backfill the raw modify time if it was never stored.
//!
//! Only a missing schema aborts the batch. Every other problem is reported
//! at the smallest enclosing scope and the run continues.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use poiframe_common::clock::{file_modified, BatchClock, Timestamp};
use poiframe_common::config::RenderDefaults;
use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::output::{OutputBinding, OutputKind};
use poiframe_media_model::recording::SourceRecording;
use poiframe_media_store::{resolve_path, MediaStore};
use poiframe_render_engine::invoker::{AudioMode, RateControl, TransformInvoker, TransformRequest};
use poiframe_render_engine::probe::MetadataProbe;
use poiframe_transform_core::FilterChain;

use crate::report::{BatchReport, ProbeWarning, Rebuilt, SkipReason, Skipped};
use crate::staleness::{Decision, RecordingStaleness};

/// Knobs for one scheduler run.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    /// Base directory for relative recording paths.
    pub media_root: PathBuf,
    /// Base directory for relative output paths.
    pub output_root: PathBuf,
    /// Size used when an output has none configured, per dimension.
    pub fallback_width: Option<u32>,
    pub fallback_height: Option<u32>,
    /// Max duration used when neither output nor recording sets one.
    pub fallback_duration_secs: Option<f64>,
    pub crf: u8,
    pub preset: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_render_defaults(&RenderDefaults::default())
    }
}

impl SchedulerOptions {
    /// Options seeded from the configured render defaults.
    pub fn from_render_defaults(render: &RenderDefaults) -> Self {
        Self {
            media_root: PathBuf::from("."),
            output_root: PathBuf::from("."),
            fallback_width: render.width,
            fallback_height: render.height,
            fallback_duration_secs: render.max_duration_secs,
            crf: render.crf,
            preset: render.preset.clone(),
        }
    }
}

/// Drives staleness checks and rebuilds over every recording in a store.
pub struct Scheduler<'a, S, P, I> {
    store: &'a mut S,
    probe: &'a mut P,
    invoker: &'a mut I,
    options: SchedulerOptions,
    cancel: Arc<AtomicBool>,
    fixed_stamp: Option<Timestamp>,
}

impl<'a, S, P, I> Scheduler<'a, S, P, I>
where
    S: MediaStore,
    P: MetadataProbe,
    I: TransformInvoker,
{
    pub fn new(store: &'a mut S, probe: &'a mut P, invoker: &'a mut I, options: SchedulerOptions) -> Self {
        Self {
            store,
            probe,
            invoker,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
            fixed_stamp: None,
        }
    }

    /// Share a cancellation flag. Setting it stops the run before the next
    /// output rebuild; a rebuild in progress is never interrupted.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stamp rebuilt outputs with `stamp` instead of the wall clock.
    pub fn with_fixed_clock(mut self, stamp: Timestamp) -> Self {
        self.fixed_stamp = Some(stamp);
        self
    }

    /// Process every recording once.
    ///
    /// # Errors
    ///
    /// Only when the store is not initialized or cannot list recordings.
    pub fn run(&mut self) -> PoiframeResult<BatchReport> {
        self.store.ensure_schema()?;
        let recordings = self.store.list_recordings()?;

        let mut report = BatchReport::default();
        if recordings.is_empty() {
            tracing::info!("No source recordings found");
            return Ok(report);
        }

        tracing::info!(
            recordings = recordings.len(),
            invoker = self.invoker.name(),
            probe = self.probe.name(),
            "Starting regeneration batch"
        );

        for recording in recordings {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.recordings += 1;

            let recording_id = recording.id;
            if let Err(err) = self.process_recording(recording, &mut report) {
                if err.is_fatal() {
                    return Err(err);
                }
                tracing::warn!(recording_id, error = %err, "Recording failed");
                report.record_error(recording_id, None, &err);
            }
        }

        tracing::info!(
            rebuilt = report.rebuilt.len(),
            up_to_date = report.up_to_date.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Regeneration batch finished"
        );
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn process_recording(&mut self, mut recording: SourceRecording, report: &mut BatchReport) -> PoiframeResult<()> {
        let recording_id = recording.id;
        let input = resolve_path(&self.options.media_root, &recording.path);
        if !input.exists() {
            tracing::warn!(recording_id, path = %input.display(), "Missing input, skipping recording");
            report.record_error(recording_id, None, &PoiframeError::InputMissing { path: input });
            return Ok(());
        }

        if !recording.metadata.is_complete() {
            self.fill_metadata(&mut recording, &input, report)?;
        }

        let raw_modified = recording.raw_modified.or_else(|| file_modified(&input));
        let newest_keyframe = self.store.newest_keyframe_update(recording_id)?;
        let staleness = RecordingStaleness::assess(&recording, raw_modified, newest_keyframe);
        tracing::debug!(
            recording_id,
            needs_base = staleness.needs_base,
            keyframes_changed = staleness.keyframes_changed,
            "Assessed recording"
        );

        let bindings = self.store.list_bindings(recording_id)?;
        if bindings.is_empty() {
            tracing::info!(recording_id, "No outputs bound to recording");
        }

        let stamp = self.batch_stamp(&recording);
        let mut rebuilt_any = false;

        for binding in &bindings {
            let output_id = binding.output.id;

            if let Err(message) = binding.validate() {
                tracing::warn!(recording_id, output_id, %message, "Invalid binding, skipping output");
                report.skipped.push(Skipped {
                    recording_id,
                    output_id: Some(output_id),
                    reason: SkipReason::InvalidBinding { message },
                });
                continue;
            }

            let reason = match staleness.decide(binding) {
                Decision::UpToDate => {
                    report.up_to_date.push(output_id);
                    continue;
                }
                Decision::Rebuild(reason) => reason,
            };

            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let request = match self.transform_request(&recording, binding, &input) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(recording_id, output_id, error = %err, "Skipping output");
                    report.record_error(recording_id, Some(output_id), &err);
                    continue;
                }
            };

            if let Some(parent) = request.output.parent() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    tracing::warn!(
                        recording_id,
                        output_id,
                        error = %err,
                        dir = %parent.display(),
                        "Cannot create output directory"
                    );
                    report.record_error(recording_id, Some(output_id), &PoiframeError::Io(err));
                    continue;
                }
            }

            tracing::info!(
                recording_id,
                output_id,
                kind = binding.output.kind.as_str(),
                %reason,
                output = %request.output.display(),
                "Rebuilding output"
            );

            match self.invoker.invoke(&request) {
                Ok(()) => {
                    self.store.set_output_modified(output_id, stamp)?;
                    rebuilt_any = true;
                    report.rebuilt.push(Rebuilt {
                        recording_id,
                        output_id,
                        path: request.output,
                        reason,
                    });
                }
                Err(err) => {
                    tracing::warn!(recording_id, output_id, error = %err, "Transform failed");
                    report.record_error(recording_id, Some(output_id), &err);
                }
            }
        }

        if rebuilt_any {
            self.store.set_recording_outputs_modified(recording_id, stamp)?;
        }

        if recording.raw_modified.is_none() {
            if let Some(raw) = raw_modified {
                self.store.set_raw_modified(recording_id, raw)?;
            }
        }

        Ok(())
    }

    fn fill_metadata(
        &mut self,
        recording: &mut SourceRecording,
        input: &Path,
        report: &mut BatchReport,
    ) -> PoiframeResult<()> {
        let recording_id = recording.id;
        tracing::debug!(
            recording_id,
            missing = ?recording.metadata.missing_fields(),
            "Probing recording metadata"
        );

        match self.probe.probe(input) {
            Ok(probed) => {
                let fill = recording.metadata.gaps_filled_from(&probed);
                if !fill.is_empty() {
                    self.store.fill_metadata(recording_id, &fill)?;
                    recording.metadata.absorb(&fill);
                }
            }
            Err(err) => {
                tracing::warn!(recording_id, error = %err, "Probe failed, continuing with stored metadata");
                report.probe_warnings.push(ProbeWarning {
                    recording_id,
                    message: err.to_string(),
                });
            }
        }
        Ok(())
    }

    /// One stamp per recording run, never behind the stored regeneration time.
    fn batch_stamp(&self, recording: &SourceRecording) -> Timestamp {
        let clock = match self.fixed_stamp {
            Some(stamp) => BatchClock::fixed(stamp),
            None => BatchClock::start(),
        };
        match recording.outputs_modified {
            Some(previous) if previous > clock.stamp() => previous,
            _ => clock.stamp(),
        }
    }

    fn transform_request(
        &self,
        recording: &SourceRecording,
        binding: &OutputBinding,
        input: &Path,
    ) -> PoiframeResult<TransformRequest> {
        let output = &binding.output;
        let (width, height) = output
            .target_size((self.options.fallback_width, self.options.fallback_height))
            .ok_or(PoiframeError::OutputConfigurationIncomplete { output_id: output.id })?;

        let window = output.window.or(recording.window);
        let max_duration_secs = window
            .max_duration_secs
            .or(self.options.fallback_duration_secs);

        let (filter, seek_secs) = match output.kind {
            OutputKind::FixedWindow => (FilterChain::fixed_window(width, height), window.start_secs),
            OutputKind::KeyframeBound => {
                let keyframe = binding.keyframe.as_ref().ok_or_else(|| {
                    PoiframeError::invalid_keyframes(format!("output {} has no bound keyframe", output.id))
                })?;
                let sample = keyframe.sample().ok_or_else(|| {
                    PoiframeError::invalid_keyframes(format!("keyframe {} has no x/y position", keyframe.id))
                })?;
                let finite = [sample.time_secs, sample.x, sample.y, sample.zoom]
                    .iter()
                    .all(|v| v.is_finite());
                if !finite || sample.zoom <= 0.0 {
                    return Err(PoiframeError::invalid_keyframes(format!(
                        "keyframe {} cannot be framed (t={}, x={}, y={}, zoom={})",
                        keyframe.id, sample.time_secs, sample.x, sample.y, sample.zoom
                    )));
                }
                let seek = window.start_secs.unwrap_or(0.0) + sample.time_secs;
                (
                    FilterChain::single_point(width, height, &sample),
                    (seek != 0.0).then_some(seek),
                )
            }
        };

        Ok(TransformRequest {
            input: input.to_path_buf(),
            output: resolve_path(&self.options.output_root, &output.path),
            width,
            height,
            frame_rate: output.frame_rate.or(recording.metadata.frame_rate),
            codec: output
                .codec
                .clone()
                .or_else(|| recording.metadata.codec.clone()),
            filter: filter.to_string(),
            seek_secs,
            max_duration_secs,
            audio: AudioMode::Drop,
            rate_control: RateControl::Crf {
                crf: self.options.crf,
                preset: self.options.preset.clone(),
            },
        })
    }
}
