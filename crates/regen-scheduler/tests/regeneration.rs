use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use poiframe_common::clock::Timestamp;
use poiframe_common::error::{PoiframeError, PoiframeResult};
use poiframe_media_model::keyframe::Keyframe;
use poiframe_media_model::output::{DerivedOutput, OutputId, OutputKind};
use poiframe_media_model::recording::{CropWindow, SourceRecording, TechnicalMetadata};
use poiframe_media_store::MemoryStore;
use poiframe_regen_scheduler::{
    BatchReport, RebuildReason, Scheduler, SchedulerOptions, SkipReason,
};
use poiframe_render_engine::invoker::{FfmpegInvoker, TransformInvoker, TransformRequest};
use poiframe_render_engine::probe::MetadataProbe;

fn d0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

struct ScriptedProbe {
    result: Option<TechnicalMetadata>,
    calls: usize,
}

impl ScriptedProbe {
    fn returning(meta: TechnicalMetadata) -> Self {
        Self {
            result: Some(meta),
            calls: 0,
        }
    }

    fn failing() -> Self {
        Self {
            result: None,
            calls: 0,
        }
    }
}

impl MetadataProbe for ScriptedProbe {
    fn probe(&mut self, _path: &Path) -> PoiframeResult<TechnicalMetadata> {
        self.calls += 1;
        self.result
            .clone()
            .ok_or_else(|| PoiframeError::probe("ffprobe exited with 1"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct FakeInvoker {
    requests: Vec<TransformRequest>,
    failing: Vec<String>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl FakeInvoker {
    fn failing_on(file_name: &str) -> Self {
        Self {
            failing: vec![file_name.to_string()],
            ..Default::default()
        }
    }

    fn request_for(&self, file_name: &str) -> &TransformRequest {
        self.requests
            .iter()
            .find(|r| r.output.file_name().unwrap() == file_name)
            .unwrap()
    }
}

impl TransformInvoker for FakeInvoker {
    fn invoke(&mut self, request: &TransformRequest) -> PoiframeResult<()> {
        self.requests.push(request.clone());
        if let Some((after, flag)) = &self.cancel_after {
            if self.requests.len() >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        let name = request.output.file_name().unwrap().to_string_lossy();
        if self.failing.iter().any(|f| f.as_str() == name) {
            return Err(PoiframeError::invoker(format!("ffmpeg failed for {name}")));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn full_metadata() -> TechnicalMetadata {
    TechnicalMetadata {
        width: Some(1920),
        height: Some(1080),
        frame_rate: Some(25.0),
        codec: Some("h264".to_string()),
        duration_secs: Some(30.0),
        start_secs: Some(0.0),
    }
}

fn output(id: OutputId, kind: OutputKind, file: &str) -> DerivedOutput {
    DerivedOutput {
        id,
        recording_id: 1,
        kind,
        path: format!("snap/{file}"),
        width: Some(320),
        height: Some(180),
        frame_rate: None,
        codec: None,
        window: CropWindow::default(),
        modified: None,
        note: None,
    }
}

fn keyframe(id: i64, t: f64, x: f64, y: f64, updated_at: Timestamp) -> Keyframe {
    Keyframe {
        id,
        recording_id: 1,
        time_secs: Some(t),
        x: Some(x),
        y: Some(y),
        zoom: Some(1.2),
        distance: None,
        camera_id: None,
        updated_at: Some(updated_at),
    }
}

/// Recording 1 with a fixed-window output (10) and two keyframe-bound
/// outputs (11, 12). Raw file, keyframe set and keyframes all at D0; the
/// recording and its outputs share `outputs_modified`.
struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    store: MemoryStore,
}

impl Fixture {
    fn new(outputs_modified: Option<Timestamp>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::write(root.join("orig_01.mov"), b"not really a movie").unwrap();

        let mut store = MemoryStore::new();
        let mut recording = SourceRecording::new(1, "orig_01.mov");
        recording.metadata = full_metadata();
        recording.raw_modified = Some(d0());
        recording.keyframes_modified = Some(d0());
        recording.outputs_modified = outputs_modified;
        store.insert_recording(recording);

        store.insert_keyframe(keyframe(1, 2.0, 980.0, 560.0, d0()));
        store.insert_keyframe(keyframe(2, 4.0, 1000.0, 500.0, d0()));
        let rendered = |mut out: DerivedOutput| {
            out.modified = outputs_modified;
            out
        };
        store.bind_output(rendered(output(10, OutputKind::FixedWindow, "orig_01_base.mp4")), None);
        store.bind_output(
            rendered(output(11, OutputKind::KeyframeBound, "orig_01_poi_1.mp4")),
            Some(1),
        );
        store.bind_output(
            rendered(output(12, OutputKind::KeyframeBound, "orig_01_poi_2.mp4")),
            Some(2),
        );

        Self {
            _dir: dir,
            root,
            store,
        }
    }

    fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            media_root: self.root.clone(),
            output_root: self.root.clone(),
            ..SchedulerOptions::default()
        }
    }

    fn run_at(&mut self, invoker: &mut FakeInvoker, stamp: Timestamp) -> BatchReport {
        let options = self.options();
        let mut probe = ScriptedProbe::failing();
        Scheduler::new(&mut self.store, &mut probe, invoker, options)
            .with_fixed_clock(stamp)
            .run()
            .unwrap()
    }
}

#[test]
fn never_rendered_recording_rebuilds_every_output() {
    let mut fx = Fixture::new(None);
    let mut invoker = FakeInvoker::default();
    let stamp = d0() + Duration::hours(1);

    let report = fx.run_at(&mut invoker, stamp);

    assert_eq!(report.rebuilt_ids(), vec![10, 11, 12]);
    assert!(report
        .rebuilt
        .iter()
        .all(|r| r.reason == RebuildReason::NeverRendered));
    assert!(!report.has_problems());
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(stamp));
    for id in [10, 11, 12] {
        assert_eq!(fx.store.output(id).unwrap().modified, Some(stamp));
    }
    assert!(fx.root.join("snap").is_dir());
}

#[test]
fn second_run_without_changes_rebuilds_nothing() {
    let mut fx = Fixture::new(None);
    let mut invoker = FakeInvoker::default();

    fx.run_at(&mut invoker, d0() + Duration::hours(1));
    let writes_after_first = fx.store.writes();
    let report = fx.run_at(&mut invoker, d0() + Duration::hours(2));

    assert!(report.rebuilt.is_empty());
    assert_eq!(report.up_to_date, vec![10, 11, 12]);
    assert_eq!(invoker.requests.len(), 3);
    assert_eq!(fx.store.writes(), writes_after_first);
    assert_eq!(
        fx.store.recording(1).unwrap().outputs_modified,
        Some(d0() + Duration::hours(1))
    );
}

#[test]
fn wall_clock_runs_are_idempotent_and_backfill_raw_time() {
    let mut fx = Fixture::new(None);
    fx.store.recording_mut(1).unwrap().raw_modified = None;
    let options = fx.options();

    let mut invoker = FakeInvoker::default();
    let mut probe = ScriptedProbe::failing();
    let first = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options.clone())
        .run()
        .unwrap();
    assert_eq!(first.rebuilt.len(), 3);
    assert!(fx.store.recording(1).unwrap().raw_modified.is_some());

    let second = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .run()
        .unwrap();
    assert!(second.rebuilt.is_empty());
    assert_eq!(invoker.requests.len(), 3);
}

#[test]
fn only_the_individually_updated_keyframe_output_rebuilds() {
    let conv = d0() + Duration::hours(1);
    let mut fx = Fixture::new(Some(conv));
    fx.store.keyframe_mut(2).unwrap().updated_at = Some(d0() + Duration::hours(6));
    let mut invoker = FakeInvoker::default();
    let stamp = d0() + Duration::hours(7);

    let report = fx.run_at(&mut invoker, stamp);

    assert_eq!(report.rebuilt_ids(), vec![12]);
    assert_eq!(report.rebuilt[0].reason, RebuildReason::KeyframeChanged);
    assert_eq!(report.up_to_date, vec![10, 11]);
    assert_eq!(fx.store.output(12).unwrap().modified, Some(stamp));
    assert_eq!(fx.store.output(10).unwrap().modified, Some(conv));
    assert_eq!(fx.store.output(11).unwrap().modified, Some(conv));
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(stamp));
}

#[test]
fn output_bound_after_rendering_is_built_alone() {
    let conv = d0() + Duration::hours(1);
    let mut fx = Fixture::new(Some(conv));
    fx.store.bind_output(output(13, OutputKind::FixedWindow, "orig_01_late.mp4"), None);
    let mut invoker = FakeInvoker::default();
    let stamp = d0() + Duration::hours(2);

    let report = fx.run_at(&mut invoker, stamp);

    assert_eq!(report.rebuilt_ids(), vec![13]);
    assert_eq!(report.rebuilt[0].reason, RebuildReason::NeverRendered);
    assert_eq!(report.up_to_date, vec![10, 11, 12]);
    assert_eq!(fx.store.output(13).unwrap().modified, Some(stamp));
}

#[test]
fn keyframe_set_change_rebuilds_all_keyframe_outputs_only() {
    let conv = d0() + Duration::hours(1);
    let mut fx = Fixture::new(Some(conv));
    fx.store.recording_mut(1).unwrap().keyframes_modified = Some(d0() + Duration::hours(2));
    let mut invoker = FakeInvoker::default();

    let report = fx.run_at(&mut invoker, d0() + Duration::hours(3));

    assert_eq!(report.rebuilt_ids(), vec![11, 12]);
    assert_eq!(report.up_to_date, vec![10]);
}

#[test]
fn newer_raw_file_rebuilds_everything() {
    let mut fx = Fixture::new(Some(d0() + Duration::hours(1)));
    fx.store.recording_mut(1).unwrap().raw_modified = Some(d0() + Duration::hours(2));
    let mut invoker = FakeInvoker::default();

    let report = fx.run_at(&mut invoker, d0() + Duration::hours(3));

    assert_eq!(report.rebuilt_ids(), vec![10, 11, 12]);
    assert!(report
        .rebuilt
        .iter()
        .all(|r| r.reason == RebuildReason::SourceChanged));
}

#[test]
fn failed_output_stays_stale_while_siblings_are_stamped() {
    let mut fx = Fixture::new(None);
    let mut invoker = FakeInvoker::failing_on("orig_01_poi_1.mp4");
    let stamp = d0() + Duration::hours(1);

    let report = fx.run_at(&mut invoker, stamp);

    assert_eq!(report.rebuilt_ids(), vec![10, 12]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].output_id, Some(11));
    assert!(report.has_problems());
    assert_eq!(fx.store.output(11).unwrap().modified, None);
    assert_eq!(fx.store.output(12).unwrap().modified, Some(stamp));
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(stamp));

    let mut healthy = FakeInvoker::default();
    let retry = d0() + Duration::hours(2);
    let second = fx.run_at(&mut healthy, retry);

    assert_eq!(second.rebuilt_ids(), vec![11]);
    assert_eq!(second.up_to_date, vec![10, 12]);
    assert!(!second.has_problems());
    assert_eq!(fx.store.output(11).unwrap().modified, Some(retry));
}

#[test]
fn all_failures_leave_recording_unstamped() {
    let mut fx = Fixture::new(None);
    let mut invoker = FakeInvoker {
        failing: vec![
            "orig_01_base.mp4".to_string(),
            "orig_01_poi_1.mp4".to_string(),
            "orig_01_poi_2.mp4".to_string(),
        ],
        ..Default::default()
    };

    let report = fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(report.failed.len(), 3);
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, None);
}

#[test]
fn missing_input_skips_recording_and_continues() {
    let mut fx = Fixture::new(None);
    let mut missing = SourceRecording::new(2, "gone.mov");
    missing.metadata = full_metadata();
    fx.store.insert_recording(missing);
    let mut base = output(20, OutputKind::FixedWindow, "gone_base.mp4");
    base.recording_id = 2;
    fx.store.bind_output(base, None);

    let mut invoker = FakeInvoker::default();
    let report = fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(report.recordings, 2);
    assert_eq!(report.rebuilt_ids(), vec![10, 11, 12]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].recording_id, 2);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::InputMissing { .. }
    ));
    assert_eq!(fx.store.recording(2).unwrap().outputs_modified, None);
}

#[test]
fn probe_fills_only_unknown_fields_once() {
    let mut fx = Fixture::new(None);
    fx.store.recording_mut(1).unwrap().metadata = TechnicalMetadata {
        width: Some(3840),
        ..Default::default()
    };
    let options = fx.options();

    let mut probe = ScriptedProbe::returning(TechnicalMetadata {
        codec: Some("prores".to_string()),
        ..full_metadata()
    });
    let mut invoker = FakeInvoker::default();
    Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .with_fixed_clock(d0() + Duration::hours(1))
        .run()
        .unwrap();

    assert_eq!(probe.calls, 1);
    let meta = &fx.store.recording(1).unwrap().metadata;
    assert_eq!(meta.width, Some(3840));
    assert_eq!(meta.height, Some(1080));
    assert_eq!(meta.codec.as_deref(), Some("prores"));

    let request = invoker.request_for("orig_01_base.mp4");
    assert_eq!(request.frame_rate, Some(25.0));
    assert_eq!(request.codec.as_deref(), Some("prores"));
}

#[test]
fn probe_failure_is_a_warning_not_a_stop() {
    let mut fx = Fixture::new(None);
    fx.store.recording_mut(1).unwrap().metadata = TechnicalMetadata::default();
    let mut invoker = FakeInvoker::default();

    let report = fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(report.probe_warnings.len(), 1);
    assert_eq!(report.rebuilt.len(), 3);
    assert!(!report.has_problems());
    assert!(invoker.requests.iter().all(|r| r.frame_rate.is_none()));
}

#[test]
fn complete_metadata_is_never_probed() {
    let mut fx = Fixture::new(None);
    let options = fx.options();
    let mut probe = ScriptedProbe::failing();
    let mut invoker = FakeInvoker::default();

    let report = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .run()
        .unwrap();

    assert_eq!(probe.calls, 0);
    assert!(report.probe_warnings.is_empty());
}

#[test]
fn missing_target_size_skips_unless_fallback_given() {
    let mut fx = Fixture::new(None);
    let mut sizeless = output(13, OutputKind::FixedWindow, "orig_01_sizeless.mp4");
    sizeless.width = None;
    sizeless.height = None;
    fx.store.bind_output(sizeless, None);

    let mut invoker = FakeInvoker::default();
    let report = fx.run_at(&mut invoker, d0() + Duration::hours(1));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].output_id, Some(13));
    assert_eq!(report.skipped[0].reason, SkipReason::NoTargetSize);
    assert_eq!(fx.store.output(13).unwrap().modified, None);

    let options = SchedulerOptions {
        fallback_width: Some(640),
        fallback_height: Some(360),
        ..fx.options()
    };
    let mut probe = ScriptedProbe::failing();
    let mut invoker = FakeInvoker::default();
    let report = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .with_fixed_clock(d0() + Duration::hours(3))
        .run()
        .unwrap();

    assert!(report.skipped.is_empty());
    assert_eq!(report.rebuilt_ids(), vec![13]);
    let request = invoker.request_for("orig_01_sizeless.mp4");
    assert_eq!((request.width, request.height), (640, 360));
}

#[test]
fn keyframe_without_position_is_reported_and_siblings_render() {
    let mut fx = Fixture::new(None);
    fx.store.keyframe_mut(1).unwrap().x = None;
    let mut invoker = FakeInvoker::default();

    let report = fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(report.rebuilt_ids(), vec![10, 12]);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::InvalidKeyframe { .. }
    ));
}

#[test]
fn requests_carry_windows_seeks_and_filters() {
    let mut fx = Fixture::new(None);
    fx.store.recording_mut(1).unwrap().window = CropWindow {
        start_secs: Some(1.5),
        max_duration_secs: None,
    };
    let mut base = output(13, OutputKind::FixedWindow, "orig_01_window.mp4");
    base.window = CropWindow {
        start_secs: Some(0.0),
        max_duration_secs: Some(3.0),
    };
    fx.store.bind_output(base, None);

    let options = SchedulerOptions {
        fallback_duration_secs: Some(5.0),
        ..fx.options()
    };
    let mut probe = ScriptedProbe::failing();
    let mut invoker = FakeInvoker::default();
    Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .with_fixed_clock(d0() + Duration::hours(1))
        .run()
        .unwrap();

    let base = invoker.request_for("orig_01_base.mp4");
    assert_eq!(base.seek_secs, Some(1.5));
    assert_eq!(base.max_duration_secs, Some(5.0));
    assert!(base
        .filter
        .starts_with("scale=320:180:force_original_aspect_ratio=decrease,pad=320:180"));

    let window = invoker.request_for("orig_01_window.mp4");
    assert_eq!(window.seek_secs, Some(0.0));
    assert_eq!(window.max_duration_secs, Some(3.0));

    let poi = invoker.request_for("orig_01_poi_1.mp4");
    assert_eq!(poi.seek_secs, Some(3.5));
    assert_eq!(poi.codec.as_deref(), Some("h264"));
    assert_eq!(
        poi.filter,
        "crop=w='320/(1.2)':h='180/(1.2)':x='max(0,min(iw-ow,(980)-ow/2))':\
         y='max(0,min(ih-oh,(560)-oh/2))',scale=320:180"
    );
    assert_eq!(poi.input, fx.root.join("orig_01.mov"));
    assert_eq!(poi.output, fx.root.join("snap/orig_01_poi_1.mp4"));
}

#[test]
fn zero_seek_is_omitted_for_keyframe_outputs() {
    let mut fx = Fixture::new(None);
    fx.store.keyframe_mut(1).unwrap().time_secs = None;
    let mut invoker = FakeInvoker::default();

    fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(invoker.request_for("orig_01_poi_1.mp4").seek_secs, None);
    assert_eq!(invoker.request_for("orig_01_base.mp4").seek_secs, None);
}

#[test]
fn cancellation_stops_between_rebuilds_and_keeps_commits() {
    let mut fx = Fixture::new(None);
    let cancel = Arc::new(AtomicBool::new(false));
    let mut invoker = FakeInvoker {
        cancel_after: Some((1, cancel.clone())),
        ..Default::default()
    };
    let options = fx.options();
    let stamp = d0() + Duration::hours(1);
    let mut probe = ScriptedProbe::failing();

    let report = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .with_cancel_flag(cancel)
        .with_fixed_clock(stamp)
        .run()
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.rebuilt_ids(), vec![10]);
    assert_eq!(invoker.requests.len(), 1);
    assert_eq!(fx.store.output(10).unwrap().modified, Some(stamp));
    assert_eq!(fx.store.output(11).unwrap().modified, None);
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(stamp));

    let mut resumed = FakeInvoker::default();
    let second = fx.run_at(&mut resumed, d0() + Duration::hours(2));

    assert!(!second.cancelled);
    assert_eq!(second.rebuilt_ids(), vec![11, 12]);
    assert_eq!(second.up_to_date, vec![10]);
}

#[test]
fn stamp_never_moves_backwards() {
    let conv = d0() + Duration::hours(5);
    let mut fx = Fixture::new(Some(conv));
    fx.store.recording_mut(1).unwrap().raw_modified = Some(d0() + Duration::hours(6));
    let mut invoker = FakeInvoker::default();

    fx.run_at(&mut invoker, d0() + Duration::hours(1));

    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(conv));
}

#[test]
fn uninitialized_store_aborts_the_batch() {
    let mut store = MemoryStore::uninitialized();
    let mut probe = ScriptedProbe::failing();
    let mut invoker = FakeInvoker::default();

    let err = Scheduler::new(&mut store, &mut probe, &mut invoker, SchedulerOptions::default())
        .run()
        .unwrap_err();

    assert!(matches!(err, PoiframeError::ConfigurationMissing { .. }));
    assert!(invoker.requests.is_empty());
}

#[test]
fn dry_run_records_invocations_and_stamps() {
    let mut fx = Fixture::new(None);
    let options = fx.options();
    let mut probe = ScriptedProbe::failing();
    let mut invoker = FfmpegInvoker::new("ffmpeg", "libx264").dry_run(true);
    let stamp = d0() + Duration::hours(1);

    let report = Scheduler::new(&mut fx.store, &mut probe, &mut invoker, options)
        .with_fixed_clock(stamp)
        .run()
        .unwrap();

    assert_eq!(report.rebuilt.len(), 3);
    assert_eq!(invoker.recorded().len(), 3);
    let first = &invoker.recorded()[0];
    assert_eq!(first[0], "ffmpeg");
    assert!(first.contains(&"-an".to_string()));
    assert!(first.contains(&"libx264".to_string()));
    assert_eq!(fx.store.recording(1).unwrap().outputs_modified, Some(stamp));
}
