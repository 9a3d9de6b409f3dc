//! Waveform previews through threaded compute contexts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ss_engine::{
    presets, ComputeWorker, DecimationPlan, FnBackend, ProgramRegistry, SampleIndex, SessionConfig,
    ViewStatus, WaveformEngine, WaveformView, VIEW_CACHE_CAPACITY,
};

fn engine() -> WaveformEngine {
    let backend = Box::new(FnBackend::new(ProgramRegistry::with_presets()));
    let worker = ComputeWorker::spawn("waveform", backend).unwrap();
    let mut engine = WaveformEngine::new(&SessionConfig::default(), worker, 48000.0);
    engine.set_shader_source(presets::STEREO_BEAT);
    engine.wait_ready(Duration::from_secs(2)).unwrap();
    engine
}

fn idx(i: u64) -> SampleIndex {
    SampleIndex::new(i)
}

/// Poll until nothing is in flight.
fn settle(engine: &mut WaveformEngine) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while engine.pending_request().is_some() {
        assert!(Instant::now() < deadline, "view never arrived");
        engine.poll();
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn view(engine: &mut WaveformEngine, start: u64, end: u64, width: usize) -> Arc<WaveformView> {
    if let ViewStatus::Cached(v) = engine.request_view(idx(start), idx(end), width).unwrap() {
        return v;
    }
    settle(engine);
    engine
        .get_cached(&engine.view_key(idx(start), idx(end), width))
        .expect("view cached")
}

#[test]
fn one_second_at_200_columns() {
    let plan = DecimationPlan::new(idx(0), idx(48000), 200, 65536);
    assert_eq!(plan.stride, 30);
    assert_eq!(plan.render_width, 1600);

    let mut e = engine();
    let flat = view(&mut e, 0, 48000, 200).to_flat();
    assert_eq!(flat.len(), 800);
    assert!(flat.iter().all(|v| (-1.0..=1.0).contains(v)));
}

#[test]
fn ten_samples_into_100_columns() {
    let mut e = engine();
    let v = view(&mut e, 0, 10, 100);
    assert_eq!(v.width(), 100);
    assert!(v.to_flat().iter().all(|x| !x.is_nan()));
}

#[test]
fn independent_engines_agree() {
    let mut a = engine();
    let mut b = engine();
    for (start, end, width) in [(0, 48000, 200), (12_345, 400_000, 640), (7, 90, 33)] {
        assert_eq!(view(&mut a, start, end, width).columns, view(&mut b, start, end, width).columns);
    }
}

#[test]
fn superseded_request_never_lands() {
    let mut e = engine();
    let first = e.request_view(idx(0), idx(48000), 100).unwrap();
    let second = e.request_view(idx(48000), idx(96000), 100).unwrap();
    assert!(matches!(first, ViewStatus::Requested(_)));
    assert!(matches!(second, ViewStatus::Requested(_)));
    settle(&mut e);

    // Both responses have come back by now; only the newer one was kept
    std::thread::sleep(Duration::from_millis(50));
    e.poll();
    assert!(e.get_cached(&e.view_key(idx(0), idx(48000), 100)).is_none());
    assert!(e.get_cached(&e.view_key(idx(48000), idx(96000), 100)).is_some());
    assert_eq!(e.cache().len(), 1);
}

#[test]
fn cache_keeps_ten_newest_views() {
    let mut e = engine();
    for i in 0..15u64 {
        view(&mut e, i * 1000, i * 1000 + 4800, 64);
    }
    assert_eq!(e.cache().len(), VIEW_CACHE_CAPACITY);
    for i in 0..5u64 {
        assert!(e.get_cached(&e.view_key(idx(i * 1000), idx(i * 1000 + 4800), 64)).is_none());
    }
    for i in 5..15u64 {
        assert!(e.get_cached(&e.view_key(idx(i * 1000), idx(i * 1000 + 4800), 64)).is_some());
    }
}
