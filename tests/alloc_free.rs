//! Allocation-free device path tests.
//!
//! The CPAL stream callback and the ring top-up between ticks must not
//! touch the heap. These drive the same functions without a device.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;
use ss_audio::{fill_device_buffer, skip_flushed, Timeline};
use ss_engine::{
    presets, AudioBlock, BlockKey, ComputeBackend, EvalRange, FnBackend, PlaybackQueue,
    ProgramRegistry, SampleIndex, ScheduledBlock, StateSnapshot, StereoFrame,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const RATE: u32 = 48000;

fn rendered_block(start: u64, count: usize) -> AudioBlock {
    let mut backend = FnBackend::new(ProgramRegistry::with_presets());
    backend.compile(presets::STEREO_BEAT).unwrap();
    let range = EvalRange::contiguous(SampleIndex::new(start), count, RATE as f64);
    AudioBlock::new(range.start, backend.evaluate_range(&range, &StateSnapshot::default()).unwrap())
}

fn keys(queue: &mut PlaybackQueue, n: usize) -> Vec<BlockKey> {
    (0..n)
        .map(|i| {
            queue.push(ScheduledBlock {
                start_sample: SampleIndex::new(i as u64 * 4800),
                sample_count: 4800,
                start_time: i as f64 * 0.1,
                duration: 0.1,
            })
        })
        .collect()
}

#[test]
fn device_callback_alloc_free() {
    let rb = HeapRb::<StereoFrame>::new(4096);
    let (mut prod, mut cons) = rb.split();
    for i in 0..3000 {
        let v = (i as f32 / 3000.0) - 0.5;
        let _ = prod.try_push(StereoFrame::new(v, -v));
    }
    let played = AtomicU64::new(0);
    // A flush left 500 frames behind
    let stale = AtomicUsize::new(500);
    let mut data = vec![0.0f32; 512 * 2];

    assert_no_alloc(|| {
        // Runs past the end of the ring into underrun silence
        for _ in 0..8 {
            skip_flushed(&mut cons, &stale);
            fill_device_buffer(&mut cons, &mut data, 2, &played);
        }
    });
    assert_eq!(played.load(Ordering::Relaxed), 8 * 512);
    assert_eq!(stale.load(Ordering::Relaxed), 0);
}

#[test]
fn ring_top_up_alloc_free() {
    let mut queue = PlaybackQueue::new();
    let keys = keys(&mut queue, 5);
    let mut timeline = Timeline::new(RATE);
    for (i, key) in keys.iter().enumerate() {
        timeline.insert(*key, rendered_block(i as u64 * 4800, 4800), i as f64 * 0.1);
    }

    let rb = HeapRb::<StereoFrame>::new(RATE as usize / 5);
    let (mut prod, mut cons) = rb.split();
    let played = AtomicU64::new(0);
    let mut data = vec![0.0f32; 256 * 2];
    let mut next = 0u64;

    assert_no_alloc(|| {
        while next < 5 * 4800 {
            let room = ringbuf::traits::Observer::vacant_len(&prod);
            next += timeline.render(next, room, |f| prod.try_push(f).is_ok()) as u64;
            fill_device_buffer(&mut cons, &mut data, 2, &played);
        }
    });
    assert_eq!(timeline.pending_blocks(), 0);
}
