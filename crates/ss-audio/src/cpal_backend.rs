//! CPAL-based output sink.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use log::{debug, error, info};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use ss_engine::{AudioBlock, BlockKey, EngineError, OutputSink, StereoFrame};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::timeline::Timeline;
use crate::traits::AudioError;

/// Fill one device callback buffer from the ring.
///
/// Writes the stereo pair into the first two channels and zero-fills the
/// rest. An empty ring plays silence. `played` advances by one per device
/// frame whether or not audio was available; it is the device clock.
pub fn fill_device_buffer<C>(consumer: &mut C, data: &mut [f32], channels: usize, played: &AtomicU64)
where
    C: Consumer<Item = StereoFrame>,
{
    let channels = channels.max(1);
    let mut frames = 0u64;
    for chunk in data.chunks_mut(channels) {
        let frame = consumer.try_pop().unwrap_or_default();
        for (i, sample) in chunk.iter_mut().enumerate() {
            *sample = match i {
                0 => frame.left,
                1 => frame.right,
                _ => 0.0,
            };
        }
        frames += 1;
    }
    played.fetch_add(frames, Ordering::Release);
}

/// Drop frames a flush left behind in the ring before they reach the device.
///
/// `stale` is the count still to discard. Skipped frames were never heard,
/// so the device clock does not move.
pub fn skip_flushed<C>(consumer: &mut C, stale: &AtomicUsize)
where
    C: Consumer<Item = StereoFrame>,
{
    let pending = stale.load(Ordering::Acquire);
    if pending > 0 {
        // Fewer than `pending` left means a callback racing the flush
        // already played the rest
        consumer.skip(pending);
        stale.fetch_sub(pending, Ordering::Release);
    }
}

/// Output sink playing through the default CPAL device.
///
/// Scheduled blocks sit on a [`Timeline`] until the ring buffer has room;
/// every call from the scheduler tops the ring up. The device clock counts
/// frames the stream callback has emitted while running.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<StereoFrame>,
    running: Arc<AtomicBool>,
    played: Arc<AtomicU64>,
    /// Ring frames a flush asked the callback to discard.
    stale: Arc<AtomicUsize>,
    timeline: Timeline,
}

impl CpalOutput {
    /// Create a new CPAL output with the default device.
    pub fn new() -> Result<(Self, HeapCons<StereoFrame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // The callback assumes 2-channel interleaving
        config.channels = 2;

        // About 200ms between the timeline and the device
        let buffer_size = config.sample_rate.0 as usize / 5;
        let rb = HeapRb::<StereoFrame>::new(buffer_size);
        let (producer, consumer) = rb.split();

        let output = Self {
            timeline: Timeline::new(config.sample_rate.0),
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
            played: Arc::new(AtomicU64::new(0)),
            stale: Arc::new(AtomicUsize::new(0)),
        };

        Ok((output, consumer))
    }

    /// Open the default device and start its stream.
    pub fn open() -> Result<Self, AudioError> {
        let (mut output, consumer) = Self::new()?;
        output.build_stream(consumer)?;
        output.start()?;
        Ok(output)
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<StereoFrame>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let played = self.played.clone();
        let stale = self.stale.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    skip_flushed(&mut consumer, &stale);
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    #[cfg(feature = "alloc_check")]
                    assert_no_alloc::assert_no_alloc(|| {
                        fill_device_buffer(&mut consumer, data, channels, &played)
                    });
                    #[cfg(not(feature = "alloc_check"))]
                    fill_device_buffer(&mut consumer, data, channels, &played);
                },
                |err| error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        info!(
            "audio stream open: {} Hz, {} channels",
            self.config.sample_rate.0, self.config.channels
        );
        Ok(())
    }

    /// Resume the device clock.
    pub fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    /// Freeze the device clock and output silence.
    pub fn pause(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn played_frames(&self) -> u64 {
        self.played.load(Ordering::Acquire)
    }

    /// Move as much of the timeline into the ring as fits. Waits while the
    /// callback still has flushed frames to discard.
    fn pump(&mut self) {
        if self.stale.load(Ordering::Acquire) > 0 {
            return;
        }
        let next = self.played_frames() + self.producer.occupied_len() as u64;
        let room = self.producer.vacant_len();
        let producer = &mut self.producer;
        self.timeline.render(next, room, |frame| producer.try_push(frame).is_ok());
    }
}

impl OutputSink for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn now(&self) -> f64 {
        self.played_frames() as f64 / self.config.sample_rate.0 as f64
    }

    fn schedule(&mut self, key: BlockKey, block: AudioBlock, start_time: f64) -> Result<(), EngineError> {
        if self.stream.is_none() {
            return Err(AudioError::Playback("stream not built".into()).into());
        }
        self.timeline.insert(key, block, start_time);
        self.pump();
        Ok(())
    }

    fn drain_completed(&mut self, completed: &mut Vec<BlockKey>) {
        self.pump();
        let played = self.played_frames();
        self.timeline.drain_completed(played, completed);
    }

    /// Forget the timeline and have the callback discard what is already
    /// in the ring.
    fn flush(&mut self) {
        self.timeline.clear();
        let queued = self.producer.occupied_len();
        if queued > 0 {
            self.stale.fetch_add(queued, Ordering::Release);
            debug!("flushing {} queued frames", queued);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_stereo_pairs_then_silence() {
        let rb = HeapRb::<StereoFrame>::new(8);
        let (mut prod, mut cons) = rb.split();
        prod.try_push(StereoFrame::new(0.5, -0.5)).unwrap();
        prod.try_push(StereoFrame::new(0.25, -0.25)).unwrap();

        let played = AtomicU64::new(0);
        let mut data = [9.0f32; 8];
        fill_device_buffer(&mut cons, &mut data, 2, &played);

        assert_eq!(data, [0.5, -0.5, 0.25, -0.25, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(played.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn extra_channels_are_zeroed() {
        let rb = HeapRb::<StereoFrame>::new(4);
        let (mut prod, mut cons) = rb.split();
        prod.try_push(StereoFrame::new(0.1, 0.2)).unwrap();

        let played = AtomicU64::new(10);
        let mut data = [9.0f32; 4];
        fill_device_buffer(&mut cons, &mut data, 4, &played);

        assert_eq!(data, [0.1, 0.2, 0.0, 0.0]);
        assert_eq!(played.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn flushed_frames_never_reach_the_device() {
        let rb = HeapRb::<StereoFrame>::new(8);
        let (mut prod, mut cons) = rb.split();
        for _ in 0..3 {
            prod.try_push(StereoFrame::new(0.9, 0.9)).unwrap();
        }
        let stale = AtomicUsize::new(prod.occupied_len());

        skip_flushed(&mut cons, &stale);
        assert_eq!(stale.load(Ordering::Relaxed), 0);
        prod.try_push(StereoFrame::new(0.1, 0.1)).unwrap();

        let played = AtomicU64::new(0);
        let mut data = [9.0f32; 4];
        fill_device_buffer(&mut cons, &mut data, 2, &played);
        assert_eq!(data, [0.1, 0.1, 0.0, 0.0]);
        assert_eq!(played.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn flush_racing_the_callback_skips_only_what_is_left() {
        let rb = HeapRb::<StereoFrame>::new(8);
        let (mut prod, mut cons) = rb.split();
        for _ in 0..4 {
            prod.try_push(StereoFrame::new(0.9, 0.9)).unwrap();
        }
        let stale = AtomicUsize::new(4);
        // One frame played between the flush and the next callback
        let _ = cons.try_pop();

        skip_flushed(&mut cons, &stale);
        assert_eq!(stale.load(Ordering::Relaxed), 0);
        assert_eq!(cons.occupied_len(), 0);
    }
}
