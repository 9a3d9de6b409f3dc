//! Offline sink with a manually advanced clock.

use ss_engine::{AudioBlock, BlockKey, EngineError, OutputSink, StereoFrame};

use crate::timeline::Timeline;

/// Renders scheduled blocks into memory instead of a device.
///
/// The clock only moves when [`OfflineSink::advance`] is called, which
/// makes playback deterministic for export and tests.
pub struct OfflineSink {
    timeline: Timeline,
    played: u64,
    output: Vec<StereoFrame>,
}

impl OfflineSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            timeline: Timeline::new(sample_rate),
            played: 0,
            output: Vec::new(),
        }
    }

    /// Play `frames` frames: render what is scheduled, silence otherwise.
    pub fn advance(&mut self, frames: usize) {
        self.output.reserve(frames);
        let from = self.played;
        let output = &mut self.output;
        let written = self.timeline.render(from, frames, |frame| {
            output.push(frame);
            true
        });
        self.output
            .extend(std::iter::repeat(StereoFrame::silence()).take(frames - written));
        self.played += frames as u64;
    }

    /// Frames played so far.
    pub fn position(&self) -> u64 {
        self.played
    }

    pub fn output(&self) -> &[StereoFrame] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<StereoFrame> {
        std::mem::take(&mut self.output)
    }
}

impl OutputSink for OfflineSink {
    fn sample_rate(&self) -> u32 {
        self.timeline.sample_rate()
    }

    fn now(&self) -> f64 {
        self.played as f64 / self.timeline.sample_rate() as f64
    }

    fn schedule(&mut self, key: BlockKey, block: AudioBlock, start_time: f64) -> Result<(), EngineError> {
        self.timeline.insert(key, block, start_time);
        Ok(())
    }

    fn drain_completed(&mut self, completed: &mut Vec<BlockKey>) {
        self.timeline.drain_completed(self.played, completed);
    }

    fn flush(&mut self) {
        self.timeline.clear();
    }
}
