//! Frame-accurate placement of scheduled blocks on a device timeline.

use std::collections::VecDeque;

use log::debug;
use ss_engine::{AudioBlock, BlockKey, StereoFrame};

struct Pending {
    key: BlockKey,
    start_frame: u64,
    block: AudioBlock,
    /// Frames of `block` already written or skipped.
    offset: usize,
}

impl Pending {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.block.sample_count() as u64
    }

    fn remaining(&self) -> usize {
        self.block.sample_count() - self.offset
    }
}

/// Scheduled blocks in start order, rendered into a continuous frame stream.
///
/// Frame `n` on the timeline is heard `n / sample_rate` seconds after the
/// device clock started. Gaps between blocks render as silence; a block whose
/// start has already been rendered past loses its late frames so everything
/// after it stays aligned with the clock.
pub struct Timeline {
    sample_rate: f64,
    pending: VecDeque<Pending>,
    /// Fully rendered blocks waiting for the clock to pass their end.
    rendered: VecDeque<(BlockKey, u64)>,
    last_end: Option<u64>,
}

impl Timeline {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            pending: VecDeque::with_capacity(16),
            rendered: VecDeque::with_capacity(16),
            last_end: None,
        }
    }

    /// Place `block` at `start_time` seconds on the device clock.
    ///
    /// A start within one frame of the previous block's end is snapped onto
    /// it so back-to-back blocks stay sample-contiguous despite rounding.
    pub fn insert(&mut self, key: BlockKey, block: AudioBlock, start_time: f64) {
        let mut start_frame = (start_time.max(0.0) * self.sample_rate).round() as u64;
        if let Some(end) = self.last_end {
            if start_frame.abs_diff(end) <= 1 {
                start_frame = end;
            }
        }
        if block.sample_count() == 0 {
            // Nothing to render; completes once the clock reaches its start
            debug!("empty block at frame {}", start_frame);
            let at = self
                .rendered
                .iter()
                .position(|&(_, end)| end > start_frame)
                .unwrap_or(self.rendered.len());
            self.rendered.insert(at, (key, start_frame));
            return;
        }
        let entry = Pending { key, start_frame, block, offset: 0 };
        self.last_end = Some(entry.end_frame());

        // Blocks nearly always arrive in order; keep the queue sorted if not.
        let at = self
            .pending
            .iter()
            .position(|p| p.start_frame > start_frame)
            .unwrap_or(self.pending.len());
        self.pending.insert(at, entry);
    }

    /// Render frames starting at timeline frame `from`, at most `max_frames`
    /// of them, through `push`. Stops early when `push` refuses a frame or
    /// nothing further is scheduled. Returns the number of frames pushed.
    pub fn render<F>(&mut self, from: u64, max_frames: usize, mut push: F) -> usize
    where
        F: FnMut(StereoFrame) -> bool,
    {
        let mut frame = from;
        let mut written = 0;

        while written < max_frames {
            let Some(entry) = self.pending.front_mut() else { break };

            let pos = entry.start_frame + entry.offset as u64;
            if pos < frame {
                let skip = ((frame - pos) as usize).min(entry.remaining());
                debug!("dropping {} late frames at {}", skip, pos);
                entry.offset += skip;
                if entry.remaining() == 0 {
                    self.finish_front();
                }
                continue;
            }

            let out = if pos > frame {
                StereoFrame::silence()
            } else {
                entry.block.samples.frame(entry.offset).unwrap_or_default()
            };
            if !push(out) {
                break;
            }
            if pos == frame {
                entry.offset += 1;
                if entry.remaining() == 0 {
                    self.finish_front();
                }
            }
            frame += 1;
            written += 1;
        }
        written
    }

    fn finish_front(&mut self) {
        if let Some(done) = self.pending.pop_front() {
            self.rendered.push_back((done.key, done.end_frame()));
        }
    }

    /// Move keys of rendered blocks that end at or before `played_frame`
    /// into `out`.
    pub fn drain_completed(&mut self, played_frame: u64, out: &mut Vec<BlockKey>) {
        while let Some(&(key, end)) = self.rendered.front() {
            if end > played_frame {
                break;
            }
            out.push(key);
            self.rendered.pop_front();
        }
    }

    /// Forget every block not yet played.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.rendered.clear();
        self.last_end = None;
    }

    /// Timeline frame after the last scheduled block.
    pub fn scheduled_end(&self) -> Option<u64> {
        self.last_end
    }

    pub fn pending_blocks(&self) -> usize {
        self.pending.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_engine::{PlaybackQueue, SampleIndex, ScheduledBlock, StereoBuffer};

    fn keys(n: usize) -> Vec<BlockKey> {
        let mut queue = PlaybackQueue::new();
        (0..n)
            .map(|_| {
                queue.push(ScheduledBlock {
                    start_sample: SampleIndex::ZERO,
                    sample_count: 0,
                    start_time: 0.0,
                    duration: 0.0,
                })
            })
            .collect()
    }

    fn block(level: f32, frames: usize) -> AudioBlock {
        AudioBlock::new(SampleIndex::ZERO, StereoBuffer::from_planes(&vec![level; frames], &vec![-level; frames]))
    }

    fn collect(t: &mut Timeline, from: u64, max: usize) -> Vec<StereoFrame> {
        let mut out = Vec::new();
        t.render(from, max, |f| {
            out.push(f);
            true
        });
        out
    }

    #[test]
    fn gap_before_first_block_is_silent() {
        let k = keys(1);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.5, 4), 0.003);
        let out = collect(&mut t, 0, 100);
        assert_eq!(out.len(), 7);
        assert!(out[..3].iter().all(|f| *f == StereoFrame::silence()));
        assert!(out[3..].iter().all(|f| f.left == 0.5 && f.right == -0.5));
    }

    #[test]
    fn back_to_back_blocks_are_contiguous() {
        let k = keys(2);
        let mut t = Timeline::new(48000);
        t.insert(k[0], block(0.1, 4800), 0.0);
        // 0.1s rounds onto the previous end
        t.insert(k[1], block(0.2, 4800), 0.1 + 1e-7);
        let out = collect(&mut t, 0, 10_000);
        assert_eq!(out.len(), 9600);
        assert_eq!(out[4799].left, 0.1);
        assert_eq!(out[4800].left, 0.2);
    }

    #[test]
    fn completion_follows_the_clock() {
        let k = keys(2);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.1, 10), 0.0);
        t.insert(k[1], block(0.2, 10), 0.010);
        collect(&mut t, 0, 20);

        let mut done = Vec::new();
        t.drain_completed(9, &mut done);
        assert!(done.is_empty());
        t.drain_completed(10, &mut done);
        assert_eq!(done, vec![k[0]]);
        t.drain_completed(25, &mut done);
        assert_eq!(done, vec![k[0], k[1]]);
    }

    #[test]
    fn late_frames_are_dropped_to_stay_aligned() {
        let k = keys(1);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.3, 10), 0.0);
        let out = collect(&mut t, 4, 100);
        assert_eq!(out.len(), 6);
        assert_eq!(t.pending_blocks(), 0);
    }

    #[test]
    fn refused_push_resumes_where_it_stopped() {
        let k = keys(1);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.3, 10), 0.0);
        let mut budget = 4;
        let n = t.render(0, 100, |_| {
            if budget == 0 {
                return false;
            }
            budget -= 1;
            true
        });
        assert_eq!(n, 4);
        assert_eq!(collect(&mut t, 4, 100).len(), 6);
    }

    #[test]
    fn clear_drops_everything() {
        let k = keys(1);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.3, 10), 0.0);
        t.clear();
        assert!(collect(&mut t, 0, 100).is_empty());
        assert_eq!(t.scheduled_end(), None);
    }

    #[test]
    fn empty_block_completes_without_rendering() {
        let k = keys(2);
        let mut t = Timeline::new(1000);
        t.insert(k[0], block(0.3, 0), 0.0);
        t.insert(k[1], block(0.4, 3), 0.0);
        assert_eq!(t.pending_blocks(), 1);
        assert_eq!(t.scheduled_end(), Some(3));

        let out = collect(&mut t, 0, 100);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|f| f.left == 0.4));

        let mut done = Vec::new();
        t.drain_completed(0, &mut done);
        assert_eq!(done, vec![k[0]]);
        t.drain_completed(3, &mut done);
        assert_eq!(done, vec![k[0], k[1]]);
    }
}
