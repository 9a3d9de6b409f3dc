//! Bookkeeping for blocks handed to the output sink.

use std::collections::VecDeque;

use slotmap::SlotMap;
use ss_ir::SampleIndex;

use crate::sink::BlockKey;

/// One block as placed on the device clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledBlock {
    pub start_sample: SampleIndex,
    pub sample_count: usize,
    /// Device-clock start, seconds.
    pub start_time: f64,
    pub duration: f64,
}

impl ScheduledBlock {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Scheduled blocks in start-time order.
///
/// Blocks are appended as they are scheduled and removed when the sink
/// reports completion. Keys stay valid across removals of other blocks.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    blocks: SlotMap<BlockKey, ScheduledBlock>,
    order: VecDeque<BlockKey>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block after every block already queued.
    pub fn push(&mut self, block: ScheduledBlock) -> BlockKey {
        let key = self.blocks.insert(block);
        self.order.push_back(key);
        key
    }

    /// Remove a finished block. Unknown keys are ignored.
    pub fn complete(&mut self, key: BlockKey) -> Option<ScheduledBlock> {
        let block = self.blocks.remove(key)?;
        // Completion arrives in play order, so this is almost always the front.
        if self.order.front() == Some(&key) {
            self.order.pop_front();
        } else {
            self.order.retain(|k| *k != key);
        }
        Some(block)
    }

    pub fn get(&self, key: BlockKey) -> Option<&ScheduledBlock> {
        self.blocks.get(key)
    }

    /// Blocks in start-time order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledBlock> {
        self.order.iter().filter_map(|k| self.blocks.get(*k))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.order.clear();
    }

    /// True when each block starts exactly where the previous one ends
    /// (within `epsilon` seconds) and sample ranges are contiguous.
    pub fn is_gapless(&self, epsilon: f64) -> bool {
        let mut prev: Option<&ScheduledBlock> = None;
        for block in self.iter() {
            if let Some(p) = prev {
                if (p.end_time() - block.start_time).abs() > epsilon {
                    return false;
                }
                if p.start_sample.add(p.sample_count as u64) != block.start_sample {
                    return false;
                }
            }
            prev = Some(block);
        }
        true
    }
}
