//! Output device abstraction consumed by the scheduler.

use ss_ir::AudioBlock;

use crate::error::EngineError;

slotmap::new_key_type! {
    /// Identifies one scheduled block in the playback queue.
    pub struct BlockKey;
}

/// Where scheduled blocks go to be heard.
///
/// A sink owns a device clock and accepts blocks positioned on it. Once a
/// block has played, the sink reports its key so the scheduler can drop its
/// bookkeeping.
pub trait OutputSink {
    /// Device sample rate.
    fn sample_rate(&self) -> u32;

    /// Device clock in seconds.
    fn now(&self) -> f64;

    /// Take ownership of `block` and play it starting at `start_time` on
    /// the device clock.
    fn schedule(&mut self, key: BlockKey, block: AudioBlock, start_time: f64) -> Result<(), EngineError>;

    /// Append the keys of blocks that finished playing since the last call.
    fn drain_completed(&mut self, completed: &mut Vec<BlockKey>);

    /// Drop everything not yet played.
    fn flush(&mut self);
}
