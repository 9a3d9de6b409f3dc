//! Generated audio blocks.

use crate::audio_buffer::StereoBuffer;
use crate::sample_index::SampleIndex;

/// A contiguous run of generated audio.
///
/// Owned by the scheduler from creation until it is handed to an output
/// sink, then owned by the sink until it has played.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    pub start: SampleIndex,
    pub samples: StereoBuffer,
}

impl AudioBlock {
    pub fn new(start: SampleIndex, samples: StereoBuffer) -> Self {
        Self { start, samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.frames()
    }

    /// First sample index after this block.
    pub fn end(&self) -> SampleIndex {
        self.start.add(self.sample_count() as u64)
    }

    pub fn duration_seconds(&self, sample_rate: f64) -> f64 {
        if sample_rate <= 0.0 {
            return 0.0;
        }
        self.sample_count() as f64 / sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_and_end() {
        let block = AudioBlock::new(SampleIndex::new(4800), StereoBuffer::new(4800));
        assert_eq!(block.sample_count(), 4800);
        assert_eq!(block.end().get(), 9600);
        assert!((block.duration_seconds(48000.0) - 0.1).abs() < 1e-12);
    }
}
