//! Waveform view keys and decimated column data.

use alloc::vec::Vec;

use crate::sample_index::SampleIndex;

/// Correlation id carried by every request to a compute context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    /// The id after this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Exact-match identity of a cached waveform view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub start: SampleIndex,
    pub end: SampleIndex,
    pub width: usize,
    /// Hash of the note/parameter state the view was rendered with.
    pub state_hash: u64,
}

impl ViewKey {
    pub fn new(start: SampleIndex, end: SampleIndex, width: usize, state_hash: u64) -> Self {
        Self { start, end, width, state_hash }
    }

    /// Samples covered by the view. Inverted ranges count as empty.
    pub fn total_samples(&self) -> u64 {
        self.end.get().saturating_sub(self.start.get())
    }
}

/// Min/max of both channels over one pixel column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColumnMinMax {
    pub min_left: f32,
    pub max_left: f32,
    pub min_right: f32,
    pub max_right: f32,
}

impl ColumnMinMax {
    /// A column collapsed onto a single sample.
    pub fn point(left: f32, right: f32) -> Self {
        Self {
            min_left: left,
            max_left: left,
            min_right: right,
            max_right: right,
        }
    }

    /// Widen to include another sample.
    pub fn include(&mut self, left: f32, right: f32) {
        self.min_left = self.min_left.min(left);
        self.max_left = self.max_left.max(left);
        self.min_right = self.min_right.min(right);
        self.max_right = self.max_right.max(right);
    }
}

/// Decimated waveform for one view, ready for painting.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformView {
    pub key: ViewKey,
    pub columns: Vec<ColumnMinMax>,
}

impl WaveformView {
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// `[minL, maxL, minR, maxR]` per column, `width * 4` floats.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.columns.len() * 4);
        for c in &self.columns {
            out.extend_from_slice(&[c.min_left, c.max_left, c.min_right, c.max_right]);
        }
        out
    }
}
