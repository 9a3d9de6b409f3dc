//! Stereo f32 buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

use crate::frame::{clamp_unit, StereoFrame};

/// A stereo f32 buffer in planar layout.
///
/// `data[0..frames]` is the left plane, `data[frames..2 * frames]` the right.
/// This is what a compute backend returns for one evaluated range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StereoBuffer {
    data: Vec<f32>,
    frames: usize,
}

impl StereoBuffer {
    /// Create a new silent buffer.
    pub fn new(frames: usize) -> Self {
        Self {
            data: vec![0.0; frames * 2],
            frames,
        }
    }

    /// Build from separate left/right planes. The shorter plane sets the length.
    pub fn from_planes(left: &[f32], right: &[f32]) -> Self {
        let frames = left.len().min(right.len());
        let mut data = Vec::with_capacity(frames * 2);
        data.extend_from_slice(&left[..frames]);
        data.extend_from_slice(&right[..frames]);
        Self { data, frames }
    }

    /// Build from interleaved `[l, r, l, r, ...]` samples.
    pub fn from_interleaved(samples: &[f32]) -> Self {
        let frames = samples.len() / 2;
        let mut buf = Self::new(frames);
        for (i, pair) in samples.chunks_exact(2).enumerate() {
            buf.data[i] = pair[0];
            buf.data[frames + i] = pair[1];
        }
        buf
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Left channel samples.
    pub fn left(&self) -> &[f32] {
        &self.data[..self.frames]
    }

    /// Right channel samples.
    pub fn right(&self) -> &[f32] {
        &self.data[self.frames..]
    }

    pub fn left_mut(&mut self) -> &mut [f32] {
        let frames = self.frames;
        &mut self.data[..frames]
    }

    pub fn right_mut(&mut self) -> &mut [f32] {
        let frames = self.frames;
        &mut self.data[frames..]
    }

    /// Write one frame.
    pub fn set(&mut self, index: usize, frame: StereoFrame) {
        self.data[index] = frame.left;
        self.data[self.frames + index] = frame.right;
    }

    /// Read one frame, or `None` past the end.
    pub fn frame(&self, index: usize) -> Option<StereoFrame> {
        if index >= self.frames {
            return None;
        }
        Some(StereoFrame::new(self.data[index], self.data[self.frames + index]))
    }

    /// Iterate frames in order.
    pub fn iter_frames(&self) -> impl Iterator<Item = StereoFrame> + '_ {
        self.left()
            .iter()
            .zip(self.right())
            .map(|(&l, &r)| StereoFrame::new(l, r))
    }

    /// Clamp every sample into [-1, 1], replacing NaN with silence.
    pub fn clamp(&mut self) {
        for s in &mut self.data {
            *s = clamp_unit(*s);
        }
    }
}
