//! Stereo frame type.

/// A stereo audio frame (32-bit float, nominally in [-1, 1]).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Clamp both channels into [-1, 1]. NaN becomes silence.
    pub fn clamped(self) -> Self {
        Self {
            left: clamp_unit(self.left),
            right: clamp_unit(self.right),
        }
    }

    /// Convert to 16-bit PCM.
    pub fn to_i16(self) -> (i16, i16) {
        let c = self.clamped();
        ((c.left * 32767.0) as i16, (c.right * 32767.0) as i16)
    }
}

pub(crate) fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-1.0, 1.0)
    }
}
