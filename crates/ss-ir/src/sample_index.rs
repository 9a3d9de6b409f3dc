//! Integer sample timebase.

/// Absolute sample position from playback start.
///
/// This is the only phase reference handed to a sound shader. Seconds are
/// derived from it, never the other way around, so oscillator phase does not
/// drift over long sessions. Values stay below 2^53 so they survive a round
/// trip through an `f64` on the backend side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleIndex(u64);

impl SampleIndex {
    /// Largest index that is exactly representable as an `f64`.
    pub const MAX_SAFE: u64 = (1 << 53) - 1;

    pub const ZERO: Self = Self(0);

    /// Panics in debug builds past [`Self::MAX_SAFE`]; clamps otherwise.
    pub const fn new(index: u64) -> Self {
        debug_assert!(index <= Self::MAX_SAFE, "sample index beyond 2^53");
        if index > Self::MAX_SAFE {
            Self(Self::MAX_SAFE)
        } else {
            Self(index)
        }
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Offset by `samples`, saturating at [`Self::MAX_SAFE`].
    pub fn add(self, samples: u64) -> Self {
        Self(self.0.min(Self::MAX_SAFE).saturating_add(samples).min(Self::MAX_SAFE))
    }

    /// Index of the `i`th sample when stepping by `stride`.
    pub fn strided(self, i: u64, stride: u64) -> Self {
        self.add(i.saturating_mul(stride))
    }

    /// Derived wall time in seconds. For display and slow parameters only.
    pub fn to_seconds(self, sample_rate: f64) -> f64 {
        if sample_rate <= 0.0 {
            return 0.0;
        }
        self.0 as f64 / sample_rate
    }
}

impl From<u64> for SampleIndex {
    fn from(index: u64) -> Self {
        Self::new(index)
    }
}

/// Monotonic generation cursor.
///
/// Advances when a block is *generated*, not when it finishes playing, so the
/// index after N blocks is always the sum of their sample counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleClock {
    position: SampleIndex,
}

impl SampleClock {
    pub const fn new() -> Self {
        Self { position: SampleIndex::ZERO }
    }

    /// Current position (start of the next block to generate).
    pub fn position(&self) -> SampleIndex {
        self.position
    }

    /// Rewind to sample 0.
    pub fn reset(&mut self) {
        self.position = SampleIndex::ZERO;
    }

    /// Advance by a generated block's sample count.
    pub fn advance(&mut self, samples: usize) {
        self.position = self.position.add(samples as u64);
    }
}
