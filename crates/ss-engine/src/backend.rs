//! Compute backend boundary.
//!
//! The backend evaluates a user-supplied `(sampleIndex, time) -> (left, right)`
//! function over a range of sample positions. How it compiles and runs that
//! function (GPU harness, interpreter, native closure) is its own business.

use ss_ir::{SampleIndex, StateSnapshot, StereoBuffer};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Evaluation(String),
}

/// Sample positions to evaluate: `start + i * stride` for `i in 0..count`.
///
/// `stride == 1` is the consecutive audio path; larger strides are the sparse
/// decimation path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalRange {
    pub start: SampleIndex,
    pub count: usize,
    pub sample_rate: f64,
    pub stride: u64,
}

impl EvalRange {
    /// Consecutive samples.
    pub fn contiguous(start: SampleIndex, count: usize, sample_rate: f64) -> Self {
        Self { start, count, sample_rate, stride: 1 }
    }

    /// Index of the `i`th evaluated sample.
    pub fn position(&self, i: usize) -> SampleIndex {
        self.start.strided(i as u64, self.stride.max(1))
    }
}

/// Inputs to one evaluation of a sound shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderInput {
    pub sample: SampleIndex,
    /// Derived from `sample`; display and slow parameters only.
    pub time: f64,
    pub sample_rate: f64,
}

impl ShaderInput {
    pub fn new(sample: SampleIndex, sample_rate: f64) -> Self {
        Self {
            sample,
            time: sample.to_seconds(sample_rate),
            sample_rate,
        }
    }

    /// Oscillator phase in [0, 1) for `frequency`, computed from the integer
    /// index so it does not degrade as the session runs on.
    pub fn phase(&self, frequency: f64) -> f64 {
        let rate = self.sample_rate.round().max(1.0) as u64;
        let whole_seconds = self.sample.get() / rate;
        let rem = self.sample.get() % rate;
        let cycles = whole_seconds as f64 * frequency.fract() + rem as f64 * frequency / rate as f64;
        cycles.rem_euclid(1.0)
    }
}

/// An evaluator of sound shaders.
///
/// Each compute context owns its own instance; nothing is shared between
/// the audio and waveform contexts.
pub trait ComputeBackend: Send {
    /// Compile `source`, replacing the active program on success.
    fn compile(&mut self, source: &str) -> Result<(), BackendError>;

    /// Evaluate the active program. Output is clamped to [-1, 1].
    fn evaluate_range(
        &mut self,
        range: &EvalRange,
        state: &StateSnapshot,
    ) -> Result<StereoBuffer, BackendError>;

    /// Upper bound on `range.count` per call.
    fn max_block_samples(&self) -> usize;
}
