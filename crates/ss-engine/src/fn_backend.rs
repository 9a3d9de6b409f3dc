//! Reference CPU backend built from native Rust programs.
//!
//! "Compiling" resolves the source text to a program registered by name.
//! Used for offline rendering, the CLI and tests; a GPU or interpreter
//! backend plugs in through the same [`ComputeBackend`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use ss_ir::{StateSnapshot, StereoBuffer, StereoFrame};

use crate::backend::{BackendError, ComputeBackend, EvalRange, ShaderInput};

/// A sound shader: one stereo frame per input.
pub type ShaderFn = Arc<dyn Fn(&ShaderInput, &StateSnapshot) -> (f32, f32) + Send + Sync>;

/// Default per-call sample limit.
const DEFAULT_MAX_BLOCK_SAMPLES: usize = 4096 * 16;

/// Named programs a [`FnBackend`] can compile.
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: HashMap<String, ShaderFn>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in presets.
    pub fn with_presets() -> Self {
        let mut registry = Self::new();
        crate::presets::register_all(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: &str, program: F)
    where
        F: Fn(&ShaderInput, &StateSnapshot) -> (f32, f32) + Send + Sync + 'static,
    {
        self.programs.insert(name.to_string(), Arc::new(program));
    }

    pub fn get(&self, name: &str) -> Option<ShaderFn> {
        self.programs.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// CPU backend evaluating registered programs.
pub struct FnBackend {
    registry: ProgramRegistry,
    active: Option<ShaderFn>,
    max_block_samples: usize,
}

impl FnBackend {
    pub fn new(registry: ProgramRegistry) -> Self {
        Self {
            registry,
            active: None,
            max_block_samples: DEFAULT_MAX_BLOCK_SAMPLES,
        }
    }

    /// Override the per-call sample limit.
    pub fn with_max_block_samples(mut self, max: usize) -> Self {
        self.max_block_samples = max.max(1);
        self
    }
}

impl ComputeBackend for FnBackend {
    fn compile(&mut self, source: &str) -> Result<(), BackendError> {
        let name = source.trim();
        match self.registry.get(name) {
            Some(program) => {
                self.active = Some(program);
                Ok(())
            }
            None => Err(BackendError::Compile(format!("unknown program `{}`", name))),
        }
    }

    fn evaluate_range(
        &mut self,
        range: &EvalRange,
        state: &StateSnapshot,
    ) -> Result<StereoBuffer, BackendError> {
        let program = self
            .active
            .as_ref()
            .ok_or_else(|| BackendError::Evaluation("no program compiled".into()))?;
        if range.count > self.max_block_samples {
            return Err(BackendError::Evaluation(format!(
                "{} samples requested, limit is {}",
                range.count, self.max_block_samples
            )));
        }

        let mut out = StereoBuffer::new(range.count);
        for i in 0..range.count {
            let input = ShaderInput::new(range.position(i), range.sample_rate);
            let (left, right) = program(&input, state);
            out.set(i, StereoFrame::new(left, right));
        }
        out.clamp();
        Ok(out)
    }

    fn max_block_samples(&self) -> usize {
        self.max_block_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_ir::SampleIndex;

    fn ramp_backend() -> FnBackend {
        let mut registry = ProgramRegistry::new();
        registry.register("ramp", |input: &ShaderInput, _: &StateSnapshot| {
            let v = input.sample.get() as f32 / 1000.0;
            (v, -v)
        });
        FnBackend::new(registry)
    }

    #[test]
    fn unknown_program_fails_to_compile() {
        let mut backend = ramp_backend();
        let err = backend.compile("nope").unwrap_err();
        assert_eq!(err, BackendError::Compile("unknown program `nope`".into()));
    }

    #[test]
    fn evaluate_before_compile_fails() {
        let mut backend = ramp_backend();
        let range = EvalRange::contiguous(SampleIndex::ZERO, 4, 48000.0);
        assert!(backend.evaluate_range(&range, &StateSnapshot::default()).is_err());
    }

    #[test]
    fn strided_evaluation_samples_sparse_positions() {
        let mut backend = ramp_backend();
        backend.compile(" ramp\n").unwrap();
        let range = EvalRange {
            start: SampleIndex::new(10),
            count: 3,
            sample_rate: 48000.0,
            stride: 100,
        };
        let out = backend.evaluate_range(&range, &StateSnapshot::default()).unwrap();
        assert_eq!(out.left(), &[0.01, 0.11, 0.21]);
        assert_eq!(out.right(), &[-0.01, -0.11, -0.21]);
    }

    #[test]
    fn output_is_clamped() {
        let mut backend = ramp_backend();
        backend.compile("ramp").unwrap();
        let range = EvalRange::contiguous(SampleIndex::new(5000), 2, 48000.0);
        let out = backend.evaluate_range(&range, &StateSnapshot::default()).unwrap();
        assert_eq!(out.left(), &[1.0, 1.0]);
        assert_eq!(out.right(), &[-1.0, -1.0]);
    }

    #[test]
    fn over_limit_request_is_rejected() {
        let mut backend = ramp_backend().with_max_block_samples(8);
        backend.compile("ramp").unwrap();
        let range = EvalRange::contiguous(SampleIndex::ZERO, 9, 48000.0);
        assert!(matches!(
            backend.evaluate_range(&range, &StateSnapshot::default()),
            Err(BackendError::Evaluation(_))
        ));
    }

    #[test]
    fn presets_are_registered() {
        let names = ProgramRegistry::with_presets().names().join(",");
        assert!(names.contains("sine"));
        assert!(names.contains("instrument"));
    }
}
