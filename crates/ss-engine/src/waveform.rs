//! Waveform preview through the decimation compute context.
//!
//! Views are requested by sample window and pixel width, evaluated sparsely
//! by a compute context separate from audio generation, reduced to per-column
//! min/max and memoized in a [`ViewCache`]. At most one evaluation is in
//! flight; a newer request supersedes it and the older response is dropped
//! when it arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use ss_ir::{CompileState, RequestId, SampleIndex, StateSnapshot, ViewKey, WaveformView};

use crate::compile::CompileTracker;
use crate::config::{PreviewMode, SessionConfig};
use crate::decimation::{reduce, DecimationPlan};
use crate::error::{EngineError, ErrorCallback};
use crate::view_cache::ViewCache;
use crate::worker::{ComputeWorker, WorkerRequest, WorkerResponse};

const TARGET: &str = "waveform";

/// Outcome of [`WaveformEngine::request_view`].
#[derive(Clone, Debug, PartialEq)]
pub enum ViewStatus {
    /// Already cached.
    Cached(Arc<WaveformView>),
    /// This exact view is being evaluated.
    Pending(RequestId),
    /// A new evaluation was issued.
    Requested(RequestId),
    /// The waveform context has no compiled shader yet.
    NotReady,
}

#[derive(Clone, Copy, Debug)]
struct PendingView {
    id: RequestId,
    key: ViewKey,
}

/// Decimation engine with its own compute context and view cache.
pub struct WaveformEngine {
    worker: ComputeWorker,
    sample_rate: f64,
    mode: PreviewMode,
    compile: CompileTracker,
    cache: ViewCache,
    pending: Option<PendingView>,
    next_id: RequestId,
    state: StateSnapshot,
    /// Hash of `state` as of the last refresh; part of every view key.
    state_hash: u64,
    on_error: Option<ErrorCallback>,
}

impl WaveformEngine {
    pub fn new(config: &SessionConfig, worker: ComputeWorker, sample_rate: f64) -> Self {
        let state = StateSnapshot::default();
        Self {
            worker,
            sample_rate,
            mode: config.preview_mode,
            compile: CompileTracker::new(),
            cache: ViewCache::new(),
            pending: None,
            next_id: RequestId(0),
            state,
            state_hash: state.hash(),
            on_error: None,
        }
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    pub fn set_preview_mode(&mut self, mode: PreviewMode) {
        if self.mode != mode {
            self.mode = mode;
            self.invalidate();
        }
    }

    // --- Shader and state ---

    /// Recompile the waveform context and drop every cached view.
    pub fn set_shader_source(&mut self, source: &str) {
        self.invalidate();
        let id = self.fresh_id();
        if let Err(e) = self.compile.begin(id) {
            debug!("{}: ignoring new source, {}", TARGET, e);
            return;
        }
        let request = WorkerRequest::Compile { id, source: source.to_string() };
        if let Err(e) = self.worker.send(request) {
            self.compile.fail(&e);
            self.report(e);
        }
    }

    /// Replace the state applied to the next evaluation.
    ///
    /// Does not touch the cache; [`Self::refresh_state_hash`] decides that on
    /// its own cadence so continuous parameter drags don't thrash it.
    pub fn set_state(&mut self, state: StateSnapshot) {
        self.state = state;
    }

    /// Rehash the current state and invalidate the cache if it changed.
    /// Returns true when the cache was invalidated.
    pub fn refresh_state_hash(&mut self) -> bool {
        let hash = self.state.hash();
        if hash == self.state_hash {
            return false;
        }
        self.state_hash = hash;
        self.invalidate();
        true
    }

    /// Clear the cache and forget the in-flight request; its response will
    /// be treated as stale.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.pending = None;
    }

    /// Wait up to `timeout` for the pending compile to finish.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(err) = self.compile.disabled() {
                return Err(err.clone());
            }
            match self.compile.state() {
                CompileState::Ready => return Ok(()),
                CompileState::Error(msg) => return Err(EngineError::Compile(msg.clone())),
                CompileState::NotReady if !self.compile.is_pending() => {
                    return Err(EngineError::Compile("no shader source set".into()));
                }
                CompileState::NotReady => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.worker.recv_timeout(remaining) {
                Ok(Some(resp)) => self.accept(resp),
                Ok(None) => break,
                Err(e) => {
                    self.report(e.clone());
                    return Err(e);
                }
            }
        }
        let err = EngineError::GenerationTimeout(timeout);
        warn!("{}: {}; previews stay blank until it compiles", TARGET, err);
        self.report(err.clone());
        Err(err)
    }

    // --- Views ---

    /// Cache key for a window under the current mode and state.
    ///
    /// Instrument previews always start at sample 0: they show how the held
    /// notes sound from onset, not the transport position.
    pub fn view_key(&self, start: SampleIndex, end: SampleIndex, width: usize) -> ViewKey {
        let (start, end) = match self.mode {
            PreviewMode::Timeline => (start, end),
            PreviewMode::Instrument => {
                let span = end.get().saturating_sub(start.get());
                (SampleIndex::ZERO, SampleIndex::new(span))
            }
        };
        ViewKey::new(start, end, width, self.state_hash)
    }

    /// Ask for the view of `[start, end)` at `width` columns.
    pub fn request_view(
        &mut self,
        start: SampleIndex,
        end: SampleIndex,
        width: usize,
    ) -> Result<ViewStatus, EngineError> {
        if width == 0 {
            return Err(EngineError::InvalidView("output width is zero".into()));
        }
        let key = self.view_key(start, end, width);

        if let Some(view) = self.cache.get(&key) {
            return Ok(ViewStatus::Cached(view));
        }
        if let Some(p) = self.pending {
            if p.key == key {
                return Ok(ViewStatus::Pending(p.id));
            }
        }
        if !self.compile.is_ready() {
            return Ok(ViewStatus::NotReady);
        }

        let plan = DecimationPlan::new(key.start, key.end, width, self.worker.max_block_samples());
        if plan.render_width == 0 {
            let view = Arc::new(WaveformView { key, columns: reduce(&Default::default(), width) });
            self.cache.put(key, view.clone());
            return Ok(ViewStatus::Cached(view));
        }

        let id = self.fresh_id();
        let request = WorkerRequest::Evaluate {
            id,
            range: plan.eval_range(self.sample_rate),
            state: self.state,
        };
        if let Some(old) = self.pending.take() {
            debug!("{}: request {:?} supersedes {:?}", TARGET, id, old.id);
        }
        self.worker.send(request)?;
        self.pending = Some(PendingView { id, key });
        debug!(
            "{}: evaluating {} samples, stride {}, for {} columns",
            TARGET, plan.render_width, plan.stride, width
        );
        Ok(ViewStatus::Requested(id))
    }

    pub fn get_cached(&self, key: &ViewKey) -> Option<Arc<WaveformView>> {
        self.cache.get(key)
    }

    /// Drain every response the waveform context has produced.
    pub fn poll(&mut self) {
        loop {
            match self.worker.try_recv() {
                Ok(Some(resp)) => self.accept(resp),
                Ok(None) => break,
                Err(e) => {
                    if !matches!(self.compile.state(), CompileState::Error(_)) {
                        self.compile.fail(&e);
                        self.report(e);
                    }
                    break;
                }
            }
        }
    }

    /// Apply one response from the waveform context. Responses that don't
    /// match the in-flight request are dropped.
    pub fn accept(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Compiled { id, result } => match self.compile.accept(TARGET, id, result) {
                Some(Ok(())) => self.invalidate(),
                Some(Err(e)) => self.report(e),
                None => {}
            },
            WorkerResponse::Evaluated { id, result, .. } => {
                let key = match self.pending {
                    Some(p) if p.id == id => p.key,
                    _ => {
                        debug!("{}: dropping stale view response {:?}", TARGET, id);
                        return;
                    }
                };
                self.pending = None;
                match result {
                    Ok(mut samples) => {
                        samples.clamp();
                        let view = WaveformView { key, columns: reduce(&samples, key.width) };
                        self.cache.put(key, Arc::new(view));
                    }
                    Err(e) => {
                        let err = EngineError::from(e);
                        if matches!(err, EngineError::BackendUnavailable(_)) {
                            self.invalidate();
                            self.compile.disable(&err);
                        }
                        self.report(err);
                    }
                }
            }
        }
    }

    fn fresh_id(&mut self) -> RequestId {
        self.next_id = self.next_id.next();
        self.next_id
    }

    fn report(&mut self, err: EngineError) {
        warn!("{}: {}", TARGET, err);
        if let Some(cb) = self.on_error.as_mut() {
            cb(&err);
        }
    }

    // --- Inspection ---

    pub fn compile_state(&self) -> &CompileState {
        self.compile.state()
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending.map(|p| p.id)
    }

    pub fn state_hash(&self) -> u64 {
        self.state_hash
    }

    pub fn preview_mode(&self) -> PreviewMode {
        self.mode
    }
}
