//! Look-ahead audio block scheduling.
//!
//! Keeps a sink fed with back-to-back blocks generated by the audio compute
//! context. Driven by [`AudioScheduler::tick`] once per display refresh; no
//! call here blocks except the bounded [`AudioScheduler::wait_ready`].

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ss_ir::{AudioBlock, CompileState, RequestId, SampleClock, SampleIndex, StateSnapshot, StereoBuffer};

use crate::backend::{BackendError, EvalRange};
use crate::compile::CompileTracker;
use crate::config::SessionConfig;
use crate::error::{EngineError, ErrorCallback};
use crate::playback_queue::{PlaybackQueue, ScheduledBlock};
use crate::sink::{BlockKey, OutputSink};
use crate::worker::{ComputeWorker, WorkerRequest, WorkerResponse};

const TARGET: &str = "audio";

/// Generates audio ahead of the device clock and schedules it gaplessly.
pub struct AudioScheduler<S: OutputSink> {
    look_ahead_seconds: f64,
    safety_margin_seconds: f64,
    block_seconds: f64,
    sample_rate: f64,

    worker: ComputeWorker,
    sink: S,
    compile: CompileTracker,

    /// Start of the next block to generate.
    clock: SampleClock,
    queue: PlaybackQueue,
    /// Device time at which the last scheduled block ends.
    scheduled_until: f64,
    /// Outstanding block request. At most one at a time.
    generating: Option<RequestId>,
    next_id: RequestId,
    running: bool,

    state: StateSnapshot,
    on_error: Option<ErrorCallback>,
    completed: Vec<BlockKey>,
}

impl<S: OutputSink> AudioScheduler<S> {
    /// Create a scheduler generating at the sink's sample rate.
    pub fn new(config: &SessionConfig, worker: ComputeWorker, sink: S) -> Self {
        let sample_rate = sink.sample_rate() as f64;
        Self {
            look_ahead_seconds: config.look_ahead_seconds,
            safety_margin_seconds: config.safety_margin_seconds,
            block_seconds: config.block_seconds,
            sample_rate,
            worker,
            sink,
            compile: CompileTracker::new(),
            clock: SampleClock::new(),
            queue: PlaybackQueue::new(),
            scheduled_until: 0.0,
            generating: None,
            next_id: RequestId(0),
            running: false,
            state: StateSnapshot::default(),
            on_error: None,
            completed: Vec::with_capacity(16),
        }
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    // --- Transport ---

    /// Begin playback from sample 0.
    pub fn start(&mut self) {
        self.clock.reset();
        self.scheduled_until = self.sink.now();
        // A block requested before this point belongs to the old timeline.
        self.generating = None;
        self.running = true;
        info!("{}: started at device time {:.3}s", TARGET, self.scheduled_until);
    }

    /// Stop generating and drop everything not yet played.
    pub fn stop(&mut self) {
        self.running = false;
        self.generating = None;
        self.sink.flush();
        self.queue.clear();
        info!("{}: stopped at sample {}", TARGET, self.clock.position().get());
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // --- Shader and state ---

    /// Recompile the audio context. Generation pauses until it reports back;
    /// audio already scheduled keeps playing.
    pub fn set_shader_source(&mut self, source: &str) {
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

    /// Replace the note/parameter state used for the next generated block.
    pub fn set_state(&mut self, state: StateSnapshot) {
        self.state = state;
    }

    /// Wait up to `timeout` for the pending compile to finish.
    ///
    /// On timeout the scheduler stays usable: a late compile response is
    /// still accepted on a later tick.
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
        warn!("{}: {}; continuing degraded", TARGET, err);
        self.report(err.clone());
        Err(err)
    }

    // --- Tick ---

    /// Drain responses and completions, then request another block if the
    /// look-ahead buffer is short.
    pub fn tick(&mut self) {
        self.poll();
        self.retire_completed();

        if !self.running || !self.compile.is_ready() || self.generating.is_some() {
            return;
        }
        if self.buffered_seconds() < self.look_ahead_seconds {
            self.request_block();
        }
    }

    /// Drain every response the audio context has produced.
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

    /// Apply one response from the audio context.
    pub fn accept(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Compiled { id, result } => {
                if let Some(Err(e)) = self.compile.accept(TARGET, id, result) {
                    self.report(e);
                }
            }
            WorkerResponse::Evaluated { id, range, result } => {
                if self.generating != Some(id) {
                    debug!("{}: dropping stale block response {:?}", TARGET, id);
                    return;
                }
                self.generating = None;
                self.on_block_ready(range, result);
            }
        }
    }

    fn on_block_ready(&mut self, range: EvalRange, result: Result<StereoBuffer, BackendError>) {
        let mut samples = match result {
            Ok(samples) => samples,
            Err(e) => {
                let err = EngineError::from(e);
                if matches!(err, EngineError::BackendUnavailable(_)) {
                    self.compile.disable(&err);
                }
                self.report(err);
                return;
            }
        };
        if !self.running {
            return;
        }
        if samples.frames() != range.count {
            self.report(EngineError::Evaluation(format!(
                "asked for {} samples from {}, got {}",
                range.count,
                range.start.get(),
                samples.frames()
            )));
            return;
        }
        samples.clamp();

        let count = samples.frames();
        let now = self.sink.now();
        let start_time = self.scheduled_until.max(now + self.safety_margin_seconds);
        let duration = count as f64 / self.sample_rate;

        let key = self.queue.push(ScheduledBlock {
            start_sample: range.start,
            sample_count: count,
            start_time,
            duration,
        });
        let block = AudioBlock::new(range.start, samples);
        if let Err(e) = self.sink.schedule(key, block, start_time) {
            self.queue.complete(key);
            self.report(e);
            return;
        }

        self.scheduled_until = start_time + duration;
        self.clock.advance(count);
        debug!(
            "{}: scheduled {} samples from {} at {:.3}s",
            TARGET,
            count,
            range.start.get(),
            start_time
        );
    }

    fn request_block(&mut self) {
        let wanted = (self.sample_rate * self.block_seconds).round() as usize;
        let count = wanted.min(self.worker.max_block_samples()).max(1);
        let id = self.fresh_id();
        let range = EvalRange::contiguous(self.clock.position(), count, self.sample_rate);

        match self.worker.send(WorkerRequest::Evaluate { id, range, state: self.state }) {
            Ok(()) => self.generating = Some(id),
            Err(e) => {
                self.compile.fail(&e);
                self.report(e);
            }
        }
    }

    fn retire_completed(&mut self) {
        self.sink.drain_completed(&mut self.completed);
        for key in self.completed.drain(..) {
            self.queue.complete(key);
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

    /// Start of the next block to generate.
    pub fn sample_position(&self) -> SampleIndex {
        self.clock.position()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn compile_state(&self) -> &CompileState {
        self.compile.state()
    }

    pub fn scheduled_until(&self) -> f64 {
        self.scheduled_until
    }

    /// Generated audio not yet reached by the device clock.
    pub fn buffered_seconds(&self) -> f64 {
        self.scheduled_until - self.sink.now()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.is_some()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
