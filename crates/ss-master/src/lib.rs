//! Headless controller for soundshader.
//!
//! Owns a shader source and its note/parameter state, plays it through the
//! default audio device on a coordinator thread, and renders it offline to
//! frames, WAV bytes or waveform previews.

mod wav;

use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use ss_audio::{CpalOutput, OfflineSink};
use ss_engine::{
    AudioScheduler, ComputeWorker, FnBackend, OutputSink, ShaderSession, StateSnapshot, ViewStatus,
    WaveformEngine,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// Re-export common types so callers don't need ss-engine directly.
pub use ss_engine::{
    presets, ColumnMinMax, CompileState, EngineError, NoteSlot, NoteState, ParameterState,
    PreviewMode, ProgramRegistry, SampleIndex, SessionConfig, StereoFrame, ViewKey, WaveformView,
};

pub use wav::{frames_to_wav, write_wav, WavFormat};

/// Coordinator tick period, roughly one display refresh.
const TICK: Duration = Duration::from_millis(16);

/// Offline clock step between scheduler ticks.
const OFFLINE_STEP_SECONDS: f64 = 0.01;

enum Command {
    SetSource(String),
    SetNotes(NoteState),
    NoteOn(i32, f32),
    NoteOff(i32),
    SetParam(usize, f32),
    WatchView { start: SampleIndex, end: SampleIndex, width: usize },
}

/// Headless shader controller.
pub struct Controller {
    config: SessionConfig,
    registry: ProgramRegistry,
    source: String,
    notes: NoteState,
    params: ParameterState,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    commands: Sender<Command>,
    stop_signal: Arc<AtomicBool>,
    sample_position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    errors: Receiver<EngineError>,
    views: Receiver<Arc<WaveformView>>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_registry(config, ProgramRegistry::with_presets())
    }

    /// Use `registry` as the set of compilable programs.
    pub fn with_registry(config: SessionConfig, registry: ProgramRegistry) -> Self {
        Self {
            config,
            registry,
            source: presets::SINE.to_string(),
            notes: NoteState::empty(),
            params: ParameterState::new(),
            playback: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn programs(&self) -> Vec<&str> {
        self.registry.names()
    }

    // --- Shader and state ---

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
        self.send(Command::SetSource(self.source.clone()));
    }

    pub fn set_notes(&mut self, notes: NoteState) {
        self.notes = notes;
        self.send(Command::SetNotes(notes));
    }

    /// Live note input; only meaningful while playing.
    pub fn note_on(&mut self, note: i32, velocity: f32) {
        self.send(Command::NoteOn(note, velocity));
    }

    pub fn note_off(&mut self, note: i32) {
        self.send(Command::NoteOff(note));
    }

    pub fn set_param(&mut self, index: usize, value: f32) {
        self.params = self.params.with_value(index, value);
        self.send(Command::SetParam(index, value));
    }

    fn state(&self) -> StateSnapshot {
        StateSnapshot::new(self.notes, self.params)
    }

    fn backend(&self) -> Box<FnBackend> {
        Box::new(FnBackend::new(self.registry.clone()))
    }

    fn send(&self, command: Command) {
        if let Some(pb) = &self.playback {
            // A closed channel means the thread already exited.
            let _ = pb.commands.send(command);
        }
    }

    // --- Real-time playback ---

    /// Start playing on the default device. Returns once the shader has
    /// compiled, or with the error that kept playback from starting. A
    /// readiness timeout is not fatal: playback starts degraded.
    pub fn play(&mut self) -> Result<(), EngineError> {
        self.stop();

        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let (view_tx, view_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let sample_position = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let ctx = ThreadContext {
            config: self.config.clone(),
            audio_backend: self.backend(),
            waveform_backend: self.backend(),
            source: self.source.clone(),
            notes: self.notes,
            params: self.params,
            commands: cmd_rx,
            errors: err_tx,
            views: view_tx,
            ready: ready_tx,
            stop_signal: stop_signal.clone(),
            sample_position: sample_position.clone(),
            finished: finished.clone(),
        };

        let thread = std::thread::Builder::new()
            .name("ss-coordinator".into())
            .spawn(move || coordinator_thread(ctx))
            .map_err(|e| EngineError::BackendUnavailable(e.to_string()))?;

        self.playback = Some(PlaybackHandle {
            commands: cmd_tx,
            stop_signal,
            sample_position,
            finished,
            errors: err_rx,
            views: view_rx,
            thread: Some(thread),
        });

        // Two bounded waits (audio then waveform) plus device setup.
        let limit = self.config.ready_timeout() * 2 + Duration::from_secs(2);
        let outcome = match ready_rx.recv_timeout(limit) {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::GenerationTimeout(limit)),
        };
        if outcome.is_err() {
            self.stop();
        }
        outcome
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    warn!("coordinator thread panicked");
                }
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    /// Next sample to be generated.
    pub fn position(&self) -> Option<SampleIndex> {
        let pb = self.playback.as_ref()?;
        Some(SampleIndex::new(pb.sample_position.load(Ordering::Relaxed)))
    }

    /// Errors reported since the last call.
    pub fn take_errors(&self) -> Vec<EngineError> {
        self.playback
            .as_ref()
            .map(|p| p.errors.try_iter().collect())
            .unwrap_or_default()
    }

    /// Keep the preview of `[start, end)` at `width` columns up to date.
    /// Each new rendering of it shows up in [`Self::latest_view`].
    pub fn watch_view(&mut self, start: SampleIndex, end: SampleIndex, width: usize) {
        self.send(Command::WatchView { start, end, width });
    }

    /// Newest view delivered since the last call.
    pub fn latest_view(&self) -> Option<Arc<WaveformView>> {
        self.playback.as_ref()?.views.try_iter().last()
    }

    // --- Offline rendering ---

    /// Render `seconds` of audio through an offline sink.
    pub fn render_frames(&self, seconds: f64) -> Result<Vec<StereoFrame>, EngineError> {
        // Offline time has no jitter to absorb
        let config = SessionConfig { safety_margin_seconds: 0.0, ..self.config.clone() };
        let sample_rate = config.sample_rate;
        let worker = ComputeWorker::inline("audio", self.backend());
        let mut scheduler = AudioScheduler::new(&config, worker, OfflineSink::new(sample_rate));
        scheduler.set_state(self.state());
        scheduler.set_shader_source(&self.source);
        scheduler.wait_ready(config.ready_timeout())?;
        scheduler.start();

        let total = (seconds.max(0.0) * sample_rate as f64).round() as u64;
        let step = ((sample_rate as f64 * OFFLINE_STEP_SECONDS) as u64).max(1);
        while scheduler.sink().position() < total {
            // The inline worker answers on the following tick
            for _ in 0..4 {
                scheduler.tick();
            }
            if let CompileState::Error(msg) = scheduler.compile_state() {
                return Err(EngineError::Compile(msg.clone()));
            }
            let frames = step.min(total - scheduler.sink().position());
            scheduler.sink_mut().advance(frames as usize);
        }
        scheduler.stop();
        info!("rendered {} frames offline", total);
        Ok(scheduler.sink_mut().take_output())
    }

    pub fn render_to_wav(&self, seconds: f64, format: WavFormat) -> Result<Vec<u8>, EngineError> {
        let frames = self.render_frames(seconds)?;
        wav::frames_to_wav(&frames, self.config.sample_rate, format).map_err(|e| EngineError::Output(e.to_string()))
    }

    /// Compute one waveform preview synchronously.
    pub fn preview(
        &self,
        start: SampleIndex,
        end: SampleIndex,
        width: usize,
    ) -> Result<Arc<WaveformView>, EngineError> {
        let worker = ComputeWorker::inline("waveform", self.backend());
        let mut engine = WaveformEngine::new(&self.config, worker, self.config.sample_rate as f64);
        engine.set_state(self.state());
        engine.refresh_state_hash();
        engine.set_shader_source(&self.source);
        engine.wait_ready(self.config.ready_timeout())?;

        match engine.request_view(start, end, width)? {
            ViewStatus::Cached(view) => Ok(view),
            ViewStatus::NotReady => Err(EngineError::Compile("waveform context not ready".into())),
            ViewStatus::Pending(_) | ViewStatus::Requested(_) => {
                engine.poll();
                engine
                    .get_cached(&engine.view_key(start, end, width))
                    .ok_or_else(|| EngineError::Evaluation("preview evaluation failed".into()))
            }
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ThreadContext {
    config: SessionConfig,
    audio_backend: Box<FnBackend>,
    waveform_backend: Box<FnBackend>,
    source: String,
    notes: NoteState,
    params: ParameterState,
    commands: Receiver<Command>,
    errors: Sender<EngineError>,
    views: Sender<Arc<WaveformView>>,
    ready: Sender<Result<(), EngineError>>,
    stop_signal: Arc<AtomicBool>,
    sample_position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

fn coordinator_thread(ctx: ThreadContext) {
    let ThreadContext {
        config,
        audio_backend,
        waveform_backend,
        source,
        notes,
        params,
        commands,
        errors,
        views,
        ready,
        stop_signal,
        sample_position,
        finished,
    } = ctx;
    let fail = |err: EngineError| {
        warn!("playback failed to start: {}", err);
        let _ = ready.send(Err(err));
        finished.store(true, Ordering::Relaxed);
    };

    // The CPAL stream is not Send, so the sink is built on this thread.
    let output = match CpalOutput::open() {
        Ok(output) => output,
        Err(e) => return fail(e.into()),
    };
    let workers = ComputeWorker::spawn("audio", audio_backend)
        .and_then(|audio| Ok((audio, ComputeWorker::spawn("waveform", waveform_backend)?)));
    let (audio, waveform) = match workers {
        Ok(pair) => pair,
        Err(e) => return fail(e),
    };

    let mut session = ShaderSession::new(&config, audio, waveform, output);
    let reporter = errors.clone();
    session.set_error_callback(move |e: &EngineError| {
        let _ = reporter.send(e.clone());
    });
    for (index, &value) in params.values().iter().enumerate() {
        if value != 0.0 {
            session.set_param(index, value);
        }
    }
    session.set_notes(notes);
    session.set_shader_source(&source);

    match session.wait_ready() {
        Ok(()) | Err(EngineError::GenerationTimeout(_)) => {}
        Err(e) => return fail(e),
    }
    session.start();
    let _ = ready.send(Ok(()));
    info!("playing at {} Hz", session.sink().sample_rate());

    let mut watched: Option<(SampleIndex, SampleIndex, usize)> = None;
    let mut delivered: Option<ViewKey> = None;

    while !stop_signal.load(Ordering::Relaxed) {
        for command in commands.try_iter() {
            match command {
                Command::SetSource(source) => session.set_shader_source(&source),
                Command::SetNotes(notes) => session.set_notes(notes),
                Command::NoteOn(note, velocity) => session.note_on(note, velocity),
                Command::NoteOff(note) => session.note_off(note),
                Command::SetParam(index, value) => session.set_param(index, value),
                Command::WatchView { start, end, width } => {
                    watched = Some((start, end, width));
                    delivered = None;
                }
            }
        }

        session.tick();
        sample_position.store(session.sample_position().get(), Ordering::Relaxed);

        // Re-requesting is cheap: a pending key is not reissued, and after
        // an invalidation this picks the view back up.
        if let Some((start, end, width)) = watched {
            match session.request_view(start, end, width) {
                Ok(ViewStatus::Cached(view)) if delivered != Some(view.key) => {
                    delivered = Some(view.key);
                    let _ = views.send(view);
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = errors.send(e);
                    watched = None;
                }
            }
        }

        std::thread::sleep(TICK);
    }

    session.stop();
    finished.store(true, Ordering::Relaxed);
    info!("playback stopped");
}
