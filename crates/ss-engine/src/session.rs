//! One shader playing into one sink, with waveform previews on the side.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;
use ss_ir::{CompileState, NoteState, SampleIndex, StateSnapshot, ViewKey, WaveformView};

use crate::config::{PreviewMode, SessionConfig};
use crate::error::EngineError;
use crate::note_tracker::NoteTracker;
use crate::scheduler::AudioScheduler;
use crate::sink::OutputSink;
use crate::state::StateHub;
use crate::waveform::{ViewStatus, WaveformEngine};
use crate::worker::ComputeWorker;

/// Coordinator state for one sound shader.
///
/// Owns the audio scheduler, the decimation engine and the note/parameter
/// state feeding both. Single-threaded: call [`ShaderSession::tick`] from
/// one loop (typically once per display refresh).
pub struct ShaderSession<S: OutputSink> {
    scheduler: AudioScheduler<S>,
    waveform: WaveformEngine,
    hub: StateHub,
    notes: NoteTracker,
    ready_timeout: Duration,
}

impl<S: OutputSink> ShaderSession<S> {
    pub fn new(
        config: &SessionConfig,
        audio_worker: ComputeWorker,
        waveform_worker: ComputeWorker,
        sink: S,
    ) -> Self {
        let scheduler = AudioScheduler::new(config, audio_worker, sink);
        let waveform = WaveformEngine::new(config, waveform_worker, scheduler.sample_rate());
        Self {
            scheduler,
            waveform,
            hub: StateHub::new(config.hash_interval_ticks),
            notes: NoteTracker::new(),
            ready_timeout: config.ready_timeout(),
        }
    }

    /// Route errors from both compute targets to `callback`.
    pub fn set_error_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&EngineError) + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(callback));
        let waveform = shared.clone();
        self.scheduler.set_error_callback(Box::new(move |e: &EngineError| {
            if let Ok(mut cb) = shared.lock() {
                (*cb)(e);
            }
        }));
        self.waveform.set_error_callback(Box::new(move |e: &EngineError| {
            if let Ok(mut cb) = waveform.lock() {
                (*cb)(e);
            }
        }));
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Compile `source` on both compute contexts.
    pub fn set_shader_source(&mut self, source: &str) {
        info!("shader source changed ({} bytes)", source.len());
        self.scheduler.set_shader_source(source);
        self.waveform.set_shader_source(source);
    }

    /// Wait for both contexts to finish compiling, up to the configured
    /// timeout each. The first failure is returned; the other context is
    /// still waited on.
    pub fn wait_ready(&mut self) -> Result<(), EngineError> {
        let audio = self.scheduler.wait_ready(self.ready_timeout);
        let waveform = self.waveform.wait_ready(self.ready_timeout);
        audio.and(waveform)
    }

    // --- State ---

    /// Replace the held notes wholesale. Notes pressed earlier through
    /// [`Self::note_on`] are released; the new ones keep aging and can be
    /// released or joined note by note afterwards.
    pub fn set_notes(&mut self, notes: NoteState) {
        let now = self.scheduler.sample_position();
        self.notes.replace(&notes, now, self.scheduler.sample_rate());
        self.refresh_notes();
        self.push_state();
    }

    pub fn note_on(&mut self, note: i32, velocity: f32) {
        self.notes.note_on(note, velocity, self.scheduler.sample_position());
        self.refresh_notes();
        self.push_state();
    }

    pub fn note_off(&mut self, note: i32) {
        if self.notes.note_off(note) {
            self.refresh_notes();
            self.push_state();
        }
    }

    pub fn set_param(&mut self, index: usize, value: f32) {
        self.hub.set_param(index, value);
        self.push_state();
    }

    pub fn set_preview_mode(&mut self, mode: PreviewMode) {
        self.waveform.set_preview_mode(mode);
    }

    pub fn state(&self) -> StateSnapshot {
        self.hub.snapshot()
    }

    fn refresh_notes(&mut self) {
        let now = self.scheduler.sample_position();
        let notes = self.notes.snapshot(now, self.scheduler.sample_rate());
        self.hub.set_notes(notes);
    }

    fn push_state(&mut self) {
        if self.hub.take_dirty() {
            let snapshot = self.hub.snapshot();
            self.scheduler.set_state(snapshot);
            self.waveform.set_state(snapshot);
        }
    }

    // --- Tick ---

    /// One coordinator step: refresh held-note durations, feed the sink,
    /// collect waveform results and, on the hash cadence, invalidate stale
    /// previews.
    pub fn tick(&mut self) {
        if !self.notes.is_empty() {
            self.refresh_notes();
        }
        self.push_state();
        self.scheduler.tick();
        self.waveform.poll();
        if self.hub.tick() {
            self.waveform.refresh_state_hash();
        }
    }

    // --- Views ---

    pub fn request_view(
        &mut self,
        start: SampleIndex,
        end: SampleIndex,
        width: usize,
    ) -> Result<ViewStatus, EngineError> {
        self.waveform.request_view(start, end, width)
    }

    pub fn get_cached(&self, key: &ViewKey) -> Option<Arc<WaveformView>> {
        self.waveform.get_cached(key)
    }

    /// Key a request for this window would be cached under right now.
    pub fn view_key(&self, start: SampleIndex, end: SampleIndex, width: usize) -> ViewKey {
        self.waveform.view_key(start, end, width)
    }

    // --- Inspection ---

    pub fn audio_compile_state(&self) -> &CompileState {
        self.scheduler.compile_state()
    }

    pub fn waveform_compile_state(&self) -> &CompileState {
        self.waveform.compile_state()
    }

    pub fn sample_position(&self) -> SampleIndex {
        self.scheduler.sample_position()
    }

    pub fn sample_rate(&self) -> f64 {
        self.scheduler.sample_rate()
    }

    pub fn scheduler(&self) -> &AudioScheduler<S> {
        &self.scheduler
    }

    pub fn waveform(&self) -> &WaveformEngine {
        &self.waveform
    }

    pub fn sink(&self) -> &S {
        self.scheduler.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.scheduler.sink_mut()
    }
}
