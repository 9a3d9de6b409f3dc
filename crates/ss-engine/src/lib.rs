//! Sound-shader audio core.
//!
//! Keeps an output sink fed with gapless blocks evaluated by a compute
//! backend, and builds min/max waveform previews of the same signal through
//! a second, independent compute context.

mod backend;
mod compile;
pub mod config;
pub mod decimation;
mod error;
mod fn_backend;
mod note_tracker;
mod playback_queue;
pub mod presets;
mod scheduler;
mod session;
mod sink;
mod state;
mod view_cache;
mod waveform;
mod worker;

pub use backend::{BackendError, ComputeBackend, EvalRange, ShaderInput};
pub use compile::CompileTracker;
pub use config::{PreviewMode, SessionConfig};
pub use decimation::{DecimationPlan, OVERSAMPLE};
pub use error::{EngineError, ErrorCallback};
pub use fn_backend::{FnBackend, ProgramRegistry, ShaderFn};
pub use note_tracker::NoteTracker;
pub use playback_queue::{PlaybackQueue, ScheduledBlock};
pub use scheduler::AudioScheduler;
pub use session::ShaderSession;
pub use sink::{BlockKey, OutputSink};
pub use state::StateHub;
pub use view_cache::{ViewCache, VIEW_CACHE_CAPACITY};
pub use waveform::{ViewStatus, WaveformEngine};
pub use worker::{ComputeWorker, WorkerRequest, WorkerResponse};

// Re-export the value types so callers don't need ss-ir directly.
pub use ss_ir::{
    AudioBlock, ColumnMinMax, CompileState, NoteSlot, NoteState, ParameterState, RequestId,
    SampleIndex, StateSnapshot, StereoBuffer, StereoFrame, ViewKey, WaveformView,
};
