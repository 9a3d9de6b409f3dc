//! Error taxonomy for the audio core.
//!
//! Nothing here is fatal to the host: errors are reported through a callback
//! and logged, and the affected context degrades instead of panicking.

use std::time::Duration;

use crate::backend::BackendError;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Backend rejected the shader source. Recoverable on the next successful
    /// compile; already-scheduled audio keeps playing.
    #[error("compile error: {0}")]
    Compile(String),

    /// Required compute capability is missing. Permanent for this session.
    #[error("compute backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No readiness confirmation within the bounded wait.
    #[error("compute backend not ready after {0:?}")]
    GenerationTimeout(Duration),

    /// Backend failed to evaluate a range.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The compute context's thread is gone.
    #[error("compute worker `{0}` disconnected")]
    WorkerDisconnected(String),

    /// The output sink refused a block.
    #[error("output error: {0}")]
    Output(String),

    #[error("invalid view: {0}")]
    InvalidView(String),
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Compile(msg) => EngineError::Compile(msg),
            BackendError::Unavailable(msg) => EngineError::BackendUnavailable(msg),
            BackendError::Evaluation(msg) => EngineError::Evaluation(msg),
        }
    }
}

/// Receives errors raised on the tick cadence, outside any caller's stack.
pub type ErrorCallback = Box<dyn FnMut(&EngineError) + Send>;
