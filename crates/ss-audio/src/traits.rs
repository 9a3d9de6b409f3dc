//! Audio device error types.

use ss_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("no audio device available")]
    NoDevice,
}

impl From<AudioError> for EngineError {
    fn from(err: AudioError) -> Self {
        EngineError::Output(err.to_string())
    }
}
