//! Per-target compile status.

use alloc::string::String;

/// Compile status of one compute target.
///
/// Audio and waveform contexts each track their own, since their evaluation
/// harnesses differ.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CompileState {
    #[default]
    NotReady,
    Ready,
    Error(String),
}

impl CompileState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CompileState::Ready)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CompileState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
