//! Compile-state tracking for one compute target.

use log::{debug, info};
use ss_ir::{CompileState, RequestId};

use crate::backend::BackendError;
use crate::error::EngineError;

/// Tracks the compile state of one compute context and correlates compile
/// responses with the most recent request.
#[derive(Debug, Default)]
pub struct CompileTracker {
    state: CompileState,
    pending: Option<RequestId>,
    disabled: Option<EngineError>,
}

impl CompileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CompileState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The error that disabled this target, if any.
    pub fn disabled(&self) -> Option<&EngineError> {
        self.disabled.as_ref()
    }

    /// A compile request `id` is about to be sent; the target is not ready
    /// until it answers. Fails with the latched error once disabled.
    pub fn begin(&mut self, id: RequestId) -> Result<(), EngineError> {
        if let Some(err) = &self.disabled {
            return Err(err.clone());
        }
        self.state = CompileState::NotReady;
        self.pending = Some(id);
        Ok(())
    }

    /// Permanently disable the target.
    pub fn disable(&mut self, err: &EngineError) {
        self.fail(err);
        self.disabled = Some(err.clone());
    }

    /// The request could not be delivered.
    pub fn fail(&mut self, err: &EngineError) {
        self.state = CompileState::Error(err.to_string());
        self.pending = None;
    }

    /// Apply a compile response. Returns `None` for a superseded response,
    /// otherwise the outcome.
    pub fn accept(
        &mut self,
        target: &str,
        id: RequestId,
        result: Result<(), BackendError>,
    ) -> Option<Result<(), EngineError>> {
        if self.pending != Some(id) {
            debug!("{}: dropping stale compile response {:?}", target, id);
            return None;
        }
        self.pending = None;
        match result {
            Ok(()) => {
                info!("{}: shader compiled", target);
                self.state = CompileState::Ready;
                Some(Ok(()))
            }
            Err(e) => {
                let err = EngineError::from(e);
                if matches!(err, EngineError::BackendUnavailable(_)) {
                    self.disable(&err);
                    return Some(Err(err));
                }
                let message = match &err {
                    EngineError::Compile(msg) => msg.clone(),
                    other => other.to_string(),
                };
                self.state = CompileState::Error(message);
                Some(Err(err))
            }
        }
    }
}
