//! Background compute contexts.
//!
//! A worker owns one backend instance and talks to the coordinator only
//! through request/response messages tagged with a [`RequestId`]. State is
//! copied into every request; nothing is shared.
//!
//! The inline mode runs the backend on the caller's thread at send time and
//! queues the response, which keeps offline rendering and tests
//! deterministic while exercising the same message flow.

use std::collections::VecDeque;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, warn};
use ss_ir::{RequestId, StateSnapshot, StereoBuffer};

use crate::backend::{BackendError, ComputeBackend, EvalRange};
use crate::error::EngineError;

/// Message to a compute context.
#[derive(Clone, Debug)]
pub enum WorkerRequest {
    Compile { id: RequestId, source: String },
    Evaluate { id: RequestId, range: EvalRange, state: StateSnapshot },
}

/// Message back from a compute context.
#[derive(Clone, Debug)]
pub enum WorkerResponse {
    Compiled {
        id: RequestId,
        result: Result<(), BackendError>,
    },
    Evaluated {
        id: RequestId,
        range: EvalRange,
        result: Result<StereoBuffer, BackendError>,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> RequestId {
        match self {
            WorkerResponse::Compiled { id, .. } | WorkerResponse::Evaluated { id, .. } => *id,
        }
    }
}

fn handle(backend: &mut dyn ComputeBackend, request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::Compile { id, source } => WorkerResponse::Compiled {
            id,
            result: backend.compile(&source),
        },
        WorkerRequest::Evaluate { id, range, state } => WorkerResponse::Evaluated {
            id,
            range,
            result: backend.evaluate_range(&range, &state),
        },
    }
}

enum Link {
    Threaded {
        requests: Option<Sender<WorkerRequest>>,
        responses: Receiver<WorkerResponse>,
        thread: Option<JoinHandle<()>>,
    },
    Inline {
        backend: Box<dyn ComputeBackend>,
        ready: VecDeque<WorkerResponse>,
    },
}

/// Handle to one compute context.
pub struct ComputeWorker {
    name: String,
    max_block_samples: usize,
    link: Link,
}

impl ComputeWorker {
    /// Run `backend` on a dedicated thread.
    pub fn spawn(name: &str, backend: Box<dyn ComputeBackend>) -> Result<Self, EngineError> {
        let max_block_samples = backend.max_block_samples();
        let (req_tx, req_rx) = crossbeam_channel::unbounded::<WorkerRequest>();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded::<WorkerResponse>();

        let mut backend = backend;
        let thread = std::thread::Builder::new()
            .name(format!("ss-{}", name))
            .spawn(move || {
                // Exits once the coordinator drops its sender.
                for request in req_rx {
                    if resp_tx.send(handle(backend.as_mut(), request)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| EngineError::BackendUnavailable(e.to_string()))?;

        debug!("spawned compute worker `{}`", name);
        Ok(Self {
            name: name.to_string(),
            max_block_samples,
            link: Link::Threaded {
                requests: Some(req_tx),
                responses: resp_rx,
                thread: Some(thread),
            },
        })
    }

    /// Run `backend` synchronously on the caller's thread.
    pub fn inline(name: &str, backend: Box<dyn ComputeBackend>) -> Self {
        Self {
            name: name.to_string(),
            max_block_samples: backend.max_block_samples(),
            link: Link::Inline {
                backend,
                ready: VecDeque::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend's per-call sample limit, captured at construction.
    pub fn max_block_samples(&self) -> usize {
        self.max_block_samples
    }

    /// Fire-and-forget a request.
    pub fn send(&mut self, request: WorkerRequest) -> Result<(), EngineError> {
        match &mut self.link {
            Link::Threaded { requests, .. } => requests
                .as_ref()
                .ok_or_else(|| EngineError::WorkerDisconnected(self.name.clone()))?
                .send(request)
                .map_err(|_| EngineError::WorkerDisconnected(self.name.clone())),
            Link::Inline { backend, ready } => {
                ready.push_back(handle(backend.as_mut(), request));
                Ok(())
            }
        }
    }

    /// Next response if one has arrived.
    pub fn try_recv(&mut self) -> Result<Option<WorkerResponse>, EngineError> {
        match &mut self.link {
            Link::Threaded { responses, .. } => match responses.try_recv() {
                Ok(resp) => Ok(Some(resp)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => {
                    Err(EngineError::WorkerDisconnected(self.name.clone()))
                }
            },
            Link::Inline { ready, .. } => Ok(ready.pop_front()),
        }
    }

    /// Wait up to `timeout` for the next response. `Ok(None)` on timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<WorkerResponse>, EngineError> {
        match &mut self.link {
            Link::Threaded { responses, .. } => match responses.recv_timeout(timeout) {
                Ok(resp) => Ok(Some(resp)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(EngineError::WorkerDisconnected(self.name.clone()))
                }
            },
            Link::Inline { ready, .. } => Ok(ready.pop_front()),
        }
    }
}

impl Drop for ComputeWorker {
    fn drop(&mut self) {
        if let Link::Threaded { requests, thread, .. } = &mut self.link {
            requests.take();
            if let Some(handle) = thread.take() {
                if handle.join().is_err() {
                    warn!("compute worker `{}` panicked", self.name);
                }
            }
        }
    }
}
