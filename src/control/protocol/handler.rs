//! Outbound request correlation
//!
//! [`ProtocolHandler`] owns the pending-request table. Each outbound request is
//! registered under a fresh id before it is written, and is completed exactly
//! once: by its matching response, by its deadline, by the caller's
//! cancellation, or by disposal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::types::identifiers::RequestId;

use super::messages::{ControlRequestEnvelope, ControlResponsePayload};

/// Pending request awaiting response
struct PendingRequest {
    /// Completion channel
    response_tx: oneshot::Sender<Result<serde_json::Value>>,
    /// Request subtype, for logging
    subtype: String,
    /// When the request was registered
    issued_at: Instant,
}

/// A registered request waiting for its outcome
pub struct PendingResponse {
    request_id: RequestId,
    response_rx: oneshot::Receiver<Result<serde_json::Value>>,
}

impl PendingResponse {
    /// Id the request was registered under
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

/// Correlates outbound control requests with inbound responses
pub struct ProtocolHandler {
    /// Request sequence counter
    next_request_id: AtomicU64,
    /// Requests awaiting responses
    pending_requests: Mutex<HashMap<RequestId, PendingRequest>>,
    /// Set once disposal has failed every pending request
    closed: AtomicBool,
}

impl ProtocolHandler {
    /// Create an empty correlator
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            pending_requests: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Generate the next request id
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        RequestId::generate(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a request and build its envelope
    ///
    /// The entry exists before the caller writes the envelope, so a response
    /// arriving immediately after the write always finds it.
    ///
    /// # Errors
    /// Returns `AgentError::Cancelled` once the correlator has been closed
    pub fn register(
        &self,
        body: serde_json::Value,
    ) -> Result<(ControlRequestEnvelope, PendingResponse)> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AgentError::cancelled("router disposed"));
        }

        let subtype = body
            .get("subtype")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let request_id = self.next_id();
        let (response_tx, response_rx) = oneshot::channel();

        self.pending_requests.lock().insert(
            request_id.clone(),
            PendingRequest {
                response_tx,
                subtype,
                issued_at: Instant::now(),
            },
        );

        Ok((
            ControlRequestEnvelope::new(request_id.clone(), body),
            PendingResponse {
                request_id,
                response_rx,
            },
        ))
    }

    /// Wait for a registered request to complete
    ///
    /// # Errors
    /// - `AgentError::ControlRequestFailed` when the peer answers with an error
    /// - `AgentError::ControlTimeout` naming the request id when `timeout` elapses
    /// - `AgentError::Cancelled` when `cancel` fires or the router is disposed
    pub async fn wait(
        &self,
        pending: PendingResponse,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<serde_json::Value> {
        let PendingResponse {
            request_id,
            response_rx,
        } = pending;
        let caller_cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            outcome = response_rx => match outcome {
                Ok(result) => result,
                Err(_) => Err(AgentError::cancelled(format!(
                    "control request {request_id} abandoned"
                ))),
            },
            () = tokio::time::sleep(timeout) => {
                self.forget(&request_id);
                warn!("control request {request_id} timed out after {timeout:?}");
                Err(AgentError::control_timeout(request_id.as_str(), timeout))
            }
            () = caller_cancelled => {
                self.forget(&request_id);
                debug!("control request {request_id} cancelled by caller");
                Err(AgentError::cancelled(format!(
                    "control request {request_id} cancelled"
                )))
            }
        }
    }

    /// Complete the pending request a response names
    ///
    /// Returns `false` when no request is pending under that id, which happens
    /// for late responses to timed-out requests and for ids never issued.
    pub fn handle_response(&self, payload: ControlResponsePayload) -> bool {
        let Some(pending) = self.pending_requests.lock().remove(&payload.request_id) else {
            debug!(
                "dropping control response for unknown request {}",
                payload.request_id
            );
            return false;
        };

        debug!(
            "{} request {} answered after {:?}",
            pending.subtype,
            payload.request_id,
            pending.issued_at.elapsed()
        );
        let request_id = payload.request_id.clone();
        let outcome = payload
            .into_result()
            .map_err(|message| AgentError::control_failed(request_id.as_str(), message));
        // Receiver may already be gone if the caller stopped waiting
        let _ = pending.response_tx.send(outcome);
        true
    }

    /// Drop a pending entry without completing it
    pub fn forget(&self, request_id: &RequestId) -> bool {
        self.pending_requests.lock().remove(request_id).is_some()
    }

    /// Fail every pending request and refuse new ones
    ///
    /// Returns the number of requests failed.
    pub fn close(&self, reason: &str) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<(RequestId, PendingRequest)> =
            self.pending_requests.lock().drain().collect();
        let count = drained.len();
        for (request_id, pending) in drained {
            let _ = pending.response_tx.send(Err(AgentError::cancelled(format!(
                "control request {request_id} failed: {reason}"
            ))));
        }
        count
    }

    /// Number of requests awaiting a response
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_requests.lock().len()
    }

    /// Whether [`close`](Self::close) has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}
