use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::constants::{kinds, EVENT_CHANNEL_CAPACITY, UNRESOLVED_CAPACITY};
use crate::events::AgentEvent;
use crate::protocol::capability::Init;
use crate::protocol::{Capability, Envelope, WorkerError};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(
        "Request of kind {kind} with correlation id {correlation_id} did not receive a response within {timeout:?}"
    )]
    Timeout {
        kind: String,
        correlation_id: String,
        timeout: Duration,
    },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Worker channel closed")]
    Disconnected,

    #[error("Worker failed to initialize")]
    NotReady,

    #[error("Failed to encode {kind} request: {source}")]
    Encode {
        kind: &'static str,
        source: serde_json::Error,
    },

    #[error("Failed to decode {kind} response: {source}")]
    Decode {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// Outcome of the init handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Pending,
    Ready,
    Failed,
}

struct PendingRequest {
    sender: oneshot::Sender<Result<serde_json::Value, WorkerError>>,
    kind: String,
    sent_at: Instant,
}

struct UnresolvedRequest {
    correlation_id: String,
    kind: String,
    sent_at: Instant,
}

/// Correlation state shared by every clone of the client and its receive loop.
struct Shared {
    pending: Mutex<HashMap<String, PendingRequest>>,
    /// Timed-out requests, oldest first
    unresolved: Mutex<VecDeque<UnresolvedRequest>>,
    events: broadcast::Sender<AgentEvent>,
}

impl Shared {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pending: Mutex::new(HashMap::new()),
            unresolved: Mutex::new(VecDeque::new()),
            events,
        }
    }

    fn handle_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::Response {
                correlation_id,
                response,
            } => self.complete(&correlation_id, Ok(response)),
            Envelope::Error {
                correlation_id,
                error,
            } => self.complete(&correlation_id, Err(error)),
            Envelope::Event { event } => {
                tracing::debug!("Worker event {}", event.subkind());
                // Nobody listening is fine
                let _ = self.events.send(event);
            }
            Envelope::Request { request_kind, .. } => {
                tracing::warn!("Worker sent a {} request, ignoring", request_kind);
            }
        }
    }

    /// The reply is sent while `pending` is still locked, so once an entry is
    /// gone from the map its receiver already holds the result.
    fn complete(&self, correlation_id: &str, result: Result<serde_json::Value, WorkerError>) {
        let mut pending_map = self.pending.lock();
        let removed = pending_map.remove(correlation_id);
        match removed {
            Some(pending) => {
                tracing::debug!(
                    correlation_id,
                    kind = %pending.kind,
                    elapsed_ms = pending.sent_at.elapsed().as_millis() as u64,
                    "Response received"
                );
                if pending.sender.send(result).is_err() {
                    tracing::debug!("Caller of {} went away before the reply", correlation_id);
                }
            }
            None => {
                drop(pending_map);
                self.report_unexpected(correlation_id);
            }
        }
    }

    fn report_unexpected(&self, correlation_id: &str) {
        let timed_out = {
            let mut unresolved = self.unresolved.lock();
            unresolved
                .iter()
                .position(|u| u.correlation_id == correlation_id)
                .and_then(|i| unresolved.remove(i))
        };
        match timed_out {
            Some(request) => tracing::error!(
                correlation_id,
                kind = %request.kind,
                elapsed_ms = request.sent_at.elapsed().as_millis() as u64,
                "Unexpected correlation id: reply to a timed-out request"
            ),
            None => tracing::error!(correlation_id, "Unexpected correlation id"),
        }
    }

    fn record_unresolved(&self, correlation_id: String, pending: PendingRequest) {
        let mut unresolved = self.unresolved.lock();
        if unresolved.len() >= UNRESOLVED_CAPACITY {
            unresolved.pop_front();
        }
        unresolved.push_back(UnresolvedRequest {
            correlation_id,
            kind: pending.kind,
            sent_at: pending.sent_at,
        });
    }
}

/// Drops the pending entry if the waiting future is cancelled.
struct PendingGuard<'a> {
    shared: &'a Shared,
    correlation_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending.lock().remove(&self.correlation_id);
    }
}

/// Caller-side half of the bridge.
///
/// Every request gets a fresh correlation id and resolves exactly once: with
/// the worker's reply, with the worker's error, or with a timeout. Replies
/// may arrive in any order. Events from the worker are re-broadcast to every
/// [`subscribe`](Self::subscribe)r.
#[derive(Clone)]
pub struct BridgeClient {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Envelope>,
    ready: watch::Receiver<ReadyState>,
    timeout: Duration,
}

impl BridgeClient {
    /// Start the receive loop on `inbound` and send `init` with `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        outbound: mpsc::UnboundedSender<Envelope>,
        inbound: mpsc::UnboundedReceiver<Envelope>,
        config: AgentConfig,
        timeout: Duration,
    ) -> Self {
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready) = watch::channel(ReadyState::Pending);
        tokio::spawn(receive_loop(shared.clone(), inbound));

        let client = Self {
            shared,
            outbound,
            ready,
            timeout,
        };

        let init_client = client.clone();
        tokio::spawn(async move {
            let state = match init_client.init(config).await {
                Ok(()) => {
                    tracing::info!("Worker initialized");
                    ReadyState::Ready
                }
                Err(e) => {
                    tracing::error!("Worker initialization failed: {}", e);
                    ReadyState::Failed
                }
            };
            let _ = ready_tx.send(state);
        });

        client
    }

    async fn init(&self, config: AgentConfig) -> Result<(), BridgeError> {
        let payload = serde_json::to_value(Init(config)).map_err(|source| BridgeError::Encode {
            kind: kinds::INIT,
            source,
        })?;
        self.correlate(kinds::INIT, payload).await?;
        Ok(())
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    /// Resolve once init has completed; fails with `NotReady` if it did not
    /// succeed.
    pub async fn wait_ready(&self) -> Result<(), BridgeError> {
        let mut ready = self.ready.clone();
        loop {
            let state = *ready.borrow_and_update();
            match state {
                ReadyState::Ready => return Ok(()),
                ReadyState::Failed => return Err(BridgeError::NotReady),
                ReadyState::Pending => {}
            }
            if ready.changed().await.is_err() {
                return match *ready.borrow() {
                    ReadyState::Ready => Ok(()),
                    ReadyState::Failed => Err(BridgeError::NotReady),
                    ReadyState::Pending => Err(BridgeError::Disconnected),
                };
            }
        }
    }

    /// Typed request: waits for init, sends `C::KIND` and decodes the reply.
    pub async fn invoke<C: Capability>(&self, request: C) -> Result<C::Response, BridgeError> {
        let payload = serde_json::to_value(&request).map_err(|source| BridgeError::Encode {
            kind: C::KIND,
            source,
        })?;
        let response = self.send_request(C::KIND, payload).await?;
        serde_json::from_value(response).map_err(|source| BridgeError::Decode {
            kind: C::KIND,
            source,
        })
    }

    /// Untyped request by kind. Waits for init first; the timeout starts when
    /// the request is sent.
    pub async fn send_request(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        self.wait_ready().await?;
        self.correlate(kind, payload).await
    }

    async fn correlate(
        &self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, BridgeError> {
        let correlation_id = Uuid::new_v4().to_string();
        let (sender, mut receiver) = oneshot::channel();
        self.shared.pending.lock().insert(
            correlation_id.clone(),
            PendingRequest {
                sender,
                kind: kind.to_string(),
                sent_at: Instant::now(),
            },
        );
        let _guard = PendingGuard {
            shared: &self.shared,
            correlation_id: correlation_id.clone(),
        };

        let envelope = Envelope::Request {
            correlation_id: correlation_id.clone(),
            request_kind: kind.to_string(),
            payload,
        };
        if self.outbound.send(envelope).is_err() {
            return Err(BridgeError::Disconnected);
        }
        tracing::debug!(correlation_id = %correlation_id, kind, "Request sent");

        match tokio::time::timeout(self.timeout, &mut receiver).await {
            Ok(Ok(result)) => result.map_err(BridgeError::Worker),
            Ok(Err(_)) => Err(BridgeError::Disconnected),
            Err(_) => {
                let timed_out = self.shared.pending.lock().remove(&correlation_id);
                match timed_out {
                    Some(pending) => {
                        tracing::error!(
                            correlation_id = %correlation_id,
                            kind,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Request timed out"
                        );
                        self.shared.record_unresolved(correlation_id.clone(), pending);
                        Err(BridgeError::Timeout {
                            kind: kind.to_string(),
                            correlation_id,
                            timeout: self.timeout,
                        })
                    }
                    // Completed right at the deadline; the result is already in the channel
                    None => match receiver.try_recv() {
                        Ok(result) => result.map_err(BridgeError::Worker),
                        Err(_) => Err(BridgeError::Disconnected),
                    },
                }
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.shared.events.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Timed-out requests still remembered for late-reply diagnostics.
    pub fn unresolved_count(&self) -> usize {
        self.shared.unresolved.lock().len()
    }
}

async fn receive_loop(shared: Arc<Shared>, mut inbound: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = inbound.recv().await {
        shared.handle_envelope(envelope);
    }
    tracing::info!("Worker channel closed");
    // Dropping the senders resolves every waiting caller with Disconnected
    shared.pending.lock().clear();
}
