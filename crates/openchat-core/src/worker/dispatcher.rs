use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::agent::OpenChatAgent;
use super::dispatch_table::DispatchTable;
use super::identity::{resolve_identity, IdentityProvider};
use crate::config::AgentConfig;
use crate::constants::kinds;
use crate::events::AgentEvent;
use crate::protocol::{Envelope, WorkerError};
use crate::services::ServiceCaller;
use crate::store::UserCache;

/// Worker side of the bridge: receives request envelopes, routes them to the
/// agent and posts back exactly one response or error per handled request.
///
/// Requests run concurrently, so replies may leave in a different order than
/// requests arrived.
pub struct WorkerDispatcher {
    identity_provider: Arc<dyn IdentityProvider>,
    caller: Arc<dyn ServiceCaller>,
    data_dir: Option<PathBuf>,
    table: Arc<DispatchTable>,
    agent: Option<Arc<OpenChatAgent>>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl WorkerDispatcher {
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        caller: Arc<dyn ServiceCaller>,
        outbound: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            identity_provider,
            caller,
            data_dir: None,
            table: Arc::new(DispatchTable::for_agent()),
            agent: None,
            outbound,
        }
    }

    /// Persist the user cache under `data_dir` instead of keeping it in memory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.agent.is_some()
    }

    /// Run on the current thread with a dedicated Tokio runtime until the
    /// inbound channel closes or `shutdown` fires.
    pub fn run_blocking(
        self,
        inbound: mpsc::UnboundedReceiver<Envelope>,
        shutdown: oneshot::Receiver<()>,
    ) {
        let rt = match Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to create worker runtime: {}", e);
                return;
            }
        };
        rt.block_on(self.run(inbound, shutdown));
    }

    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        tracing::info!("Worker dispatcher started");
        loop {
            tokio::select! {
                envelope = inbound.recv() => match envelope {
                    Some(envelope) => self.handle_message(envelope).await,
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }
        tracing::info!("Worker dispatcher stopped");
    }

    pub async fn handle_message(&mut self, envelope: Envelope) {
        let (correlation_id, request_kind, payload) = match envelope {
            Envelope::Request {
                correlation_id,
                request_kind,
                payload,
            } => (correlation_id, request_kind, payload),
            other => {
                tracing::debug!("Ignoring {} envelope sent to the worker", other.kind());
                return;
            }
        };

        if request_kind == kinds::INIT {
            self.handle_init(correlation_id, payload).await;
            return;
        }

        let Some(handler) = self.table.get(&request_kind) else {
            tracing::debug!(
                correlation_id = %correlation_id,
                kind = %request_kind,
                "Unknown request kind, ignoring"
            );
            return;
        };

        let Some(agent) = self.agent.clone() else {
            tracing::warn!(
                correlation_id = %correlation_id,
                kind = %request_kind,
                "Request received before init"
            );
            self.send(Envelope::Error {
                correlation_id,
                error: WorkerError::AgentNotInitialized,
            });
            return;
        };

        let work = handler(agent, payload);
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Internal {
                    message: format!("{} handler panicked", request_kind),
                }),
            };
            let envelope = match result {
                Ok(response) => Envelope::Response {
                    correlation_id,
                    response,
                },
                Err(error) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        kind = %request_kind,
                        "Request failed: {}",
                        error
                    );
                    Envelope::Error {
                        correlation_id,
                        error,
                    }
                }
            };
            if outbound.send(envelope).is_err() {
                tracing::debug!("Bridge client gone, dropping {} reply", request_kind);
            }
        });
    }

    async fn handle_init(&mut self, correlation_id: String, payload: serde_json::Value) {
        let config: AgentConfig = match serde_json::from_value(payload) {
            Ok(config) => config,
            Err(e) => {
                self.send(Envelope::Error {
                    correlation_id,
                    error: WorkerError::InvalidPayload {
                        request_kind: kinds::INIT.to_string(),
                        message: e.to_string(),
                    },
                });
                return;
            }
        };

        if self.agent.is_some() {
            tracing::info!("Agent already initialized, keeping the existing one");
            self.send(Envelope::Response {
                correlation_id,
                response: serde_json::Value::Null,
            });
            return;
        }

        let identity = match resolve_identity(self.identity_provider.as_ref()).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                // Left unanswered: the caller's init times out.
                tracing::warn!(
                    correlation_id = %correlation_id,
                    "Init requested without a signed-in identity"
                );
                return;
            }
            Err(e) => {
                self.send(Envelope::Error {
                    correlation_id,
                    error: WorkerError::Internal {
                        message: e.to_string(),
                    },
                });
                return;
            }
        };

        let user_cache = match &self.data_dir {
            Some(dir) => UserCache::open(dir),
            None => UserCache::in_memory(),
        };
        tracing::info!(
            "Initializing agent for {} ({} cached users)",
            identity.principal(),
            user_cache.len()
        );

        let agent = Arc::new(OpenChatAgent::new(
            config,
            identity,
            self.caller.clone(),
            user_cache,
        ));
        forward_events(agent.subscribe(), self.outbound.clone());
        self.agent = Some(agent);

        self.send(Envelope::Response {
            correlation_id,
            response: serde_json::Value::Null,
        });
    }

    fn send(&self, envelope: Envelope) {
        if self.outbound.send(envelope).is_err() {
            tracing::debug!("Bridge client gone, dropping reply");
        }
    }
}

/// Relay agent events to the bridge as event envelopes until either side closes.
fn forward_events(
    mut events: broadcast::Receiver<AgentEvent>,
    outbound: mpsc::UnboundedSender<Envelope>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::debug!("Forwarding {} event", event.subkind());
                    if outbound.send(Envelope::Event { event }).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event forwarder lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
