use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

use crate::bridge::BridgeClient;
use crate::config::CoreConfig;
use crate::protocol::Envelope;
use crate::services::ServiceCaller;
use crate::worker::{IdentityProvider, WorkerDispatcher};

/// Runs the worker on its own thread and hands out bridge clients to it.
pub struct CoreRuntime {
    client: BridgeClient,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl CoreRuntime {
    /// Spawn the worker thread and send it `init` with `config.agent`.
    ///
    /// Must be called from within a Tokio runtime; the worker gets its own.
    pub fn start(
        config: CoreConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        caller: Arc<dyn ServiceCaller>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let (to_worker_tx, to_worker_rx) = mpsc::unbounded_channel::<Envelope>();
        let (from_worker_tx, from_worker_rx) = mpsc::unbounded_channel::<Envelope>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let dispatcher = WorkerDispatcher::new(identity_provider, caller, from_worker_tx)
            .with_data_dir(config.data_dir.clone());
        let worker_handle = std::thread::Builder::new()
            .name("openchat-worker".to_string())
            .spawn(move || {
                dispatcher.run_blocking(to_worker_rx, shutdown_rx);
            })?;

        let client = BridgeClient::connect(
            to_worker_tx,
            from_worker_rx,
            config.agent,
            config.request_timeout,
        );

        Ok(Self {
            client,
            shutdown_tx: Some(shutdown_tx),
            worker_handle: Some(worker_handle),
        })
    }

    pub fn client(&self) -> BridgeClient {
        self.client.clone()
    }

    /// Stop the worker and wait for its thread. Outstanding requests resolve
    /// with `Disconnected`.
    pub fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(worker_handle) = self.worker_handle.take() {
            if worker_handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
    }
}

impl Drop for CoreRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
