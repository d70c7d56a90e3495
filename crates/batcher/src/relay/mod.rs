use std::future::Future;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::batch::Batcher;
use crate::config::Config;
use crate::datum::MetricRequest;
use crate::listener;
use crate::sender::Sender;

const CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind ingest listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("ingest listener died unexpectedly")]
    ListenerDied,
}

/// Local daemon: ingest listener → channel → batcher, with a background
/// auto-flush and a final full flush on shutdown.
pub struct Relay<S: Sender> {
    batcher: Batcher<S>,
    rx: mpsc::Receiver<MetricRequest>,
    cancel: CancellationToken,
    listener_task: JoinHandle<()>,
    auto_flush_cancel: CancellationToken,
    auto_flush_task: JoinHandle<()>,
}

impl<S: Sender> Relay<S> {
    /// Bind the listener on localhost and start the listener and auto-flush tasks.
    pub async fn new(sender: S, config: &Config) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(("127.0.0.1", config.listener_port)).await?;
        Ok(Self::with_listener(sender, config, listener))
    }

    pub fn with_listener(sender: S, config: &Config, listener: TcpListener) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<MetricRequest>(CHANNEL_CAPACITY);
        let listener_task = tokio::spawn(listener::serve(listener, tx, cancel.clone()));

        let batcher = Batcher::with_item_cap(sender, config.item_cap);
        let auto_flush_cancel = CancellationToken::new();
        let auto_flush_task = batcher.launch_draining_auto_flush(
            auto_flush_cancel.clone(),
            config.flush_interval,
            None,
        );

        Self {
            batcher,
            rx,
            cancel,
            listener_task,
            auto_flush_cancel,
            auto_flush_task,
        }
    }

    pub fn batcher(&self) -> &Batcher<S> {
        &self.batcher
    }

    /// Run until `shutdown` resolves, then drain and flush everything.
    ///
    /// Returns `Err(RelayError::ListenerDied)` if the listener task exits on
    /// its own; queued data is still flushed first.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    break Ok(());
                }
                received = self.rx.recv() => match received {
                    Some(request) => self.ingest(request).await,
                    None => break Err(RelayError::ListenerDied),
                },
            }
        };
        self.shutdown().await;
        result
    }

    async fn ingest(&self, request: MetricRequest) {
        if let Err(e) = self.batcher.add_batch([request]).flush_if_filled().await {
            error!(error = %e, "flush of filled batches failed");
        }
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.listener_task).await {
            error!(error = %e, "ingest listener task panicked");
        }

        // Connection tasks may still hold senders; late posts must get 502.
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            self.batcher.add_batch([request]);
        }

        self.auto_flush_cancel.cancel();
        if let Err(e) = (&mut self.auto_flush_task).await {
            error!(error = %e, "auto flush task panicked");
        }

        match self.batcher.flush().await {
            Ok(()) => info!("final flush complete"),
            Err(e) => error!(error = %e, "final flush failed"),
        }
    }
}

#[cfg(test)]
mod tests;
