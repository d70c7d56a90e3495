use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::Batcher;
use crate::flush::FlushError;
use crate::sender::Sender;

/// Receives the error of every failed background flush.
pub type ErrorHandler = Box<dyn FnMut(FlushError) + Send>;

/// Cancellable fixed-delay timer.
///
/// Each call to [`tick`](Self::tick) sleeps a full interval from the moment it
/// is called, so a loop of `while ticker.tick().await { work().await }` never
/// overlaps two rounds of work, however long the work takes.
#[derive(Debug, Clone)]
pub struct Ticker {
    cancel: CancellationToken,
    interval: Duration,
}

impl Ticker {
    pub fn new(cancel: CancellationToken, interval: Duration) -> Self {
        Self { cancel, interval }
    }

    /// Wait one interval. Returns `false` as soon as the token is cancelled.
    pub async fn tick(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.interval) => true,
        }
    }
}

/// Flush on every tick until `stop` fires. `sends` is handed to each flush,
/// so sub-batches not yet started when it fires are reported as cancelled.
pub(crate) async fn run<S: Sender>(
    batcher: Batcher<S>,
    stop: CancellationToken,
    sends: CancellationToken,
    interval: Duration,
    mut on_error: Option<ErrorHandler>,
) {
    debug!(?interval, "auto flush started");
    let ticker = Ticker::new(stop, interval);
    while ticker.tick().await {
        if let Err(e) = batcher.flush_with(&sends).await {
            match on_error.as_mut() {
                Some(handler) => handler(e),
                None => warn!(error = %e, "auto flush failed"),
            }
        }
    }
    debug!("auto flush stopped");
}
