use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::datum::MetricDatum;
use crate::sender::{SendError, Sender};

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error("cancelled before the send started")]
    Cancelled,

    #[error("send task panicked: {0}")]
    Panicked(String),
}

/// One sub-batch that did not make it. Its items are dropped.
#[derive(Debug, Error)]
#[error("group {group:?} ({items} items): {cause}")]
pub struct SendFailure {
    pub group: String,
    pub items: usize,
    pub cause: FailureCause,
}

/// Every failed send of a flush, in completion order.
#[derive(Debug, Error)]
#[error("{} of {} sub-batch sends failed", .failures.len(), .attempted)]
pub struct FlushError {
    pub attempted: usize,
    pub failures: Vec<SendFailure>,
}

struct Dispatched {
    group: String,
    items: usize,
}

/// Fans out one task per sub-batch and joins them all.
///
/// Sends are independent: a failure never cancels its siblings. The
/// cancellation token is checked once when each task starts, so a send that
/// is already in flight always runs to completion. Dropping the coordinator
/// before [`wait`](Self::wait) aborts whatever is still outstanding.
pub struct FlushCoordinator<S: Sender> {
    sender: Arc<S>,
    cancel: CancellationToken,
    tasks: JoinSet<Result<(), FailureCause>>,
    dispatched: HashMap<Id, Dispatched>,
}

impl<S: Sender> FlushCoordinator<S> {
    pub fn new(sender: Arc<S>, cancel: CancellationToken) -> Self {
        Self {
            sender,
            cancel,
            tasks: JoinSet::new(),
            dispatched: HashMap::new(),
        }
    }

    /// Number of sends dispatched so far.
    pub fn len(&self) -> usize {
        self.dispatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty()
    }

    pub fn dispatch(&mut self, group: String, items: Vec<MetricDatum>) {
        let sender = Arc::clone(&self.sender);
        let cancel = self.cancel.clone();
        let meta = Dispatched {
            group: group.clone(),
            items: items.len(),
        };

        let handle = self.tasks.spawn(async move {
            if cancel.is_cancelled() {
                return Err(FailureCause::Cancelled);
            }
            let result = sender.send(&group, items).await;
            result.map_err(FailureCause::from)
        });
        self.dispatched.insert(handle.id(), meta);
    }

    /// Wait for every dispatched send and aggregate the failures.
    pub async fn wait(mut self) -> Result<(), FlushError> {
        let attempted = self.dispatched.len();
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let (id, cause) = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((id, Err(cause))) => (id, cause),
                Err(e) => (e.id(), FailureCause::Panicked(e.to_string())),
            };
            let Some(Dispatched { group, items }) = self.dispatched.remove(&id) else {
                continue;
            };
            warn!(group, items, error = %cause, "sub-batch send failed");
            failures.push(SendFailure {
                group,
                items,
                cause,
            });
        }

        debug!(attempted, failed = failures.len(), "flush complete");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlushError {
                attempted,
                failures,
            })
        }
    }
}
