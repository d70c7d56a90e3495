use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auto_flush::{self, ErrorHandler};
use crate::datum::{MetricDatum, MetricRequest};
use crate::flush::{FlushCoordinator, FlushError};
use crate::sender::{SendError, Sender};
use crate::table::GroupTable;

/// Largest number of data points a single outbound request may carry.
pub const DEFAULT_ITEM_CAP: NonZeroUsize = NonZeroUsize::new(20).unwrap();

/// Accumulates data points per group and flushes them in capped sub-batches.
///
/// Cheap to clone; clones share the same table and sender. The table lock is
/// a `std::sync::Mutex` held only for in-memory pushes and drains, never
/// across a send.
pub struct Batcher<S: Sender> {
    table: Arc<Mutex<GroupTable<MetricDatum>>>,
    sender: Arc<S>,
}

impl<S: Sender> Clone for Batcher<S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<S: Sender> Batcher<S> {
    pub fn new(sender: S) -> Self {
        Self::with_item_cap(sender, DEFAULT_ITEM_CAP)
    }

    pub fn with_item_cap(sender: S, item_cap: NonZeroUsize) -> Self {
        Self {
            table: Arc::new(Mutex::new(GroupTable::new(item_cap))),
            sender: Arc::new(sender),
        }
    }

    pub fn item_cap(&self) -> NonZeroUsize {
        self.table().item_cap()
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Items currently queued for `group`.
    pub fn pending(&self, group: &str) -> usize {
        self.table().pending(group)
    }

    /// Queue `items` under `group`. Never performs I/O.
    pub fn add<I>(&self, group: &str, items: I) -> &Self
    where
        I: IntoIterator<Item = MetricDatum>,
    {
        self.table().insert(group, items);
        self
    }

    /// Queue several pre-grouped payloads under one lock acquisition.
    pub fn add_batch<I>(&self, requests: I) -> &Self
    where
        I: IntoIterator<Item = MetricRequest>,
    {
        let mut table = self.table();
        for req in requests {
            table.insert(&req.namespace, req.metric_data);
        }
        self
    }

    /// Send every full-size sub-batch, leaving smaller remainders queued.
    pub async fn flush_if_filled(&self) -> Result<(), FlushError> {
        self.flush_if_filled_with(&CancellationToken::new()).await
    }

    pub async fn flush_if_filled_with(&self, cancel: &CancellationToken) -> Result<(), FlushError> {
        let batches = self.table().drain_filled();
        self.dispatch(batches, cancel).await
    }

    /// Send everything queued, emptying the table.
    pub async fn flush(&self) -> Result<(), FlushError> {
        self.flush_with(&CancellationToken::new()).await
    }

    pub async fn flush_with(&self, cancel: &CancellationToken) -> Result<(), FlushError> {
        let batches = self.table().drain_all();
        self.dispatch(batches, cancel).await
    }

    /// Spawn a task that fully flushes every `interval` until `cancel` fires.
    ///
    /// Errors go to `on_error`; without a handler they are logged and dropped.
    pub fn launch_auto_flush(
        &self,
        cancel: CancellationToken,
        interval: Duration,
        on_error: Option<ErrorHandler>,
    ) -> JoinHandle<()> {
        let sends = cancel.clone();
        tokio::spawn(auto_flush::run(self.clone(), cancel, sends, interval, on_error))
    }

    /// Like [`launch_auto_flush`](Self::launch_auto_flush), but `stop` only
    /// ends the ticking: a flush already in progress sends every sub-batch it
    /// drained before the task exits.
    pub fn launch_draining_auto_flush(
        &self,
        stop: CancellationToken,
        interval: Duration,
        on_error: Option<ErrorHandler>,
    ) -> JoinHandle<()> {
        let sends = CancellationToken::new();
        tokio::spawn(auto_flush::run(self.clone(), stop, sends, interval, on_error))
    }

    async fn dispatch(
        &self,
        batches: Vec<(String, Vec<MetricDatum>)>,
        cancel: &CancellationToken,
    ) -> Result<(), FlushError> {
        if batches.is_empty() {
            return Ok(());
        }
        let mut coordinator = FlushCoordinator::new(Arc::clone(&self.sender), cancel.clone());
        for (group, items) in batches {
            coordinator.dispatch(group, items);
        }
        coordinator.wait().await
    }

    fn table(&self) -> MutexGuard<'_, GroupTable<MetricDatum>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sending through a batcher only queues; delivery happens on a later flush.
impl<S: Sender> Sender for Batcher<S> {
    async fn send(&self, group: &str, items: Vec<MetricDatum>) -> Result<(), SendError> {
        self.add(group, items);
        Ok(())
    }
}
