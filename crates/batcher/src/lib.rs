//! Client-side batching for metric ingestion endpoints that cap the number of
//! data points per request.
//!
//! Producers [`add`](Batcher::add) data points under a group key. Full
//! sub-batches go out with [`flush_if_filled`](Batcher::flush_if_filled);
//! everything goes out with [`flush`](Batcher::flush) or on the interval set
//! by [`launch_auto_flush`](Batcher::launch_auto_flush). Every sub-batch is one
//! concurrent [`Sender::send`] call.

pub mod auto_flush;
pub mod batch;
pub mod config;
pub mod datum;
pub mod flush;
pub mod listener;
pub mod queue;
pub mod relay;
pub mod sender;
pub mod table;

#[cfg(test)]
mod testing;

pub use auto_flush::{ErrorHandler, Ticker};
pub use batch::{Batcher, DEFAULT_ITEM_CAP};
pub use datum::{Dimension, MetricDatum, MetricRequest};
pub use flush::{FailureCause, FlushError, SendFailure};
pub use sender::{HttpSender, SendError, Sender};
