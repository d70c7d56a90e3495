pub(crate) mod http;

pub use http::HttpSender;

use std::future::Future;

use thiserror::Error;

use crate::datum::MetricDatum;

/// One outbound ingestion request carrying a single sub-batch.
///
/// The engine only distinguishes success from failure; an `Err` means the
/// items in that call are lost unless the caller retries them.
pub trait Sender: Send + Sync + 'static {
    fn send(
        &self,
        group: &str,
        items: Vec<MetricDatum>,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint rejected payload: {status}")]
    Rejected { status: reqwest::StatusCode },

    #[error("gzip compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
