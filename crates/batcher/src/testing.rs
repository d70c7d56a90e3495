use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::datum::MetricDatum;
use crate::sender::{SendError, Sender};

/// Records every sub-batch it is handed, in the order the sends ran.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, Vec<MetricDatum>)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, Vec<MetricDatum>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sizes of every recorded sub-batch, largest first.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.sent().iter().map(|(_, items)| items.len()).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }

    /// All recorded sub-batches for `group`, ordered by the index encoded in
    /// their first datum name, concatenated.
    pub fn concatenated(&self, group: &str) -> Vec<MetricDatum> {
        let mut batches: Vec<Vec<MetricDatum>> = self
            .sent()
            .into_iter()
            .filter(|(g, _)| g == group)
            .map(|(_, items)| items)
            .collect();
        batches.sort_by_key(|items| index_of(&items[0]));
        batches.into_iter().flatten().collect()
    }
}

impl Sender for RecordingSender {
    async fn send(&self, group: &str, items: Vec<MetricDatum>) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((group.to_owned(), items));
        Ok(())
    }
}

/// Fails every send for the listed groups and records the rest.
#[derive(Default)]
pub struct FailingSender {
    pub failing_groups: HashSet<String>,
    pub delivered: RecordingSender,
    pub attempts: AtomicUsize,
}

impl FailingSender {
    pub fn failing(groups: &[&str]) -> Self {
        Self {
            failing_groups: groups.iter().map(|g| g.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Sender for FailingSender {
    async fn send(&self, group: &str, items: Vec<MetricDatum>) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_groups.contains(group) {
            return Err(SendError::Other(format!("group {group} is unavailable")));
        }
        self.delivered.send(group, items).await
    }
}

/// Takes `delay` per send before recording.
pub struct SlowSender {
    pub delay: Duration,
    pub delivered: RecordingSender,
}

impl SlowSender {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            delivered: RecordingSender::default(),
        }
    }
}

impl Sender for SlowSender {
    async fn send(&self, group: &str, items: Vec<MetricDatum>) -> Result<(), SendError> {
        tokio::time::sleep(self.delay).await;
        self.delivered.send(group, items).await
    }
}

/// Panics on every send.
pub struct PanickingSender;

impl Sender for PanickingSender {
    async fn send(&self, _group: &str, _items: Vec<MetricDatum>) -> Result<(), SendError> {
        panic!("sender blew up");
    }
}

/// `n` data points named `metric0..metric{n-1}`.
pub fn data(n: usize) -> Vec<MetricDatum> {
    data_from(0, n)
}

/// `n` data points named from `metric{start}` onwards.
pub fn data_from(start: usize, n: usize) -> Vec<MetricDatum> {
    (start..start + n)
        .map(|i| MetricDatum::new(format!("metric{i}"), i as f64))
        .collect()
}

pub fn index_of(datum: &MetricDatum) -> usize {
    datum
        .name
        .trim_start_matches("metric")
        .parse()
        .expect("datum name must be metric<N>")
}

/// Bind to port 0 and return the OS-assigned port.
/// The listener is dropped, freeing the port for the caller to rebind.
pub async fn free_port() -> u16 {
    tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn dummy_config(listener_port: u16) -> crate::config::Config {
    let _ = rustls::crypto::ring::default_provider().install_default();
    crate::config::Config {
        endpoint: url::Url::parse("http://127.0.0.1:9/v1/metrics").unwrap(),
        listener_port,
        item_cap: crate::batch::DEFAULT_ITEM_CAP,
        flush_interval: Duration::from_secs(60),
        export_timeout: Duration::from_millis(500),
        compression: crate::config::Compression::None,
        export_headers: vec![],
    }
}
