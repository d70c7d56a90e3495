use std::io::Write;

use flate2::write::GzEncoder;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{SendError, Sender};
use crate::config::{Compression, Config};
use crate::datum::{MetricDatum, MetricRequest};

/// Posts each sub-batch as a JSON [`MetricRequest`] to the configured endpoint.
pub struct HttpSender {
    client: Client,
    endpoint: Url,
    compression: Compression,
    headers: Vec<(String, String)>,
}

impl HttpSender {
    pub fn new(config: &Config) -> Result<Self, SendError> {
        let client = Client::builder().timeout(config.export_timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            compression: config.compression,
            headers: config.export_headers.clone(),
        })
    }

    async fn post(&self, body: String) -> Result<(), SendError> {
        let body = match self.compression {
            Compression::Gzip => compress_gzip(body.as_bytes())?,
            Compression::None => body.into_bytes(),
        };

        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", "application/json");

        if self.compression == Compression::Gzip {
            req = req.header("content-encoding", "gzip");
        }

        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        let resp = req.body(body).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SendError::Rejected {
                status: resp.status(),
            })
        }
    }
}

impl Sender for HttpSender {
    async fn send(&self, group: &str, items: Vec<MetricDatum>) -> Result<(), SendError> {
        let count = items.len();
        let body = MetricRequest::new(group, items).to_json();
        self.post(body).await?;
        debug!(group, count, "sub-batch delivered");
        Ok(())
    }
}

pub(crate) fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}
