#![allow(clippy::question_mark)] // nanoserde DeJson derive

use nanoserde::{DeJson, SerJson};

/// A single data point. The batching engine never looks inside it; it only
/// counts and transports it.
#[derive(Debug, Clone, PartialEq, DeJson, SerJson)]
pub struct MetricDatum {
    #[nserde(rename = "metricName")]
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[nserde(rename = "timestamp")]
    pub timestamp_ms: Option<u64>,
    #[nserde(default)]
    pub dimensions: Vec<Dimension>,
}

impl MetricDatum {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            timestamp_ms: None,
            dimensions: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, DeJson, SerJson)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Data points already grouped under a namespace, as accepted by
/// [`Batcher::add_batch`](crate::Batcher::add_batch) and carried on the wire.
#[derive(Debug, Clone, PartialEq, DeJson, SerJson)]
pub struct MetricRequest {
    #[nserde(default)]
    pub namespace: String,
    #[nserde(rename = "metricData")]
    pub metric_data: Vec<MetricDatum>,
}

impl MetricRequest {
    pub fn new(namespace: impl Into<String>, metric_data: Vec<MetricDatum>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_data,
        }
    }

    pub fn parse(body: &str) -> Result<Self, nanoserde::DeJsonErr> {
        DeJson::deserialize_json(body)
    }

    pub fn to_json(&self) -> String {
        self.serialize_json()
    }
}
