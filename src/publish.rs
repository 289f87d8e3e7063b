//! Publisher: routes fetched samples to the metric sink, re-tagged with the
//! configured device key instead of the raw host address.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::fetch::MetricSample;

/// One record on the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub device: String,
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only destination for metric records. Format and transport are the
/// sink's concern, not the daemon's.
pub trait MetricSink: Send {
    fn emit(&mut self, record: &MetricRecord) -> anyhow::Result<()>;
}

/// Writes one JSON record per line.
pub struct JsonLineSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> MetricSink for JsonLineSink<W> {
    fn emit(&mut self, record: &MetricRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct Publisher {
    sink: Box<dyn MetricSink>,
}

impl Publisher {
    pub fn new(sink: Box<dyn MetricSink>) -> Self {
        Self { sink }
    }

    /// Resolves the sample host back to its configured device key and emits
    /// the record. An unresolvable host means the registry and the live
    /// session set disagree; that is logged and the sample dropped, never an
    /// error the poll loop has to care about.
    pub fn publish(&mut self, config: &MonitorConfig, sample: &MetricSample) {
        let Some(key) = config.key_for_host(&sample.host) else {
            warn!(host = %sample.host, metric = %sample.name,
                  "host not in registry, dropping sample");
            return;
        };
        let record = MetricRecord {
            device: key.to_string(),
            name: sample.name.clone(),
            value: sample.value,
            timestamp: sample.timestamp,
        };
        match self.sink.emit(&record) {
            Ok(()) => debug!(device = %key, metric = %record.name, value = record.value, "published"),
            Err(e) => warn!(device = %key, metric = %record.name, error = %e,
                            "failed to emit metric record"),
        }
    }
}
