//! Metric fetcher: one monitor query per device per cycle, normalized into
//! `MetricSample`s.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::FetchError;
use crate::session::DeviceSession;

/// One normalized metric value, tagged by originating device host.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub host: String,
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Queries the session's vdom-resource monitor and extracts the four
/// normalized metrics: cpu, memory, setup_rate, sessions. A failure here is
/// scoped to this device for this cycle; the caller keeps iterating.
pub async fn fetch(session: &DeviceSession) -> Result<Vec<MetricSample>, FetchError> {
    let results = session.handle.monitor(&session.vdom).await?;
    let now = Utc::now();
    let host = session.host().to_string();

    let mut samples = Vec::with_capacity(4);
    for name in ["cpu", "memory", "setup_rate"] {
        samples.push(MetricSample {
            host: host.clone(),
            name: name.to_string(),
            value: number_field(&results, &[name])?,
            timestamp: now,
        });
    }

    // The concurrent-session count moved under `session.current_usage` after
    // FortiOS 5.6; 5.6 itself still reports the top-level `sessions`.
    let sessions = if session.handle.firmware_version().uses_nested_session_field() {
        number_field(&results, &["session", "current_usage"])?
    } else {
        number_field(&results, &["sessions"])?
    };
    samples.push(MetricSample {
        host,
        name: "sessions".to_string(),
        value: sessions,
        timestamp: now,
    });

    Ok(samples)
}

fn number_field(results: &Value, path: &[&str]) -> Result<f64, FetchError> {
    let mut cur = results;
    for part in path {
        cur = cur
            .get(part)
            .ok_or_else(|| FetchError::MissingField(path.join(".")))?;
    }
    cur.as_f64()
        .ok_or_else(|| FetchError::MissingField(path.join(".")))
}
