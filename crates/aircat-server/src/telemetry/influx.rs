//! InfluxDB backend
//!
//! Writes use the 1.x line protocol:
//! ```text
//! aircat,mac=aabbccddeeff humidity=40.5,temperature=23.1,value=12,hcho=0.02
//! ```

use super::{SinkError, TelemetryBackend};
use crate::config::TelemetryConfig;
use aircat_core::DeviceId;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const MEASUREMENT: &str = "aircat";

/// Measurement fields reported by a device.
///
/// Devices send numbers as strings; plain JSON numbers are accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct AirMeasure {
    #[serde(alias = "Humidity")]
    pub humidity: Value,
    #[serde(alias = "Temperature")]
    pub temperature: Value,
    #[serde(alias = "Value")]
    pub value: Value,
    #[serde(alias = "Hcho")]
    pub hcho: Value,
}

fn numeric_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    text.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(text)
}

/// Build the line-protocol record for a payload, or `None` if it is not a
/// complete measurement.
pub fn format_line_protocol(device_id: &DeviceId, payload: &str) -> Option<String> {
    let air: AirMeasure = serde_json::from_str(payload).ok()?;
    Some(format!(
        "{MEASUREMENT},mac={device_id} humidity={},temperature={},value={},hcho={}",
        numeric_field(&air.humidity)?,
        numeric_field(&air.temperature)?,
        numeric_field(&air.value)?,
        numeric_field(&air.hcho)?,
    ))
}

pub struct InfluxBackend {
    http: Client,
    write_url: String,
    query_url: String,
}

impl InfluxBackend {
    pub fn new(addr: &str, config: &TelemetryConfig) -> Result<Self, SinkError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            write_url: format!("http://{addr}/write?db={}", config.influxdb_db),
            query_url: format!("http://{addr}/query?db={}", config.influxdb_db),
        })
    }
}

/// True when an InfluxDB query response carries at least one series.
fn has_series(body: &[u8]) -> bool {
    let Ok(doc) = serde_json::from_slice::<Value>(body) else {
        return false;
    };
    doc["results"]
        .as_array()
        .map(|results| {
            results.iter().any(|r| {
                r["series"]
                    .as_array()
                    .is_some_and(|series| !series.is_empty())
            })
        })
        .unwrap_or(false)
}

#[async_trait]
impl TelemetryBackend for InfluxBackend {
    async fn write(&self, device_id: &DeviceId, payload: &str) -> Result<(), SinkError> {
        let line = format_line_protocol(device_id, payload)
            .ok_or_else(|| SinkError::InvalidMeasurement(payload.to_string()))?;

        let resp = self.http.post(&self.write_url).body(line).send().await?;
        if !resp.status().is_success() {
            return Err(SinkError::Status(resp.status()));
        }
        Ok(())
    }

    async fn query_latest(&self, device_id: &DeviceId) -> Result<Vec<u8>, SinkError> {
        let query = format!("q=select last(*) from {MEASUREMENT} where mac='{device_id}'");
        let resp = self
            .http
            .post(&self.query_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SinkError::Status(resp.status()));
        }

        let body = resp.bytes().await?.to_vec();
        if !has_series(&body) {
            debug!(device_id = %device_id, "No series for device");
            return Err(SinkError::NotFound);
        }
        Ok(body)
    }
}
