//! Traccar forwarding over the OsmAnd HTTP protocol.
//!
//! Each report becomes one `GET <url>?id=..&lat=..&lon=..&timestamp=..` request.
//! Requests run on their own task; failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::Instrument;

use super::{PositionReport, PositionSink};
use crate::error::{GatewayError, Result};

/// Default per-request timeout.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Query string sent to the OsmAnd endpoint.
///
/// Numbers are pre-formatted so the wire text has fixed precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsmAndQuery {
    pub id: String,
    pub lat: String,
    pub lon: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batt: Option<String>,
    pub valid: bool,
}

impl From<&PositionReport> for OsmAndQuery {
    fn from(report: &PositionReport) -> Self {
        Self {
            id: report.device_id.clone(),
            lat: format!("{:.6}", report.latitude),
            lon: format!("{:.6}", report.longitude),
            timestamp: report.fix_time.timestamp(),
            altitude: report.altitude,
            speed: report.speed_knots.map(|v| format!("{v:.2}")),
            bearing: report.bearing.map(|v| format!("{v:.1}")),
            accuracy: report.accuracy,
            hdop: report.pdop.map(|v| format!("{v:.1}")),
            batt: report.battery_percent.map(|v| format!("{v:.1}")),
            valid: true,
        }
    }
}

/// Sends positions to a Traccar server.
///
/// Cheap to clone; the HTTP client and URL are shared.
#[derive(Clone)]
pub struct TraccarForwarder {
    client: Client,
    url: Arc<str>,
}

impl TraccarForwarder {
    /// Create a forwarder for `url` with the given request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: Arc::from(url),
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one report and wait for the answer.
    pub async fn send(&self, report: &PositionReport) -> Result<()> {
        let response = self
            .client
            .get(&*self.url)
            .query(&OsmAndQuery::from(report))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::ForwardRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl PositionSink for TraccarForwarder {
    fn submit(&self, report: PositionReport) {
        let forwarder = self.clone();
        let span = tracing::debug_span!("forward", device = %report.device_id);

        tokio::spawn(
            async move {
                match forwarder.send(&report).await {
                    Ok(()) => tracing::debug!("position forwarded"),
                    Err(e) => tracing::warn!("Traccar forward error: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
