//! Workout sensor gateway client.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::SensorConfig;

/// Workout totals reported by the sensor gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkoutSummary {
    pub total_distance: f64,
    /// Distance per day, keyed by `YYYY-MM-DD`. Kept as reported so
    /// integer and fractional distances label differently.
    #[serde(default)]
    pub distance_by_day: BTreeMap<String, serde_json::Number>,
}

#[derive(Debug, Deserialize)]
struct SensorResponse {
    status: String,
    #[serde(default)]
    data: Option<WorkoutSummary>,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed sensor response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Sensor reported status '{0}'")]
    Status(String),
    #[error("Sensor response has no data")]
    MissingData,
}

/// Source of workout summaries.
pub trait WorkoutSource {
    fn read_workouts(&self) -> impl Future<Output = Result<WorkoutSummary, SensorError>> + Send;
}

/// Decode a gateway response body. Anything but `status: "ok"` is an error.
pub fn parse_response(body: &str) -> Result<WorkoutSummary, SensorError> {
    let response: SensorResponse = serde_json::from_str(body)?;

    if response.status != "ok" {
        return Err(SensorError::Status(response.status));
    }

    response.data.ok_or(SensorError::MissingData)
}

/// HTTP client for the Endomondo sensor on the local gateway.
pub struct EndomondoSensor {
    client: reqwest::Client,
    url: String,
}

impl EndomondoSensor {
    pub fn new(config: &SensorConfig) -> Result<Self, SensorError> {
        // reqwest's overall timeout covers connect plus read
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(
                config.connect_timeout_ms + config.read_timeout_ms,
            ))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl WorkoutSource for EndomondoSensor {
    async fn read_workouts(&self) -> Result<WorkoutSummary, SensorError> {
        let body = self.client.get(&self.url).send().await?.text().await?;
        parse_response(&body)
    }
}
