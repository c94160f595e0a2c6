//! Configuration for the sport panel.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Complete panel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Workout sensor gateway
    pub sensor: SensorConfig,

    /// Poll timing
    pub refresh: RefreshConfig,

    /// Weight graph layout
    pub chart: ChartConfig,

    /// Pannable container geometry
    pub viewport: ViewportConfig,

    /// Weight history location
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl PanelConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chart = &self.chart;

        if !chart.y_min.is_finite() || !chart.y_max.is_finite() {
            return Err(ConfigError::Validation(format!(
                "chart: y_min and y_max must be finite, got {} and {}",
                chart.y_min, chart.y_max
            )));
        }
        if chart.y_min >= chart.y_max {
            return Err(ConfigError::Validation(format!(
                "chart: y_min ({}) must be below y_max ({})",
                chart.y_min, chart.y_max
            )));
        }
        if !chart.annotation_y.is_finite() {
            return Err(ConfigError::Validation(
                "chart: annotation_y must be finite".to_string(),
            ));
        }
        if chart.show_last_days == 0 || chart.px_per_day == 0 || chart.major_tick_days == 0 {
            return Err(ConfigError::Validation(
                "chart: show_last_days, px_per_day and major_tick_days must be at least 1"
                    .to_string(),
            ));
        }
        if chart.show_last_days.checked_mul(chart.px_per_day).is_none() {
            return Err(ConfigError::Validation(format!(
                "chart: {} days at {} px per day is too wide",
                chart.show_last_days, chart.px_per_day
            )));
        }

        if self.refresh.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "refresh: poll_interval_ms must be at least 1".to_string(),
            ));
        }

        let viewport = &self.viewport;
        if !viewport.margin.is_finite() || !viewport.width.is_finite() || viewport.width < 0.0 {
            return Err(ConfigError::Validation(format!(
                "viewport: margin ({}) and width ({}) must be finite, width not negative",
                viewport.margin, viewport.width
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Endpoint returning the workout summary
    pub url: String,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Time allowed for the response after connecting, in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:10100/sensors/endomondo/read".to_string(),
            connect_timeout_ms: 50,
            read_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay before the first poll
    pub first_poll_delay_ms: u64,

    /// Interval between regular polls
    pub poll_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            first_poll_delay_ms: 1000,
            poll_interval_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Number of days shown, ending today
    pub show_last_days: u32,

    /// Horizontal pixels per day
    pub px_per_day: u32,

    /// Lower bound of the weight axis
    pub y_min: f64,

    /// Upper bound of the weight axis
    pub y_max: f64,

    /// Weight-axis position of the distance annotations
    pub annotation_y: f64,

    /// Days between labelled date ticks
    pub major_tick_days: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            show_last_days: 30,
            px_per_day: 15,
            y_min: 75.0,
            y_max: 95.0,
            annotation_y: 76.0,
            major_tick_days: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Fixed left margin the chart may not scroll past
    pub margin: f64,

    /// Visible width of the pannable container
    pub width: f64,

    /// Height of the container, also the rendered chart height
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            margin: -20.0,
            width: 300.0,
            height: 240,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// CSV file holding the weight history
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("weights.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
