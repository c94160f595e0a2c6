//! Sport panel for the home dashboard.
//!
//! Polls the workout sensor gateway, keeps the weight history, and renders
//! the last 30 days of weight, annotated with daily distance, into a PNG
//! texture for the host to display in a pannable container.

pub mod bitmap;
pub mod config;
pub mod panel;
pub mod refresh;
pub mod scheduler;
pub mod sensor;
pub mod server;
pub mod store;
pub mod viewport;
pub mod weight;

pub use bitmap::{Rasterizer, RenderError, Texture};
pub use config::{ConfigError, PanelConfig};
pub use panel::{PanelCommand, PanelSnapshot, SportPanel};
pub use refresh::RefreshController;
pub use scheduler::{Scheduler, TokioScheduler, VirtualScheduler};
pub use sensor::{EndomondoSensor, SensorError, WorkoutSource, WorkoutSummary};
pub use store::{CsvWeightStore, Measurement, MeasurementStore, MemoryWeightStore, StoreError};
pub use viewport::{clamp_position, ScrollViewport};
pub use weight::{ChartRenderer, GraphPoints};

/// Initialize tracing with the given level. `RUST_LOG` takes precedence.
pub fn init_tracing(level: &str) -> Result<(), ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
