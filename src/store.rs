//! Weight measurement history.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Timestamp layout used in the CSV history.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Weight history I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed weight record: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One recorded body weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub dt: NaiveDateTime,
    pub value: f64,
}

impl Measurement {
    pub fn new(dt: NaiveDateTime, value: f64) -> Self {
        Self { dt, value }
    }

    /// Calendar day the measurement belongs to.
    pub fn date(&self) -> NaiveDate {
        self.dt.date()
    }
}

/// Time-series store of weight measurements.
///
/// `get_weights` returns measurements in the store's iteration order; when
/// several fall on the same day, consumers keep the last one.
pub trait MeasurementStore {
    /// All measurements taken at or after `since`.
    fn get_weights(&self, since: NaiveDateTime) -> Result<Vec<Measurement>, StoreError>;

    /// Record `value` as measured now.
    fn add_weight(&mut self, value: f64) -> Result<(), StoreError>;
}

// ============================================================================
// CSV-backed store
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
struct CsvRecord {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Weight")]
    weight: f64,
}

/// Weight history kept in a CSV file with a `Timestamp,Weight` header.
///
/// A missing file is an empty history; the first write creates it.
#[derive(Debug, Clone)]
pub struct CsvWeightStore {
    path: PathBuf,
}

impl CsvWeightStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole history, sorted chronologically (oldest first).
    pub fn read_all(&self) -> Result<Vec<Measurement>, StoreError> {
        if !self.path.exists() {
            debug!("No weight history at {}", self.path.display());
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let mut rdr = csv::Reader::from_reader(file);

        let mut readings = Vec::new();

        for result in rdr.deserialize() {
            let record: CsvRecord = result?;
            let dt = NaiveDateTime::parse_from_str(&record.timestamp, TIMESTAMP_FORMAT).map_err(
                |source| StoreError::Timestamp {
                    value: record.timestamp.clone(),
                    source,
                },
            )?;

            readings.push(Measurement::new(dt, record.weight));
        }

        // Stable, so rows sharing a timestamp keep their file order
        readings.sort_by_key(|m| m.dt);

        Ok(readings)
    }

    /// Append a measurement taken at `dt`.
    pub fn append(&self, dt: NaiveDateTime, value: f64) -> Result<(), StoreError> {
        let has_header = self
            .path
            .metadata()
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!has_header)
            .from_writer(file);

        wtr.serialize(CsvRecord {
            timestamp: dt.format(TIMESTAMP_FORMAT).to_string(),
            weight: value,
        })?;
        wtr.flush()?;

        Ok(())
    }
}

impl MeasurementStore for CsvWeightStore {
    fn get_weights(&self, since: NaiveDateTime) -> Result<Vec<Measurement>, StoreError> {
        let mut readings = self.read_all()?;
        readings.retain(|m| m.dt >= since);
        Ok(readings)
    }

    fn add_weight(&mut self, value: f64) -> Result<(), StoreError> {
        self.append(Local::now().naive_local(), value)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Weight history held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryWeightStore {
    records: Vec<Measurement>,
}

impl MemoryWeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measurements(records: Vec<Measurement>) -> Self {
        Self { records }
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.records
    }
}

impl MeasurementStore for MemoryWeightStore {
    fn get_weights(&self, since: NaiveDateTime) -> Result<Vec<Measurement>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|m| m.dt >= since)
            .cloned()
            .collect())
    }

    fn add_weight(&mut self, value: f64) -> Result<(), StoreError> {
        self.records
            .push(Measurement::new(Local::now().naive_local(), value));
        Ok(())
    }
}
