//! # Telemetry store
//!
//! Subsystems publish into a shared [`TmStore`]. The main loop periodically hands the store to a
//! [`TmWriter`], which appends a JSON snapshot of every value to the session's telemetry file.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use comms_if::tm::{Telemetry, TmValue};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Latest value of every published key.
#[derive(Default)]
pub struct TmStore {
    values: Mutex<BTreeMap<String, TmValue>>,
}

pub struct TmWriter {
    file: BufWriter<File>,
    num_written: u64,
}

#[derive(Serialize)]
struct TmRecord<'a> {
    time_s: f64,
    values: &'a BTreeMap<String, TmValue>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TmWriterError {
    #[error("Could not open the telemetry file: {0}")]
    OpenError(std::io::Error),

    #[error("Could not serialise the telemetry: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not write the telemetry: {0}")]
    WriteError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every value currently held.
    pub fn snapshot(&self) -> BTreeMap<String, TmValue> {
        match self.values.lock() {
            Ok(v) => v.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

impl Telemetry for TmStore {
    fn put(&self, key: &str, value: TmValue) {
        let mut values = match self.values.lock() {
            Ok(v) => v,
            Err(p) => p.into_inner(),
        };
        values.insert(key.to_string(), value);
    }
}

impl TmWriter {
    /// Open the telemetry file for appending, creating it if needed.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TmWriterError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(TmWriterError::OpenError)?;

        Ok(Self {
            file: BufWriter::new(file),
            num_written: 0,
        })
    }

    pub fn num_written(&self) -> u64 {
        self.num_written
    }

    /// Append one snapshot of the store as a JSON line.
    pub fn write(&mut self, time_s: f64, store: &TmStore) -> Result<(), TmWriterError> {
        let values = store.snapshot();
        let record = TmRecord {
            time_s,
            values: &values,
        };

        serde_json::to_writer(&mut self.file, &record)
            .map_err(TmWriterError::SerializationError)?;
        self.file
            .write_all(b"\n")
            .map_err(TmWriterError::WriteError)?;
        self.file.flush().map_err(TmWriterError::WriteError)?;

        self.num_written += 1;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
