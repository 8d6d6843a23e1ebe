//! Sweep table storage (Arrow)
//!
//! A sweep table holds every sample of one device file as four `Float64`
//! columns: `drain_v`, `gate_v`, `drain_i`, `gate_i`. Rows are stored in
//! load order; several drain-voltage slices may be interleaved.
//!
//! Invariant: drain voltage and drain current are finite in every row. Rows
//! that violate it are dropped on construction. Gate columns may hold NaN for
//! cells that were not numeric.
//!
//! Grids and slices are derived on demand and never stored:
//! - [`grid`]: distinct swept levels per axis, nearest-level resolution
//! - [`slice`]: current-vs-gate-voltage curve at one drain level

pub mod grid;
pub mod slice;

pub use grid::{distinct_levels, nearest_index, resolve_bias, Axis, Grid};
pub use slice::{slice_at, Slice, SlicePoint};

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, RecordBatch};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::path::Path;
use std::sync::Arc;

const DRAIN_V: usize = 0;
const GATE_V: usize = 1;
const DRAIN_I: usize = 2;
const GATE_I: usize = 3;

/// Column names in storage order
pub const COLUMN_NAMES: [&str; 4] = ["drain_v", "gate_v", "drain_i", "gate_i"];

/// One probe-station measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Drain voltage (V)
    pub drain_v: f64,
    /// Gate voltage (V)
    pub gate_v: f64,
    /// Drain current (A)
    pub drain_i: f64,
    /// Gate current (A)
    pub gate_i: f64,
}

impl Sample {
    /// Create a sample
    #[must_use]
    pub const fn new(drain_v: f64, gate_v: f64, drain_i: f64, gate_i: f64) -> Self {
        Self {
            drain_v,
            gate_v,
            drain_i,
            gate_i,
        }
    }

    /// Whether the sample may enter a sweep table
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.drain_v.is_finite() && self.drain_i.is_finite()
    }
}

/// Columnar sweep table for one device
#[derive(Debug, Clone)]
pub struct SweepTable {
    batch: RecordBatch,
}

impl Default for SweepTable {
    fn default() -> Self {
        Self::empty()
    }
}

impl SweepTable {
    /// Arrow schema shared by every sweep table
    #[must_use]
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(
            COLUMN_NAMES
                .iter()
                .map(|name| Field::new(*name, DataType::Float64, false))
                .collect::<Vec<_>>(),
        ))
    }

    /// Table with no samples ("file had no parseable rows")
    #[must_use]
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Self::schema()),
        }
    }

    /// Build a table from samples, dropping rows with non-finite drain values
    #[must_use]
    pub fn from_samples<I: IntoIterator<Item = Sample>>(samples: I) -> Self {
        let mut columns: [Vec<f64>; 4] = Default::default();
        for sample in samples.into_iter().filter(Sample::is_usable) {
            columns[DRAIN_V].push(sample.drain_v);
            columns[GATE_V].push(sample.gate_v);
            columns[DRAIN_I].push(sample.drain_i);
            columns[GATE_I].push(sample.gate_i);
        }

        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef)
            .collect();

        // Schema and column lengths are fixed above, so construction cannot fail
        RecordBatch::try_new(Self::schema(), arrays)
            .map_or_else(|_| Self::empty(), |batch| Self { batch })
    }

    /// Adopt an Arrow record batch holding the four sweep columns by name
    ///
    /// Nulls in the gate columns become NaN; rows with null or non-finite
    /// drain values are dropped.
    ///
    /// # Errors
    /// Returns error if a column is missing or is not `Float64`
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(COLUMN_NAMES.len());
        for name in COLUMN_NAMES {
            let column = batch.column_by_name(name).ok_or_else(|| {
                Error::StorageError(format!("Sweep column not found: {name}"))
            })?;
            let array = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::StorageError(format!(
                        "Sweep column {name} must be Float64, got {:?}",
                        column.data_type()
                    ))
                })?;
            columns.push(array.iter().map(|v| v.unwrap_or(f64::NAN)).collect());
        }

        let samples = (0..batch.num_rows()).map(|row| {
            Sample::new(
                columns[DRAIN_V][row],
                columns[GATE_V][row],
                columns[DRAIN_I][row],
                columns[GATE_I][row],
            )
        });
        Ok(Self::from_samples(samples))
    }

    /// Load a flattened sweep table from a Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or lacks the sweep columns
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let file = File::open(path.as_ref()).map_err(|e| {
            Error::StorageError(format!("Failed to open Parquet file: {e}"))
        })?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|builder| builder.build())
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        let Some(first) = batches.first() else {
            return Ok(Self::empty());
        };
        let combined = compute::concat_batches(&first.schema(), &batches)
            .map_err(|e| Error::StorageError(format!("Failed to combine batches: {e}")))?;
        Self::from_record_batch(&combined)
    }

    /// Write the table to a Parquet file
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use parquet::arrow::ArrowWriter;

        let file = std::fs::File::create(path.as_ref())?;
        let mut writer = ArrowWriter::try_new(file, self.batch.schema(), None)?;
        writer.write(&self.batch)?;
        writer.close()?;
        Ok(())
    }

    /// Underlying record batch
    #[must_use]
    pub const fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    /// Whether the table holds no usable samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Drain voltage column
    #[must_use]
    pub fn drain_v(&self) -> &[f64] {
        self.column(DRAIN_V)
    }

    /// Gate voltage column
    #[must_use]
    pub fn gate_v(&self) -> &[f64] {
        self.column(GATE_V)
    }

    /// Drain current column
    #[must_use]
    pub fn drain_i(&self) -> &[f64] {
        self.column(DRAIN_I)
    }

    /// Gate current column
    #[must_use]
    pub fn gate_i(&self) -> &[f64] {
        self.column(GATE_I)
    }

    /// Iterate over samples in load order
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        let (dv, gv, di, gi) = (self.drain_v(), self.gate_v(), self.drain_i(), self.gate_i());
        (0..self.len()).map(move |i| Sample::new(dv[i], gv[i], di[i], gi[i]))
    }

    /// Rows whose drain voltage lies in `[center - tolerance, center + tolerance]`
    ///
    /// # Errors
    /// Returns error if the Arrow filter kernel fails
    pub fn filter_drain_band(&self, center: f64, tolerance: f64) -> Result<Self> {
        let (low, high) = (center - tolerance, center + tolerance);
        let mask: BooleanArray = self
            .drain_v()
            .iter()
            .map(|&v| Some(v >= low && v <= high))
            .collect();

        let batch = compute::filter_record_batch(&self.batch, &mask)
            .map_err(|e| Error::StorageError(format!("Failed to apply filter: {e}")))?;
        Ok(Self { batch })
    }

    /// Curves of one current column against drain voltage, one per gate level
    ///
    /// Each curve is sorted by drain voltage. Used for output-characteristic
    /// and gate-leakage plots.
    #[must_use]
    pub fn drain_families(&self, current: Current) -> Vec<(f64, Vec<(f64, f64)>)> {
        let values = match current {
            Current::Drain => self.drain_i(),
            Current::Gate => self.gate_i(),
        };

        distinct_levels(self, Axis::Gate)
            .into_iter()
            .map(|level| {
                let mut curve: Vec<(f64, f64)> = self
                    .gate_v()
                    .iter()
                    .zip(self.drain_v().iter().zip(values))
                    .filter(|(gv, _)| **gv == level)
                    .map(|(_, (&dv, &i))| (dv, i))
                    .collect();
                curve.sort_by(|a, b| a.0.total_cmp(&b.0));
                (level, curve)
            })
            .collect()
    }

    fn column(&self, index: usize) -> &[f64] {
        self.batch
            .column(index)
            .as_any()
            .downcast_ref::<Float64Array>()
            .map_or(&[][..], |array| &array.values()[..])
    }
}

/// Current column selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Current {
    /// Drain current
    Drain,
    /// Gate (leakage) current
    Gate,
}
