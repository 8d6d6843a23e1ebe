//! Batch extraction and tabular reports
//!
//! A batch covers every device file in one directory. Devices are
//! independent: each is loaded and extracted on its own (in parallel with the
//! `rayon` feature) and the records are merged and sorted at the end.
//!
//! Failure policy:
//! - a file whose name is not a device name is skipped
//! - a file that cannot be loaded becomes a `LoadFailed` record
//! - an empty directory, or a format reader missing from this build, aborts
//!
//! Outputs:
//! - summary table: one row per device
//! - per-gate table: one row per (device, gate level) at the primary bias

mod verify;
mod writer;

pub use verify::verification_report;
pub use writer::{
    per_gate_record_batch, summary_record_batch, write_json, write_per_gate_csv,
    write_record_batch_parquet, write_summary_csv,
};

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ExtractionConfig;
use crate::extract::{extract_device, DeviceId, MetricsRecord};
use crate::loader::{load_sweep, SourceFormat};
use crate::{Error, Result};

/// Device files in `dir`, sorted by path
///
/// A file qualifies when its extension is a supported input format and its
/// name parses as a device identity.
///
/// # Errors
/// Returns error if the directory cannot be read
pub fn collect_device_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() || SourceFormat::from_path(&path).is_none() {
            continue;
        }
        if DeviceId::parse(&path).is_ok() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load and extract one device file
///
/// # Errors
/// Returns `UnparseableIdentity` for a non-device name and `UnsupportedFormat`
/// when the format reader is missing; other load failures are recorded on the
/// returned record
pub fn process_file(path: &Path, config: &ExtractionConfig) -> Result<MetricsRecord> {
    let device = DeviceId::parse(path)?;
    match load_sweep(path, config) {
        Ok(table) => Ok(extract_device(device, &table, config)),
        Err(e @ Error::UnsupportedFormat(_)) => Err(e),
        Err(e) => {
            warn!(file = %device.source_name, error = %e, "failed to load device file");
            Ok(MetricsRecord::load_failed(
                device,
                &config.reference_biases,
                e.to_string(),
            ))
        }
    }
}

/// Extract every device file in `dir`
///
/// # Errors
/// Returns `NoDeviceFiles` when nothing in `dir` is a device file, and
/// propagates `UnsupportedFormat`
pub fn run_batch<P: AsRef<Path>>(dir: P, config: &ExtractionConfig) -> Result<BatchReport> {
    let dir = dir.as_ref();
    let files = collect_device_files(dir)?;
    if files.is_empty() {
        return Err(Error::NoDeviceFiles(dir.to_path_buf()));
    }
    info!(files = files.len(), dir = %dir.display(), "processing device files");

    let records = extract_files(&files, config)?;
    Ok(BatchReport::new(records, config.reference_biases.clone()))
}

#[cfg(feature = "rayon")]
fn extract_files(files: &[PathBuf], config: &ExtractionConfig) -> Result<Vec<MetricsRecord>> {
    use rayon::prelude::*;

    files.par_iter().map(|f| process_file(f, config)).collect()
}

#[cfg(not(feature = "rayon"))]
fn extract_files(files: &[PathBuf], config: &ExtractionConfig) -> Result<Vec<MetricsRecord>> {
    files.iter().map(|f| process_file(f, config)).collect()
}

/// Label for a drain bias in column names: `200mV`, `1V`, `5V`, `2.5V`
#[must_use]
pub fn bias_label(volts: f64) -> String {
    if volts.abs() < 1.0 && volts != 0.0 {
        format!("{}mV", volts * 1000.0)
    } else {
        format!("{volts}V")
    }
}

/// One summary-table row
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Chip number
    pub chip: u32,
    /// Width parameter
    pub nmos: u32,
    /// Pattern number
    pub pattern: u32,
    /// Size label
    pub fet_size: String,
    /// Source file name
    pub filename: String,
    /// Threshold voltage per reference bias (undefined = `None`)
    pub vth: Vec<Option<f64>>,
    /// Resolved on/off drain bias
    pub vd_ref: Option<f64>,
    /// On current
    pub ion: Option<f64>,
    /// Off current
    pub ioff: Option<f64>,
    /// On resistance
    pub ron: Option<f64>,
    /// Off resistance
    pub roff: Option<f64>,
    /// On/off ratio
    pub ratio: Option<f64>,
    /// Extraction status label
    pub status: String,
}

/// One per-gate-table row
#[derive(Debug, Clone, PartialEq)]
pub struct PerGateRow {
    /// Chip number
    pub chip: u32,
    /// Size label
    pub fet_size: String,
    /// Gate voltage (V)
    pub gate_v: f64,
    /// Mean drain current (A)
    pub drain_i: f64,
    /// Effective resistance (ohm)
    pub resistance: f64,
    /// Mean gate current (A)
    pub gate_i: f64,
}

/// Merged results of one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    records: Vec<MetricsRecord>,
    reference_biases: Vec<f64>,
}

impl BatchReport {
    /// Sort records by (chip, width, pattern, file name) and wrap them
    #[must_use]
    pub fn new(mut records: Vec<MetricsRecord>, reference_biases: Vec<f64>) -> Self {
        records.sort_by(|a, b| {
            a.device
                .sort_key()
                .cmp(&b.device.sort_key())
                .then_with(|| a.device.source_name.cmp(&b.device.source_name))
        });
        Self {
            records,
            reference_biases,
        }
    }

    /// Device records in report order
    #[must_use]
    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no devices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Summary column names
    #[must_use]
    pub fn summary_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = ["chip", "nmos", "pattern", "fet_size", "filename"]
            .iter()
            .map(ToString::to_string)
            .collect();
        columns.extend(
            self.reference_biases
                .iter()
                .map(|&vd| format!("Vth_Vd{}", bias_label(vd))),
        );
        columns.extend(
            ["Vd_ref_V", "Ion_A", "Ioff_A", "Ron_ohm", "Roff_ohm", "Ion_Ioff_ratio", "status"]
                .iter()
                .map(ToString::to_string),
        );
        columns
    }

    /// Summary table, one row per device
    #[must_use]
    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.records
            .iter()
            .map(|record| {
                let m = record.on_off.as_ref();
                SummaryRow {
                    chip: record.device.chip,
                    nmos: record.device.width,
                    pattern: record.device.pattern,
                    fet_size: record.device.label.clone(),
                    filename: record.device.source_name.clone(),
                    vth: self
                        .reference_biases
                        .iter()
                        .map(|&vd| record.vth_at(vd))
                        .collect(),
                    vd_ref: m.map(|m| m.vd_ref),
                    ion: m.map(|m| m.ion),
                    ioff: m.map(|m| m.ioff),
                    ron: m.map(|m| m.ron),
                    roff: m.map(|m| m.roff),
                    ratio: m.map(|m| m.ratio),
                    status: record.status.label(),
                }
            })
            .collect()
    }

    /// Per-gate table sorted by (chip, size label, gate voltage)
    #[must_use]
    pub fn per_gate_rows(&self) -> Vec<PerGateRow> {
        let mut rows: Vec<PerGateRow> = self
            .records
            .iter()
            .filter_map(|record| record.on_off.as_ref().map(|m| (record, m)))
            .flat_map(|(record, m)| {
                (0..m.gate_v.len()).map(move |i| PerGateRow {
                    chip: record.device.chip,
                    fet_size: record.device.label.clone(),
                    gate_v: m.gate_v[i],
                    drain_i: m.drain_i[i],
                    resistance: m.resistance[i],
                    gate_i: m.gate_i[i],
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.chip
                .cmp(&b.chip)
                .then_with(|| a.fet_size.cmp(&b.fet_size))
                .then_with(|| a.gate_v.total_cmp(&b.gate_v))
        });
        rows
    }
}
