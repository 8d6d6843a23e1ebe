//! Per-device extraction
//!
//! Device files are named `nmos<width> pattern<pattern> chip<chip>.<ext>`.
//! One extraction runs the threshold extractor at every reference drain bias
//! and the on/off calculator at the primary bias, producing one immutable
//! [`MetricsRecord`].

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::onoff::{compute_on_off, OnOffMetrics};
use super::threshold::{extract_vth, ThresholdResult};
use crate::config::ExtractionConfig;
use crate::sweep::{distinct_levels, resolve_bias, slice_at, Axis, Slice, SweepTable};
use crate::{Error, Result};

fn identity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^nmos(\d+)\s+pattern(\d+)\s+chip(\d+)")
            .expect("device name pattern is valid")
    })
}

/// Device identity parsed from a file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    /// Transistor width parameter (`nmos<N>`)
    pub width: u32,
    /// Layout pattern (`pattern<M>`)
    pub pattern: u32,
    /// Chip number (`chip<C>`)
    pub chip: u32,
    /// Size label, `nmos<N>_pattern<M>`
    pub label: String,
    /// Source file name
    pub source_name: String,
}

impl DeviceId {
    /// Parse a device identity from a file path
    ///
    /// # Errors
    /// Returns `UnparseableIdentity` when the file stem does not start with
    /// `nmos<N> pattern<M> chip<C>` (case-insensitive)
    ///
    /// # Example
    /// ```
    /// use nmos_probe::extract::DeviceId;
    ///
    /// let id = DeviceId::parse("data/nmos5 pattern1 chip2.xls").unwrap();
    /// assert_eq!((id.width, id.pattern, id.chip), (5, 1, 2));
    /// assert_eq!(id.label, "nmos5_pattern1");
    /// assert_eq!(id.source_name, "nmos5 pattern1 chip2.xls");
    /// ```
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unparseable = || Error::UnparseableIdentity(path.display().to_string());

        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(unparseable)?;
        let caps = identity_pattern().captures(stem).ok_or_else(unparseable)?;

        let width_digits = &caps[1];
        let pattern_digits = &caps[2];
        let width = width_digits.parse().map_err(|_| unparseable())?;
        let pattern = pattern_digits.parse().map_err(|_| unparseable())?;
        let chip = caps[3].parse().map_err(|_| unparseable())?;

        Ok(Self {
            width,
            pattern,
            chip,
            label: format!("nmos{width_digits}_pattern{pattern_digits}"),
            source_name: path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
        })
    }

    /// Build an identity directly
    #[must_use]
    pub fn new(width: u32, pattern: u32, chip: u32, source_name: impl Into<String>) -> Self {
        Self {
            width,
            pattern,
            chip,
            label: format!("nmos{width}_pattern{pattern}"),
            source_name: source_name.into(),
        }
    }

    /// Batch sort key: (chip, width, pattern)
    #[must_use]
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (self.chip, self.width, self.pattern)
    }
}

/// How a device's extraction ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionStatus {
    /// Sweep table had samples; individual thresholds may still have failed
    Ok,
    /// File had no parseable rows
    EmptySweep,
    /// File could not be loaded
    LoadFailed(String),
}

impl ExtractionStatus {
    /// Short label for report columns
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Ok => "ok".to_string(),
            Self::EmptySweep => "empty".to_string(),
            Self::LoadFailed(reason) => format!("load failed: {reason}"),
        }
    }
}

/// Threshold extraction at one reference drain bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReading {
    /// Requested reference bias (V)
    pub vd_ref: f64,
    /// Resolved drain level (V), NaN when the table is empty
    pub vd_actual: f64,
    /// Extraction outcome
    pub result: ThresholdResult,
}

/// Metrics for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Device identity
    pub device: DeviceId,
    /// One reading per reference bias, in configuration order
    pub thresholds: Vec<ThresholdReading>,
    /// On/off block at the primary bias
    pub on_off: Option<OnOffMetrics>,
    /// Outcome
    pub status: ExtractionStatus,
}

impl MetricsRecord {
    /// Record for a device whose file could not be loaded
    #[must_use]
    pub fn load_failed(device: DeviceId, reference_biases: &[f64], reason: impl Into<String>) -> Self {
        Self {
            device,
            thresholds: undefined_thresholds(reference_biases),
            on_off: None,
            status: ExtractionStatus::LoadFailed(reason.into()),
        }
    }

    /// Threshold voltage at a reference bias, if extraction succeeded
    #[must_use]
    pub fn vth_at(&self, vd_ref: f64) -> Option<f64> {
        self.thresholds
            .iter()
            .find(|r| r.vd_ref == vd_ref)
            .and_then(|r| r.result.vth())
    }
}

fn undefined_thresholds(reference_biases: &[f64]) -> Vec<ThresholdReading> {
    reference_biases
        .iter()
        .map(|&vd_ref| ThresholdReading {
            vd_ref,
            vd_actual: f64::NAN,
            result: ThresholdResult::failed(),
        })
        .collect()
}

/// Resolve `vd_ref`, slice there, and extract the threshold voltage
///
/// # Errors
/// Returns `EmptyGrid` for an empty table
pub fn threshold_at(
    table: &SweepTable,
    vd_ref: f64,
    tolerance: f64,
) -> Result<(Slice, ThresholdResult)> {
    let vd_actual = resolve_bias(&distinct_levels(table, Axis::Drain), Some(vd_ref), Axis::Drain)?;
    let slice = slice_at(table, vd_actual, tolerance)?;
    let result = extract_vth(&slice);
    Ok((slice, result))
}

/// Extract all metrics for one device
///
/// An empty table is a legitimate outcome: every threshold is undefined and
/// there is no on/off block.
#[tracing::instrument(skip(device, table, config), fields(device = %device.source_name, samples = table.len()))]
pub fn extract_device(device: DeviceId, table: &SweepTable, config: &ExtractionConfig) -> MetricsRecord {
    if table.is_empty() {
        debug!("no usable samples");
        return MetricsRecord {
            device,
            thresholds: undefined_thresholds(&config.reference_biases),
            on_off: None,
            status: ExtractionStatus::EmptySweep,
        };
    }

    let thresholds = config
        .reference_biases
        .iter()
        .map(|&vd_ref| match threshold_at(table, vd_ref, config.drain_tolerance) {
            Ok((slice, result)) => {
                if !result.success {
                    debug!(vd_ref, points = slice.len(), "threshold extraction failed");
                }
                ThresholdReading {
                    vd_ref,
                    vd_actual: slice.drain_v(),
                    result,
                }
            }
            Err(e) => {
                warn!(vd_ref, error = %e, "threshold extraction skipped");
                ThresholdReading {
                    vd_ref,
                    vd_actual: f64::NAN,
                    result: ThresholdResult::failed(),
                }
            }
        })
        .collect();

    let on_off = match compute_on_off(
        table,
        config.primary_bias,
        config.vg_off,
        config.vg_on,
        config.drain_tolerance,
        config.current_floor,
    ) {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "on/off metrics unavailable");
            None
        }
    };

    MetricsRecord {
        device,
        thresholds,
        on_off,
        status: ExtractionStatus::Ok,
    }
}
