//! Slice aggregation
//!
//! A slice is the current-vs-gate-voltage curve at one resolved drain level.
//! Samples within the tolerance band are grouped by exact gate voltage and
//! averaged, so repeated gate sweeps collapse into one point per level.

use super::SweepTable;
use crate::Result;
use serde::{Deserialize, Serialize};

/// One averaged point of a slice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlicePoint {
    /// Gate voltage (V)
    pub gate_v: f64,
    /// Mean drain current (A)
    pub drain_i: f64,
    /// Mean gate current (A), NaN when no numeric gate current was recorded
    pub gate_i: f64,
}

/// Current-vs-gate-voltage curve at one drain level
///
/// Gate voltages are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    drain_v: f64,
    points: Vec<SlicePoint>,
}

impl Slice {
    /// Drain level the slice was taken at (V)
    #[must_use]
    pub const fn drain_v(&self) -> f64 {
        self.drain_v
    }

    /// Points in ascending gate-voltage order
    #[must_use]
    pub fn points(&self) -> &[SlicePoint] {
        &self.points
    }

    /// Number of gate levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no sample fell inside the band
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Gate voltages
    #[must_use]
    pub fn gate_v(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.gate_v).collect()
    }

    /// Mean drain currents
    #[must_use]
    pub fn drain_i(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.drain_i).collect()
    }

    /// Mean gate currents
    #[must_use]
    pub fn gate_i(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.gate_i).collect()
    }
}

/// Extract the slice at `drain_level`, averaging duplicates per gate level
///
/// Samples with drain voltage in `drain_level ± tolerance` are selected.
/// Samples without a numeric gate voltage are skipped. An empty band yields
/// an empty slice.
///
/// # Errors
/// Returns error if the Arrow filter kernel fails
pub fn slice_at(table: &SweepTable, drain_level: f64, tolerance: f64) -> Result<Slice> {
    let band = table.filter_drain_band(drain_level, tolerance)?;

    let mut rows: Vec<(f64, f64, f64)> = band
        .gate_v()
        .iter()
        .zip(band.drain_i())
        .zip(band.gate_i())
        .filter(|((gv, _), _)| !gv.is_nan())
        .map(|((&gv, &di), &gi)| (gv, di, gi))
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut points: Vec<SlicePoint> = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let level = rows[start].0;
        let end = rows[start..]
            .iter()
            .position(|r| r.0 != level)
            .map_or(rows.len(), |offset| start + offset);

        let group = &rows[start..end];
        points.push(SlicePoint {
            gate_v: level,
            drain_i: mean(group.iter().map(|r| r.1)),
            gate_i: mean(group.iter().map(|r| r.2).filter(|v| !v.is_nan())),
        });
        start = end;
    }

    Ok(Slice {
        drain_v: drain_level,
        points,
    })
}

/// Arithmetic mean; NaN for an empty sequence
#[allow(clippy::cast_precision_loss)]
fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
