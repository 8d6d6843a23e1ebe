//! Grid resolution
//!
//! The grid of a sweep table is the set of distinct drain-voltage and
//! gate-voltage levels actually swept, each sorted ascending.
//!
//! Nearest-level policy: the level minimizing `|level - target|` wins, and a
//! tie goes to the first such level in ascending order (the smaller voltage).
//! Threshold selection depends on this being reproducible.

use super::SweepTable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sweep axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Drain voltage
    Drain,
    /// Gate voltage
    Gate,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drain => write!(f, "drain-voltage"),
            Self::Gate => write!(f, "gate-voltage"),
        }
    }
}

/// Distinct swept levels of one table
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Drain-voltage levels, ascending
    pub drain: Vec<f64>,
    /// Gate-voltage levels, ascending
    pub gate: Vec<f64>,
}

impl Grid {
    /// Derive the grid of a table
    #[must_use]
    pub fn of(table: &SweepTable) -> Self {
        Self {
            drain: distinct_levels(table, Axis::Drain),
            gate: distinct_levels(table, Axis::Gate),
        }
    }
}

/// Unique values of one axis, ascending, NaN excluded
#[must_use]
pub fn distinct_levels(table: &SweepTable, axis: Axis) -> Vec<f64> {
    let column = match axis {
        Axis::Drain => table.drain_v(),
        Axis::Gate => table.gate_v(),
    };

    let mut levels: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup_by(|a, b| a == b);
    levels
}

/// Resolve a nominal bias to the nearest swept level
///
/// `None` selects the highest level.
///
/// # Errors
/// Returns `EmptyGrid` if `levels` is empty and `InvalidInput` for a NaN target
pub fn resolve_bias(levels: &[f64], target: Option<f64>, axis: Axis) -> Result<f64> {
    let Some(&highest) = levels.last() else {
        return Err(Error::EmptyGrid { axis });
    };

    match target {
        None => Ok(highest),
        Some(t) if t.is_nan() => Err(Error::InvalidInput(format!(
            "Cannot resolve a NaN {axis} target"
        ))),
        Some(t) => nearest_index(levels, t)
            .map(|i| levels[i])
            .ok_or(Error::EmptyGrid { axis }),
    }
}

/// Index of the value nearest `target`; ties go to the lowest index
///
/// NaN entries never match. Returns `None` when no entry is comparable.
#[must_use]
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let distance = (v - target).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}
