//! On/off operating-point metrics
//!
//! Currents and effective resistances at an off and an on gate voltage, at
//! one resolved drain bias. The current floor only guards divisions; it is
//! not a physical value.

use crate::sweep::{distinct_levels, nearest_index, resolve_bias, slice_at, Axis, SweepTable};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// On/off metrics at one drain bias
///
/// The per-gate-voltage arrays are parallel and sorted by gate voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnOffMetrics {
    /// Resolved drain bias (V)
    pub vd_ref: f64,
    /// Gate voltage levels (V)
    pub gate_v: Vec<f64>,
    /// Mean drain current per level (A)
    pub drain_i: Vec<f64>,
    /// Mean gate leakage per level (A)
    pub gate_i: Vec<f64>,
    /// `vd_ref / max(|Id|, floor)` per level (ohm)
    pub resistance: Vec<f64>,
    /// Drain current at the on point (A)
    pub ion: f64,
    /// Drain current at the off point (A)
    pub ioff: f64,
    /// On resistance (ohm)
    pub ron: f64,
    /// Off resistance (ohm)
    pub roff: f64,
    /// `|Ion| / max(Ioff, floor)`, infinite when `Ioff == 0`
    pub ratio: f64,
    /// Gate voltage actually used for the off point (V)
    pub vg_off: f64,
    /// Gate voltage actually used for the on point (V)
    pub vg_on: f64,
}

/// Compute on/off metrics
///
/// `vd_ref` of `None` selects the highest swept drain level; `vg_on` of
/// `None` selects the highest swept gate level of the whole table. The off
/// and on points are the slice levels nearest the requested gate voltages,
/// ties going to the smaller voltage.
///
/// # Errors
/// Returns `EmptyGrid` for an empty table and `EmptySlice` when no sample at
/// the resolved drain level has a numeric gate voltage
pub fn compute_on_off(
    table: &SweepTable,
    vd_ref: Option<f64>,
    vg_off: f64,
    vg_on: Option<f64>,
    tolerance: f64,
    current_floor: f64,
) -> Result<OnOffMetrics> {
    let vd_actual = resolve_bias(&distinct_levels(table, Axis::Drain), vd_ref, Axis::Drain)?;
    let vg_on = match vg_on {
        Some(vg) => vg,
        None => resolve_bias(&distinct_levels(table, Axis::Gate), None, Axis::Gate)?,
    };

    let slice = slice_at(table, vd_actual, tolerance)?;
    if slice.is_empty() {
        return Err(Error::EmptySlice { drain_v: vd_actual });
    }

    let gate_v = slice.gate_v();
    let drain_i = slice.drain_i();
    let gate_i = slice.gate_i();
    let resistance: Vec<f64> = drain_i
        .iter()
        .map(|id| vd_actual / id.abs().max(current_floor))
        .collect();

    let idx_off = nearest_index(&gate_v, vg_off).ok_or_else(|| {
        Error::InvalidInput(format!("Cannot locate off gate voltage {vg_off}"))
    })?;
    let idx_on = nearest_index(&gate_v, vg_on).ok_or_else(|| {
        Error::InvalidInput(format!("Cannot locate on gate voltage {vg_on}"))
    })?;

    let (ioff, ion) = (drain_i[idx_off], drain_i[idx_on]);
    let ratio = if ioff == 0.0 {
        f64::INFINITY
    } else {
        (ion / ioff.max(current_floor)).abs()
    };

    Ok(OnOffMetrics {
        vd_ref: vd_actual,
        ion,
        ioff,
        ron: vd_actual / ion.abs().max(current_floor),
        roff: vd_actual / ioff.abs().max(current_floor),
        ratio,
        vg_off: gate_v[idx_off],
        vg_on: gate_v[idx_on],
        gate_v,
        drain_i,
        gate_i,
        resistance,
    })
}
