//! Threshold voltage by maximum-transconductance linear extrapolation
//!
//! gm is the derivative of drain current with respect to gate voltage along
//! a slice. At the point of maximum gm the tangent line
//! `Id = Id0 + gm_max * (Vg - Vg0)` crosses zero current at
//! `Vth = Vg0 - Id0 / gm_max`.

use crate::sweep::Slice;
use serde::{Deserialize, Serialize};

/// Outcome of one threshold extraction
///
/// `vth` is only meaningful when `success` is true. The max-gm point fields
/// are kept on failure when they exist, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Threshold voltage (V), NaN on failure
    pub vth: f64,
    /// Gate voltage at max gm (V)
    pub vg_at_max_gm: f64,
    /// Drain current at max gm (A)
    pub id_at_max_gm: f64,
    /// Maximum transconductance (S)
    pub gm_max: f64,
    /// Whether `vth` is valid
    pub success: bool,
}

impl ThresholdResult {
    /// Failure with no max-gm point
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            vth: f64::NAN,
            vg_at_max_gm: f64::NAN,
            id_at_max_gm: f64::NAN,
            gm_max: f64::NAN,
            success: false,
        }
    }

    /// Threshold voltage if extraction succeeded
    #[must_use]
    pub fn vth(&self) -> Option<f64> {
        self.success.then_some(self.vth)
    }

    /// Drain current on the max-gm tangent line at `vg`
    #[must_use]
    pub fn tangent_at(&self, vg: f64) -> f64 {
        self.gm_max.mul_add(vg - self.vg_at_max_gm, self.id_at_max_gm)
    }
}

/// Derivative of `y` with respect to `x` on a non-uniform grid
///
/// Interior points use the second-order weighted central difference over the
/// two neighbouring spacings; the endpoints use one-sided first differences.
/// Fewer than two points yield a vector of NaN.
#[must_use]
pub fn gradient(y: &[f64], x: &[f64]) -> Vec<f64> {
    let n = y.len().min(x.len());
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let mut out = Vec::with_capacity(n);
    out.push((y[1] - y[0]) / (x[1] - x[0]));
    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        let numerator = hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1];
        out.push(numerator / (hs * hd * (hd + hs)));
    }
    out.push((y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]));
    out
}

/// Index of the largest value, ignoring NaN; first index wins ties
#[must_use]
pub fn nan_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Extract threshold voltage from a slice
///
/// Fails (`success == false`) with fewer than two points, an all-NaN gm
/// array, or a non-positive maximum gm. Never panics.
#[must_use]
pub fn extract_vth(slice: &Slice) -> ThresholdResult {
    if slice.len() < 2 {
        return ThresholdResult::failed();
    }

    let vg = slice.gate_v();
    let id = slice.drain_i();
    let gm = gradient(&id, &vg);

    let Some(idx) = nan_argmax(&gm) else {
        return ThresholdResult::failed();
    };

    let (vg0, id0, gm_max) = (vg[idx], id[idx], gm[idx]);
    if gm_max <= 0.0 {
        return ThresholdResult {
            vth: f64::NAN,
            vg_at_max_gm: vg0,
            id_at_max_gm: id0,
            gm_max,
            success: false,
        };
    }

    ThresholdResult {
        vth: vg0 - id0 / gm_max,
        vg_at_max_gm: vg0,
        id_at_max_gm: id0,
        gm_max,
        success: true,
    }
}
