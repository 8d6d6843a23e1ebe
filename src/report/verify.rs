//! Human-readable verification dump for one device
//!
//! Prints the averaged slice at the primary bias next to the extracted
//! numbers so the arithmetic can be checked by hand.

use std::fmt;

use crate::config::ExtractionConfig;
use crate::extract::{compute_on_off, threshold_at, DeviceId};
use crate::sweep::{distinct_levels, resolve_bias, slice_at, Axis, SweepTable};

const RULE_WIDTH: usize = 60;

struct Verification<'a> {
    device: &'a DeviceId,
    table: &'a SweepTable,
    config: &'a ExtractionConfig,
}

impl Verification<'_> {
    fn raw_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels = distinct_levels(self.table, Axis::Drain);
        let slice = resolve_bias(&levels, self.config.primary_bias, Axis::Drain)
            .and_then(|vd| slice_at(self.table, vd, self.config.drain_tolerance));
        let slice = match slice {
            Ok(slice) => slice,
            Err(e) => return writeln!(f, "\n1. RAW DATA\n   ({e})"),
        };

        writeln!(f, "\n1. RAW DATA at Vd = {} V", slice.drain_v())?;
        writeln!(f, "{}", "-".repeat(50))?;
        writeln!(
            f,
            "{:<12} {:<18} {:<14} {:<14}",
            "GateV (V)", "DrainI (A)", "DrainI (uA)", "GateI (A)"
        )?;
        for p in slice.points() {
            writeln!(
                f,
                "{:<12.1} {:<18.6e} {:<14.2} {:<14.4e}",
                p.gate_v,
                p.drain_i,
                p.drain_i * 1e6,
                p.gate_i
            )?;
        }
        Ok(())
    }

    fn threshold_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n2. Vth (max-gm extrapolation)")?;
        for &vd in &self.config.reference_biases {
            match threshold_at(self.table, vd, self.config.drain_tolerance) {
                Ok((_, r)) if r.success => writeln!(
                    f,
                    "   Vd = {vd} V:  Vth = {:.4} - {:.2e}/{:.2e} = {:.4} V  (max gm at Vg={:.3}, Id={:.2} uA)",
                    r.vg_at_max_gm,
                    r.id_at_max_gm,
                    r.gm_max,
                    r.vth,
                    r.vg_at_max_gm,
                    r.id_at_max_gm * 1e6
                )?,
                _ => writeln!(f, "   Vd = {vd} V:  (failed)")?,
            }
        }
        Ok(())
    }

    fn on_off_section(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metrics = compute_on_off(
            self.table,
            self.config.primary_bias,
            self.config.vg_off,
            self.config.vg_on,
            self.config.drain_tolerance,
            self.config.current_floor,
        );
        let m = match metrics {
            Ok(m) => m,
            Err(e) => return writeln!(f, "\n3. ON/OFF\n   ({e})"),
        };

        writeln!(f, "\n3. ON/OFF at Vd = {} V", m.vd_ref)?;
        writeln!(f, "   Ion  = {:e} A   Ioff = {:e} A", m.ion, m.ioff)?;
        writeln!(f, "   Ron  = {} / |Ion|  = {:e} ohm", m.vd_ref, m.ron)?;
        writeln!(
            f,
            "   Roff = {} / |Ioff| = {:e} ohm   ratio = {:e}",
            m.vd_ref, m.roff, m.ratio
        )?;

        writeln!(
            f,
            "\n4. Sanity: Ion/Ioff should match the table above at Vg = {} / {}",
            m.vg_on, m.vg_off
        )
    }
}

impl fmt::Display for Verification<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{rule}")?;
        writeln!(f, "FILE: {}", self.device.source_name)?;
        writeln!(f, "  chip: {}  fet_size: {}", self.device.chip, self.device.label)?;
        writeln!(f, "{rule}")?;

        if self.table.is_empty() {
            return writeln!(f, "No data.");
        }
        self.raw_section(f)?;
        self.threshold_section(f)?;
        self.on_off_section(f)?;
        writeln!(f, "{rule}")
    }
}

/// Render the verification dump for one device
#[must_use]
pub fn verification_report(
    device: &DeviceId,
    table: &SweepTable,
    config: &ExtractionConfig,
) -> String {
    Verification {
        device,
        table,
        config,
    }
    .to_string()
}
