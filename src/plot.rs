//! SVG plots of one device's sweep
//!
//! Per device:
//! - `Id` vs `Vg` at every reference bias, with the max-gm tangent, the Vth
//!   marker and the max-gm point
//! - gate leakage vs drain voltage, one curve per gate level
//! - drain current vs drain voltage, one curve per gate level
//!
//! Files are named after the source file stem with spaces replaced by `_`.

use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::info;

use crate::config::ExtractionConfig;
use crate::extract::{threshold_at, DeviceId, ThresholdResult};
use crate::report::bias_label;
use crate::sweep::{Current, Slice, SweepTable};
use crate::{Error, Result};

const SIZE: (u32, u32) = (900, 640);

fn plot_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Plot(e.to_string())
}

fn file_base(device: &DeviceId, out_dir: &Path) -> PathBuf {
    let stem = Path::new(&device.source_name)
        .file_stem()
        .map_or_else(|| device.source_name.clone(), |s| s.to_string_lossy().into_owned());
    out_dir.join(stem.replace(' ', "_"))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn padded(lo: f64, hi: f64) -> Range<f64> {
    let pad = if hi > lo {
        0.05 * (hi - lo)
    } else if lo == 0.0 {
        1.0
    } else {
        0.1 * lo.abs()
    };
    (lo - pad)..(hi + pad)
}

/// Render all plots for one device into `out_dir`
///
/// Returns the written file paths.
///
/// # Errors
/// Returns `InvalidInput` for an empty table, and `Io`/`Plot` errors when a
/// file cannot be written
pub fn plot_device(
    device: &DeviceId,
    table: &SweepTable,
    config: &ExtractionConfig,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if table.is_empty() {
        return Err(Error::InvalidInput(format!(
            "{}: no usable samples",
            device.source_name
        )));
    }
    std::fs::create_dir_all(out_dir)?;

    let base = file_base(device, out_dir);
    let label = format!("{} chip{}", device.label, device.chip);
    let mut written = Vec::new();

    for &vd_ref in &config.reference_biases {
        let (slice, result) = threshold_at(table, vd_ref, config.drain_tolerance)?;
        let path = with_suffix(
            &base,
            &format!("_DrainI_vs_GateV_Vd{}_Vth.svg", bias_label(vd_ref)),
        );
        let title = format!("Id vs Vg at Vd={vd_ref} V - {label}");
        plot_transfer(&path, &title, vd_ref, &slice, &result)?;
        info!(
            path = %path.display(),
            vth = result.vth,
            success = result.success,
            "saved transfer plot"
        );
        written.push(path);
    }

    let families = [
        (Current::Gate, "GateI", "Gate current Ig (nA)", 1e9),
        (Current::Drain, "DrainI", "Drain current Id (uA)", 1e6),
    ];
    for (current, name, y_desc, scale) in families {
        let path = with_suffix(&base, &format!("_{name}_vs_DrainV.svg"));
        let title = format!("{name} vs DrainV - {label}");
        plot_family(&path, &title, y_desc, &table.drain_families(current), scale)?;
        info!(path = %path.display(), "saved family plot");
        written.push(path);
    }

    Ok(written)
}

fn plot_transfer(
    path: &Path,
    title: &str,
    vd_ref: f64,
    slice: &Slice,
    result: &ThresholdResult,
) -> Result<()> {
    let points: Vec<(f64, f64)> = slice
        .points()
        .iter()
        .map(|p| (p.gate_v, p.drain_i * 1e6))
        .collect();
    let (vg_min, vg_max) = bounds(points.iter().map(|p| p.0)).unwrap_or((0.0, 1.0));

    // Tangent runs from its zero crossing to just past the last gate level
    let tangent = result.success.then(|| {
        let x_end = vg_max + 0.2;
        [(result.vth, 0.0), (x_end, result.tangent_at(x_end) * 1e6)]
    });

    let x_lo = vg_min.min(0.0).min(tangent.map_or(f64::INFINITY, |t| t[0].0 - 0.2));
    let x_hi = tangent.map_or(vg_max, |t| t[1].0).max(x_lo + 1e-3);
    let y_hi = bounds(
        points
            .iter()
            .chain(tangent.iter().flatten())
            .map(|p| p.1),
    )
    .map_or(1.0, |(_, hi)| if hi > 0.0 { hi * 1.05 } else { 1.0 });

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(44)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Gate voltage Vg (V)")
        .y_desc("Drain current Id (uA)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))
        .map_err(plot_err)?
        .label(format!("Id at Vd={vd_ref} V"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))
        .map_err(plot_err)?;

    if let Some(tangent) = tangent {
        chart
            .draw_series(LineSeries::new(tangent, RED.stroke_width(2)))
            .map_err(plot_err)?
            .label("Tangent at max gm")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(result.vth, 0.0), (result.vth, y_hi)],
                GREEN.stroke_width(2),
            )))
            .map_err(plot_err)?
            .label(format!("Vth = {:.3} V", result.vth))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
        chart
            .draw_series(std::iter::once(Circle::new(
                (result.vg_at_max_gm, result.id_at_max_gm * 1e6),
                6,
                RED.filled(),
            )))
            .map_err(plot_err)?
            .label("Max gm point")
            .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

fn plot_family(
    path: &Path,
    title: &str,
    y_desc: &str,
    families: &[(f64, Vec<(f64, f64)>)],
    scale: f64,
) -> Result<()> {
    let curves: Vec<(f64, Vec<(f64, f64)>)> = families
        .iter()
        .map(|(vg, curve)| {
            let scaled = curve
                .iter()
                .filter(|(_, i)| i.is_finite())
                .map(|&(vd, i)| (vd, i * scale))
                .collect();
            (*vg, scaled)
        })
        .collect();

    let all = || curves.iter().flat_map(|(_, c)| c.iter());
    let x_range = match bounds(all().map(|p| p.0)) {
        Some((_, hi)) if hi > 0.0 => 0.0..hi * 1.02,
        Some((lo, hi)) => padded(lo, hi),
        None => 0.0..1.0,
    };
    let y_range = bounds(all().map(|p| p.1)).map_or(0.0..1.0, |(lo, hi)| padded(lo, hi));

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(44)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Drain voltage Vd (V)")
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    for (k, (vg, curve)) in curves.iter().enumerate() {
        let color = Palette99::pick(k).mix(0.9);
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), color.stroke_width(2)))
            .map_err(plot_err)?
            .label(format!("Vg={vg:.0} V"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.4))
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::Sample;

    fn table() -> SweepTable {
        let samples = [0.2f64, 1.0, 5.0, 10.0].into_iter().flat_map(|vd| {
            (0..=5).map(move |vg| {
                let vg = f64::from(vg);
                let id = if vg > 1.0 { 1e-5 * vd.min(vg - 1.0) } else { 0.0 };
                Sample::new(vd, vg, id, 1e-12 * vg)
            })
        });
        SweepTable::from_samples(samples)
    }

    #[test]
    fn test_plot_device_writes_all_files() {
        let out_dir = std::env::temp_dir().join(format!("nmos_probe_plot_{}", std::process::id()));
        let device = DeviceId::new(5, 1, 2, "nmos5 pattern1 chip2.xls");

        let written = plot_device(&device, &table(), &ExtractionConfig::default(), &out_dir).unwrap();
        assert_eq!(written.len(), 6);
        assert!(out_dir.join("nmos5_pattern1_chip2_DrainI_vs_GateV_Vd200mV_Vth.svg").is_file());
        assert!(out_dir.join("nmos5_pattern1_chip2_DrainI_vs_GateV_Vd10V_Vth.svg").is_file());
        assert!(out_dir.join("nmos5_pattern1_chip2_GateI_vs_DrainV.svg").is_file());
        assert!(out_dir.join("nmos5_pattern1_chip2_DrainI_vs_DrainV.svg").is_file());

        let svg = std::fs::read_to_string(&written[0]).unwrap();
        assert!(svg.contains("<svg"));

        std::fs::remove_dir_all(&out_dir).ok();
    }

    #[test]
    fn test_plot_device_rejects_empty_table() {
        let device = DeviceId::new(5, 1, 2, "nmos5 pattern1 chip2.xls");
        let result = plot_device(
            &device,
            &SweepTable::empty(),
            &ExtractionConfig::default(),
            &std::env::temp_dir(),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_bounds_skip_non_finite() {
        assert_eq!(bounds([1.0, f64::NAN, -2.0, f64::INFINITY]), Some((-2.0, 1.0)));
        assert_eq!(bounds([f64::NAN]), None);
    }
}
