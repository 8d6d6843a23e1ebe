//! nmos-probe command-line interface.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nmos_probe::config::ExtractionConfig;
use nmos_probe::extract::{DeviceId, ExtractionStatus};
use nmos_probe::loader::load_sweep;
use nmos_probe::report::{
    per_gate_record_batch, run_batch, summary_record_batch, verification_report, write_json,
    write_per_gate_csv, write_record_batch_parquet, write_summary_csv,
};

/// nmos-probe - NMOS characterization from probe-station sweeps
///
/// Extracts threshold voltage and on/off metrics from I-V sweep exports.
#[derive(Parser)]
#[command(name = "nmos-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metrics for every device file in a directory
    Extract {
        /// Directory holding `nmos* pattern* chip*` files
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Summary CSV (one row per device), relative to --dir
        #[arg(long, default_value = "nmos_summary.csv")]
        out: PathBuf,

        /// Per-gate-voltage CSV, relative to --dir
        #[arg(long, default_value = "nmos_summary_per_gate_voltage.csv")]
        out_per_vg: PathBuf,

        /// Also write both tables as Parquet next to the CSV files
        #[arg(long)]
        parquet: bool,

        /// Also write full device records as JSON, relative to --dir
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Drain bias for on/off metrics (V)
        #[arg(long)]
        vd_ref: Option<f64>,

        /// Off-state gate voltage (V)
        #[arg(long)]
        vg_off: Option<f64>,

        /// On-state gate voltage (V), default: highest swept level
        #[arg(long)]
        vg_on: Option<f64>,

        /// JSON extraction configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Plot one device file
    Plot {
        /// Device file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory, default: next to the input file
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Plot every device file in a directory
    PlotAll {
        /// Directory holding `nmos* pattern* chip*` files
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Output directory, default: next to each input file
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print raw data and computed metrics for one file
    Verify {
        /// Device file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// JSON extraction configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract {
            dir,
            out,
            out_per_vg,
            parquet,
            json,
            vd_ref,
            vg_off,
            vg_on,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if vd_ref.is_some() {
                config.primary_bias = vd_ref;
            }
            if let Some(vg) = vg_off {
                config.vg_off = vg;
            }
            if vg_on.is_some() {
                config.vg_on = vg_on;
            }
            config.validate()?;
            let json = json.map(|path| resolve_in(&dir, &path));
            extract(
                &dir,
                &resolve_in(&dir, &out),
                &resolve_in(&dir, &out_per_vg),
                parquet,
                json.as_deref(),
                &config,
            )
        }
        Commands::Plot { file, out_dir } => {
            plot(&file, &plot_output_dir(&file, out_dir.as_deref()))
        }
        Commands::PlotAll { dir, out_dir } => plot_all(&dir, out_dir.as_deref()),
        Commands::Verify { file, config } => verify(&file, &load_config(config.as_deref())?),
    }
}

fn load_config(path: Option<&Path>) -> Result<ExtractionConfig> {
    path.map_or_else(
        || Ok(ExtractionConfig::default()),
        |p| {
            ExtractionConfig::from_json_file(p)
                .with_context(|| format!("Failed to load config: {}", p.display()))
        },
    )
}

/// Output paths are taken relative to the scanned directory unless absolute
fn resolve_in(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

/// Explicit output directory, else the directory of the input file
fn plot_output_dir(file: &Path, out_dir: Option<&Path>) -> PathBuf {
    out_dir.map_or_else(
        || match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
        Path::to_path_buf,
    )
}

fn extract(
    dir: &Path,
    out: &Path,
    out_per_vg: &Path,
    parquet: bool,
    json: Option<&Path>,
    config: &ExtractionConfig,
) -> Result<()> {
    let report = run_batch(dir, config)
        .with_context(|| format!("Batch extraction failed in {}", dir.display()))?;

    let failed = report
        .records()
        .iter()
        .filter(|r| matches!(r.status, ExtractionStatus::LoadFailed(_)))
        .count();
    if failed > 0 {
        warn!(failed, "some device files could not be loaded");
    }

    write_summary_csv(&report, out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(devices = report.len(), path = %out.display(), "wrote summary");
    write_per_gate_csv(&report, out_per_vg)
        .with_context(|| format!("Failed to write {}", out_per_vg.display()))?;
    info!(path = %out_per_vg.display(), "wrote per-gate table");

    if parquet {
        let summary = out.with_extension("parquet");
        write_record_batch_parquet(&summary_record_batch(&report)?, &summary)
            .with_context(|| format!("Failed to write {}", summary.display()))?;
        let per_gate = out_per_vg.with_extension("parquet");
        write_record_batch_parquet(&per_gate_record_batch(&report)?, &per_gate)
            .with_context(|| format!("Failed to write {}", per_gate.display()))?;
        info!(summary = %summary.display(), per_gate = %per_gate.display(), "wrote parquet tables");
    }

    if let Some(path) = json {
        write_json(&report, path).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote device records");
    }
    Ok(())
}

fn verify(file: &Path, config: &ExtractionConfig) -> Result<()> {
    if !file.is_file() {
        bail!("File not found: {}", file.display());
    }
    let device = DeviceId::parse(file)?;
    let table = load_sweep(file, config)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    print!("{}", verification_report(&device, &table, config));
    if table.is_empty() {
        bail!("No data in {}", file.display());
    }
    Ok(())
}

#[cfg(feature = "plot")]
fn plot(file: &Path, out_dir: &Path) -> Result<()> {
    if !file.is_file() {
        bail!("File not found: {}", file.display());
    }
    let config = ExtractionConfig::default();
    let device = DeviceId::parse(file)?;
    let table = load_sweep(file, &config)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let written = nmos_probe::plot::plot_device(&device, &table, &config, out_dir)
        .with_context(|| format!("Failed to plot {}", file.display()))?;
    for path in written {
        println!("Saved {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "plot")]
fn plot_all(dir: &Path, out_dir: Option<&Path>) -> Result<()> {
    let files = nmos_probe::report::collect_device_files(dir)?;
    if files.is_empty() {
        bail!("No nmos* pattern* chip* files found in {}", dir.display());
    }

    let mut failed = 0usize;
    for file in &files {
        println!("{}", file.display());
        if let Err(e) = plot(file, &plot_output_dir(file, out_dir)) {
            warn!(file = %file.display(), error = %format!("{e:#}"), "plot failed");
            failed += 1;
        }
    }

    let ok = files.len() - failed;
    if failed > 0 {
        bail!("Done. {ok} ok. ({failed} failed)");
    }
    println!("Done. {ok} ok.");
    Ok(())
}

#[cfg(not(feature = "plot"))]
fn plot(_file: &Path, _out_dir: &Path) -> Result<()> {
    bail!("Plot support not compiled in; rebuild with the 'plot' feature")
}

#[cfg(not(feature = "plot"))]
fn plot_all(_dir: &Path, _out_dir: Option<&Path>) -> Result<()> {
    bail!("Plot support not compiled in; rebuild with the 'plot' feature")
}
