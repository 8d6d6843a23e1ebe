//! # nmos-probe: NMOS Characterization from Probe-Station Sweeps
//!
//! **Version**: 0.1.0
//!
//! nmos-probe turns raw drain/gate I-V sweeps into device figures of merit:
//! threshold voltage (max-gm linear extrapolation), on/off currents,
//! on/off resistances and the on/off ratio. Batches of devices, identified by
//! chip, width and pattern, are merged into tabular summaries.
//!
//! ## Pipeline
//!
//! - **Load**: spreadsheet export → flat [`sweep::SweepTable`] (Arrow)
//! - **Resolve**: requested bias → nearest swept level ([`sweep::grid`])
//! - **Slice**: drain band → averaged `Id(Vg)` curve ([`sweep::slice`])
//! - **Extract**: threshold + on/off metrics ([`extract`])
//! - **Report**: summary and per-gate tables ([`report`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nmos_probe::config::ExtractionConfig;
//! use nmos_probe::report::{run_batch, write_summary_csv};
//!
//! let config = ExtractionConfig::default();
//! let report = run_batch("data/", &config)?;
//! write_summary_csv(&report, "nmos_summary.csv")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod extract;
pub mod loader;
#[cfg(feature = "plot")]
pub mod plot;
pub mod report;
pub mod sweep;

pub use error::{Error, Result};
