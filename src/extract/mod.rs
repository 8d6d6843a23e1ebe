//! Measurement extraction engine
//!
//! Turns a sweep table into device figures of merit:
//! - [`threshold`]: Vth by max-gm linear extrapolation
//! - [`onoff`]: Ion, Ioff, Ron, Roff and on/off ratio
//! - [`device`]: identity parsing and the per-device orchestrator
//!
//! Every function here is a pure function of its table and configuration,
//! so devices can be extracted concurrently without coordination.

pub mod device;
pub mod onoff;
pub mod threshold;

pub use device::{
    extract_device, threshold_at, DeviceId, ExtractionStatus, MetricsRecord, ThresholdReading,
};
pub use onoff::{compute_on_off, OnOffMetrics};
pub use threshold::{extract_vth, gradient, nan_argmax, ThresholdResult};
