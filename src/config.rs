//! Extraction configuration
//!
//! The slice tolerance and the near-zero current floor are kept at the values
//! used by the probe-station tooling so summaries stay comparable across runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Half-width of the drain-voltage band used when slicing (volts)
pub const DEFAULT_DRAIN_TOLERANCE: f64 = 0.02;

/// Floor applied to |I| before dividing by it (amps)
pub const DEFAULT_CURRENT_FLOOR: f64 = 1e-20;

/// Reference drain biases for threshold extraction (volts)
pub const DEFAULT_REFERENCE_BIASES: [f64; 4] = [0.2, 1.0, 5.0, 10.0];

/// Drain bias used for on/off metrics (volts)
pub const DEFAULT_PRIMARY_BIAS: f64 = 5.0;

/// Parameters for one extraction pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Slice band half-width (V)
    pub drain_tolerance: f64,
    /// Numerical floor for |I| in resistance and ratio (A)
    pub current_floor: f64,
    /// Drain biases at which Vth is extracted (V)
    pub reference_biases: Vec<f64>,
    /// Drain bias for on/off metrics; `None` selects the highest swept level
    pub primary_bias: Option<f64>,
    /// Off-state gate voltage (V)
    pub vg_off: f64,
    /// On-state gate voltage; `None` selects the highest swept gate level
    pub vg_on: Option<f64>,
    /// Worksheet holding the sweep in probe-station workbooks
    pub sheet_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            drain_tolerance: DEFAULT_DRAIN_TOLERANCE,
            current_floor: DEFAULT_CURRENT_FLOOR,
            reference_biases: DEFAULT_REFERENCE_BIASES.to_vec(),
            primary_bias: Some(DEFAULT_PRIMARY_BIAS),
            vg_off: 0.0,
            vg_on: None,
            sheet_name: "Data".to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Create a configuration builder starting from the defaults
    #[must_use]
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `InvalidInput` for a negative or non-finite tolerance, a
    /// non-positive floor, or an empty reference set
    pub fn validate(&self) -> Result<()> {
        if !self.drain_tolerance.is_finite() || self.drain_tolerance < 0.0 {
            return Err(crate::Error::InvalidInput(format!(
                "drain_tolerance must be a finite non-negative voltage, got {}",
                self.drain_tolerance
            )));
        }
        if !(self.current_floor > 0.0) {
            return Err(crate::Error::InvalidInput(format!(
                "current_floor must be positive, got {}",
                self.current_floor
            )));
        }
        if self.reference_biases.is_empty() {
            return Err(crate::Error::InvalidInput(
                "reference_biases must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for `ExtractionConfig`
#[derive(Debug, Default)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Set the slice band half-width (V)
    #[must_use]
    pub fn drain_tolerance(mut self, tolerance: f64) -> Self {
        self.config.drain_tolerance = tolerance;
        self
    }

    /// Set the near-zero current floor (A)
    #[must_use]
    pub fn current_floor(mut self, floor: f64) -> Self {
        self.config.current_floor = floor;
        self
    }

    /// Set the reference drain biases for threshold extraction
    #[must_use]
    pub fn reference_biases(mut self, biases: impl Into<Vec<f64>>) -> Self {
        self.config.reference_biases = biases.into();
        self
    }

    /// Set the on/off drain bias (`None` = highest swept level)
    #[must_use]
    pub fn primary_bias(mut self, bias: Option<f64>) -> Self {
        self.config.primary_bias = bias;
        self
    }

    /// Set the off-state gate voltage
    #[must_use]
    pub fn vg_off(mut self, vg: f64) -> Self {
        self.config.vg_off = vg;
        self
    }

    /// Set the on-state gate voltage (`None` = highest swept level)
    #[must_use]
    pub fn vg_on(mut self, vg: Option<f64>) -> Self {
        self.config.vg_on = vg;
        self
    }

    /// Set the worksheet name read from workbooks
    #[must_use]
    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// Returns error if any value is out of range
    pub fn build(self) -> Result<ExtractionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
