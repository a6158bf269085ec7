//! Immutable, validated configuration value objects.
//!
//! Configurations are constructed through validating factories: fields that
//! are out of range but correctable are replaced by documented defaults and
//! reported in a warning list; combinations that cannot be corrected return
//! [`SynapseError::InvalidConfiguration`]. Once built, a configuration never
//! changes for the lifetime of its synapse (short of a full `reset`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SynapseError};

/// Default STDP learning rate (η).
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
/// Default STDP time constant τ (ms).
pub const DEFAULT_TIME_CONSTANT_MS: f64 = 20.0;
/// Default STDP window W (ms).
pub const DEFAULT_WINDOW_SIZE_MS: f64 = 100.0;
/// Default minimum synaptic weight.
pub const DEFAULT_MIN_WEIGHT: f64 = 0.001;
/// Default maximum synaptic weight.
pub const DEFAULT_MAX_WEIGHT: f64 = 2.0;
/// Default LTD/LTP asymmetry ratio (α).
pub const DEFAULT_ASYMMETRY_RATIO: f64 = 1.2;

/// Default pruning weight threshold.
pub const DEFAULT_WEIGHT_THRESHOLD: f64 = 0.05;
/// Default inactivity threshold before a weak synapse becomes prunable.
pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(30);
/// Default pruning probability once the decision clauses fire.
pub const DEFAULT_PRUNING_PROBABILITY: f64 = 1.0;

/// Default ready-pool size.
pub const DEFAULT_READY_POOL_SIZE: u32 = 100;
/// Default reserve-pool size.
pub const DEFAULT_RESERVE_POOL_SIZE: u32 = 300;
/// Default maximum sustained release rate (Hz).
pub const DEFAULT_MAX_RELEASE_RATE_HZ: f64 = 100.0;
/// Biological ceiling for a single synapse's sustained release rate (Hz).
pub const MAX_RELEASE_RATE_HZ: f64 = 200.0;
/// Default baseline release probability before calcium/fatigue/depletion.
pub const DEFAULT_BASELINE_RELEASE_PROBABILITY: f64 = 0.85;

/// A correction applied by a validating factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    /// Name of the corrected field.
    pub field: &'static str,
    /// Human-readable description of the correction.
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        let warning = Self {
            field,
            message: message.into(),
        };
        warn!(field = warning.field, "{}", warning.message);
        warning
    }
}

fn correct_field(
    warnings: &mut Vec<ConfigWarning>,
    field: &'static str,
    value: &mut f64,
    valid: impl Fn(f64) -> bool,
    default: f64,
) {
    if !valid(*value) {
        warnings.push(ConfigWarning::new(
            field,
            format!("{field} = {value} out of range, corrected to {default}"),
        ));
        *value = default;
    }
}

/// Spike-timing-dependent plasticity parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlasticityConfig {
    /// Master switch; when false every timing-based change is zero.
    pub enabled: bool,
    /// Learning rate η.
    pub learning_rate: f64,
    /// Exponential time constant τ (ms). Zero yields no plasticity.
    pub time_constant_ms: f64,
    /// STDP window W (ms); |Δt| at or beyond W changes nothing.
    pub window_size_ms: f64,
    /// Lower weight bound.
    pub min_weight: f64,
    /// Upper weight bound.
    pub max_weight: f64,
    /// LTD/LTP asymmetry ratio α.
    pub asymmetry_ratio: f64,
    /// Enable the frequency-dependent (BCM) rule.
    pub frequency_dependent: bool,
    /// Sliding-threshold adaptation rate; zero disables metaplasticity.
    pub metaplasticity_rate: f64,
    /// Minimum cooperative inputs for plasticity; zero disables the gate.
    pub cooperativity_threshold: u32,
}

impl Default for PlasticityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            learning_rate: DEFAULT_LEARNING_RATE,
            time_constant_ms: DEFAULT_TIME_CONSTANT_MS,
            window_size_ms: DEFAULT_WINDOW_SIZE_MS,
            min_weight: DEFAULT_MIN_WEIGHT,
            max_weight: DEFAULT_MAX_WEIGHT,
            asymmetry_ratio: DEFAULT_ASYMMETRY_RATIO,
            frequency_dependent: false,
            metaplasticity_rate: 0.0,
            cooperativity_threshold: 0,
        }
    }
}

impl PlasticityConfig {
    /// Validate, correcting recoverable fields to defaults.
    ///
    /// # Returns
    /// The corrected configuration and the list of applied corrections.
    /// An inverted weight range cannot be corrected and is an error.
    pub fn validated(mut self) -> Result<(Self, Vec<ConfigWarning>)> {
        let mut warnings = Vec::new();

        correct_field(
            &mut warnings,
            "learning_rate",
            &mut self.learning_rate,
            |v| v.is_finite() && v >= 0.0,
            DEFAULT_LEARNING_RATE,
        );
        correct_field(
            &mut warnings,
            "time_constant_ms",
            &mut self.time_constant_ms,
            |v| v.is_finite() && v >= 0.0,
            DEFAULT_TIME_CONSTANT_MS,
        );
        correct_field(
            &mut warnings,
            "window_size_ms",
            &mut self.window_size_ms,
            |v| v.is_finite() && v >= 0.0,
            DEFAULT_WINDOW_SIZE_MS,
        );
        correct_field(
            &mut warnings,
            "asymmetry_ratio",
            &mut self.asymmetry_ratio,
            |v| v.is_finite() && v >= 0.0,
            DEFAULT_ASYMMETRY_RATIO,
        );
        correct_field(
            &mut warnings,
            "metaplasticity_rate",
            &mut self.metaplasticity_rate,
            |v| v.is_finite() && v >= 0.0,
            0.0,
        );
        correct_field(
            &mut warnings,
            "min_weight",
            &mut self.min_weight,
            |v| v.is_finite(),
            DEFAULT_MIN_WEIGHT,
        );
        correct_field(
            &mut warnings,
            "max_weight",
            &mut self.max_weight,
            |v| v.is_finite(),
            DEFAULT_MAX_WEIGHT,
        );

        if self.min_weight > self.max_weight {
            return Err(SynapseError::InvalidConfiguration(format!(
                "min_weight {} exceeds max_weight {}",
                self.min_weight, self.max_weight
            )));
        }

        Ok((self, warnings))
    }

    /// Clamp a weight into the configured range.
    ///
    /// A non-finite input collapses to the midpoint of the valid range
    /// rather than propagating.
    pub fn clamp_weight(&self, weight: f64) -> f64 {
        if !weight.is_finite() {
            return self.weight_midpoint();
        }
        weight.clamp(self.min_weight, self.max_weight)
    }

    /// Midpoint of the valid weight range, the sentinel for bad inputs.
    pub fn weight_midpoint(&self) -> f64 {
        (self.min_weight + self.max_weight) / 2.0
    }

    /// Normalize a weight to `[0, 1]` within the configured range.
    pub fn normalize_weight(&self, weight: f64) -> f64 {
        let span = self.max_weight - self.min_weight;
        if span <= 0.0 {
            return 0.5;
        }
        ((self.clamp_weight(weight) - self.min_weight) / span).clamp(0.0, 1.0)
    }
}

/// Structural-pruning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Master switch; when false `should_prune` is always false.
    pub enabled: bool,
    /// Base effective-weight threshold below which a synapse is weak.
    pub weight_threshold: f64,
    /// Inactivity duration beyond which a weak synapse becomes prunable.
    pub inactivity_threshold: Duration,
    /// Grace period after creation during which pruning never fires.
    pub protection_period: Option<Duration>,
    /// Metabolic-efficiency score below which a weak synapse is prunable.
    pub metabolic_threshold: Option<f64>,
    /// Probability that a positive decision is actually reported.
    pub pruning_probability: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
            protection_period: None,
            metabolic_threshold: None,
            pruning_probability: DEFAULT_PRUNING_PROBABILITY,
        }
    }
}

impl PruningConfig {
    /// Validate, correcting recoverable fields to defaults.
    pub fn validated(mut self) -> Result<(Self, Vec<ConfigWarning>)> {
        let mut warnings = Vec::new();

        correct_field(
            &mut warnings,
            "weight_threshold",
            &mut self.weight_threshold,
            |v| v.is_finite() && v >= 0.0,
            DEFAULT_WEIGHT_THRESHOLD,
        );
        correct_field(
            &mut warnings,
            "pruning_probability",
            &mut self.pruning_probability,
            |v| v.is_finite() && (0.0..=1.0).contains(&v),
            DEFAULT_PRUNING_PROBABILITY,
        );
        if let Some(t) = self.metabolic_threshold {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                warnings.push(ConfigWarning::new(
                    "metabolic_threshold",
                    format!("metabolic_threshold = {t} out of range, disabled"),
                ));
                self.metabolic_threshold = None;
            }
        }
        if self.inactivity_threshold.is_zero() {
            warnings.push(ConfigWarning::new(
                "inactivity_threshold",
                "inactivity_threshold of zero corrected to default".to_string(),
            ));
            self.inactivity_threshold = DEFAULT_INACTIVITY_THRESHOLD;
        }

        Ok((self, warnings))
    }
}

/// Vesicle-release parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesicleConfig {
    /// Initial ready-releasable pool size.
    pub ready_pool_size: u32,
    /// Initial reserve pool size.
    pub reserve_pool_size: u32,
    /// Maximum sustained release rate (Hz).
    pub max_release_rate_hz: f64,
    /// Baseline release probability before modulation.
    pub baseline_release_probability: f64,
}

impl Default for VesicleConfig {
    fn default() -> Self {
        Self {
            ready_pool_size: DEFAULT_READY_POOL_SIZE,
            reserve_pool_size: DEFAULT_RESERVE_POOL_SIZE,
            max_release_rate_hz: DEFAULT_MAX_RELEASE_RATE_HZ,
            baseline_release_probability: DEFAULT_BASELINE_RELEASE_PROBABILITY,
        }
    }
}

impl VesicleConfig {
    /// Validate, correcting recoverable fields to defaults.
    ///
    /// Zero or negative rates are coerced to the default, rates above the
    /// biological ceiling are clamped, and a zero ready pool is an error
    /// (the synapse could never transmit).
    pub fn validated(mut self) -> Result<(Self, Vec<ConfigWarning>)> {
        let mut warnings = Vec::new();

        if self.ready_pool_size == 0 {
            return Err(SynapseError::InvalidConfiguration(
                "ready_pool_size must be at least 1".to_string(),
            ));
        }
        if !self.max_release_rate_hz.is_finite() || self.max_release_rate_hz <= 0.0 {
            warnings.push(ConfigWarning::new(
                "max_release_rate_hz",
                format!(
                    "max_release_rate_hz = {} invalid, corrected to {}",
                    self.max_release_rate_hz, DEFAULT_MAX_RELEASE_RATE_HZ
                ),
            ));
            self.max_release_rate_hz = DEFAULT_MAX_RELEASE_RATE_HZ;
        } else if self.max_release_rate_hz > MAX_RELEASE_RATE_HZ {
            warnings.push(ConfigWarning::new(
                "max_release_rate_hz",
                format!(
                    "max_release_rate_hz = {} above biological ceiling, clamped to {}",
                    self.max_release_rate_hz, MAX_RELEASE_RATE_HZ
                ),
            ));
            self.max_release_rate_hz = MAX_RELEASE_RATE_HZ;
        }
        correct_field(
            &mut warnings,
            "baseline_release_probability",
            &mut self.baseline_release_probability,
            |v| v.is_finite() && (0.0..=1.0).contains(&v),
            DEFAULT_BASELINE_RELEASE_PROBABILITY,
        );

        Ok((self, warnings))
    }
}
