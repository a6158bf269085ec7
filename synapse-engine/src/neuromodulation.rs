//! Eligibility trace and GABA chemistry.
//!
//! This module holds the decaying quantities behind the three-factor rule:
//! - the eligibility trace, a saturating memory of recent pre/post
//!   coincidences, read with exponential decay applied from its last update;
//! - the GABA state: fast inhibition, slowly accumulating long-term
//!   weakening, exposure counting, and the window/asymmetry modulation GABA
//!   imposes on the STDP calculator;
//! - the pruning-threshold modifier pushed around by neuromodulators.
//!
//! Every read takes an explicit `now` so decay is applied at observation
//! time; nothing here owns a timer.

use std::time::Instant;

use tracing::debug;

/// Eligibility magnitude below which neuromodulation changes nothing.
pub const ELIGIBILITY_TRACE_THRESHOLD: f64 = 0.01;
/// Saturation bound for the eligibility trace (|e| clamp).
pub const ELIGIBILITY_TRACE_MAX: f64 = 2.0;
/// Fixed positive contribution added per successful transmission.
pub const TRANSMISSION_ELIGIBILITY_CONTRIBUTION: f64 = 0.2;
/// Default eligibility decay time constant (ms).
pub const DEFAULT_ELIGIBILITY_DECAY_MS: f64 = 1000.0;

/// Concentration at or above which a GABA event counts as strong.
pub const GABA_STRONG_CONCENTRATION_THRESHOLD: f64 = 1.0;
/// Scaling from GABA concentration to inhibition.
pub const GABA_INHIBITION_SCALING: f64 = 0.4;
/// Inhibition saturation; transmission is never fully silenced.
pub const GABA_MAX_INHIBITION: f64 = 0.9;
/// Inhibition decay time constant (ms).
pub const GABA_INHIBITION_DECAY_MS: f64 = 500.0;
/// Per-exposure long-term weakening factor.
pub const GABA_WEAKENING_FACTOR: f64 = 0.01;
/// Long-term weakening never exceeds this fraction of the current weight.
pub const MAX_WEAKENING_RATIO: f64 = 0.5;
/// Quiescence after which long-term weakening starts recovering (ms).
pub const GABA_RECOVERY_QUIET_MS: f64 = 5000.0;
/// Decay time constant for the GABA→STDP modulation (ms).
pub const GABA_STDP_MODULATION_DECAY_MS: f64 = 2000.0;
/// Window narrowing added per unit concentration per exposure.
pub const GABA_WINDOW_NARROWING_STEP: f64 = 0.05;
/// Window narrowing ceiling (fraction of τ and W removed).
pub const GABA_WINDOW_NARROWING_MAX: f64 = 0.5;
/// Asymmetry shift added per unit concentration per exposure.
pub const GABA_ASYMMETRY_SHIFT_STEP: f64 = 0.1;
/// Asymmetry shift ceiling.
pub const GABA_ASYMMETRY_SHIFT_MAX: f64 = 1.0;

/// Pruning-threshold modifier decay time constant (ms).
pub const PRUNING_MODIFIER_DECAY_MS: f64 = 5000.0;

fn decay_factor(last_update: Instant, now: Instant, tau_ms: f64) -> f64 {
    if tau_ms <= 0.0 {
        return 0.0;
    }
    let elapsed_ms = now.saturating_duration_since(last_update).as_secs_f64() * 1000.0;
    (-elapsed_ms / tau_ms).exp()
}

/// A decaying memory of recent pre/post coincidences.
///
/// The stored value is only meaningful together with its last-update
/// instant; [`EligibilityTrace::value_at`] applies the decay at read time.
#[derive(Debug, Clone)]
pub struct EligibilityTrace {
    value: f64,
    updated_at: Instant,
    decay_ms: f64,
}

impl EligibilityTrace {
    /// Create an empty trace with the given decay time constant (ms).
    /// Non-positive or non-finite constants fall back to the default.
    pub fn new(decay_ms: f64, now: Instant) -> Self {
        let decay_ms = if decay_ms.is_finite() && decay_ms > 0.0 {
            decay_ms
        } else {
            DEFAULT_ELIGIBILITY_DECAY_MS
        };
        Self {
            value: 0.0,
            updated_at: now,
            decay_ms,
        }
    }

    /// Current trace value with decay applied.
    pub fn value_at(&self, now: Instant) -> f64 {
        self.value * decay_factor(self.updated_at, now, self.decay_ms)
    }

    /// Decay, then accumulate a contribution; the result saturates at
    /// ±[`ELIGIBILITY_TRACE_MAX`]. Non-finite contributions are ignored.
    pub fn accumulate_at(&mut self, contribution: f64, now: Instant) {
        if !contribution.is_finite() {
            return;
        }
        let decayed = self.value_at(now);
        self.value = (decayed + contribution).clamp(-ELIGIBILITY_TRACE_MAX, ELIGIBILITY_TRACE_MAX);
        self.updated_at = now;
    }

    /// Decay time constant (ms).
    pub fn decay_ms(&self) -> f64 {
        self.decay_ms
    }

    pub fn reset(&mut self, now: Instant) {
        self.value = 0.0;
        self.updated_at = now;
    }
}

/// Snapshot of GABA's influence on the STDP calculator.
///
/// `window_narrowing` is the fraction removed from both τ and W;
/// `asymmetry_shift` scales the LTD/LTP ratio upward (toward depression).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StdpModulation {
    pub window_narrowing: f64,
    pub asymmetry_shift: f64,
}

/// Fast inhibition and slow weakening driven by GABA exposure.
#[derive(Debug, Clone)]
pub struct GabaState {
    inhibition: f64,
    inhibition_updated_at: Instant,
    long_term_weakening: f64,
    exposure_count: u32,
    last_exposure_at: Instant,
    window_narrowing: f64,
    asymmetry_shift: f64,
    modulation_updated_at: Instant,
    /// Quiescence before long-term weakening recovers (ms).
    recovery_time_ms: f64,
}

impl GabaState {
    pub fn new(now: Instant) -> Self {
        Self {
            inhibition: 0.0,
            inhibition_updated_at: now,
            long_term_weakening: 0.0,
            exposure_count: 0,
            last_exposure_at: now,
            window_narrowing: 0.0,
            asymmetry_shift: 0.0,
            modulation_updated_at: now,
            recovery_time_ms: GABA_RECOVERY_QUIET_MS,
        }
    }

    /// Current inhibition in `[0, GABA_MAX_INHIBITION]`, decayed to `now`.
    pub fn current_inhibition_at(&self, now: Instant) -> f64 {
        self.inhibition * decay_factor(self.inhibition_updated_at, now, GABA_INHIBITION_DECAY_MS)
    }

    /// Long-term weakening, recovered toward zero after quiescence.
    ///
    /// Recovery halves the accumulated weakening for every full recovery
    /// period elapsed beyond the initial quiet interval.
    pub fn long_term_weakening_at(&self, now: Instant) -> f64 {
        let quiet_ms = now
            .saturating_duration_since(self.last_exposure_at)
            .as_secs_f64()
            * 1000.0;
        if quiet_ms <= self.recovery_time_ms {
            return self.long_term_weakening;
        }
        let periods = (quiet_ms - self.recovery_time_ms) / self.recovery_time_ms;
        self.long_term_weakening * 0.5_f64.powf(periods)
    }

    /// GABA's current influence on STDP timing parameters.
    pub fn stdp_modulation_at(&self, now: Instant) -> StdpModulation {
        let factor = decay_factor(
            self.modulation_updated_at,
            now,
            GABA_STDP_MODULATION_DECAY_MS,
        );
        StdpModulation {
            window_narrowing: self.window_narrowing * factor,
            asymmetry_shift: self.asymmetry_shift * factor,
        }
    }

    /// Total exposures since construction or reset.
    pub fn exposure_count(&self) -> u32 {
        self.exposure_count
    }

    /// Register a GABA exposure of concentration `c` against the current
    /// weight: raises inhibition, accumulates capped long-term weakening
    /// with logarithmic exposure scaling, and strengthens the STDP
    /// modulation.
    pub fn apply_exposure_at(&mut self, concentration: f64, current_weight: f64, now: Instant) {
        if !concentration.is_finite() || concentration <= 0.0 {
            return;
        }

        // Inhibition is raised, never lowered, by an exposure.
        let decayed = self.current_inhibition_at(now);
        let target = (concentration * GABA_INHIBITION_SCALING).min(GABA_MAX_INHIBITION);
        self.inhibition = decayed.max(target);
        self.inhibition_updated_at = now;

        // Long-term weakening accumulates with log exposure scaling, capped
        // relative to the weight it erodes.
        let recovered = self.long_term_weakening_at(now);
        self.exposure_count = self.exposure_count.saturating_add(1);
        let increment =
            concentration * GABA_WEAKENING_FACTOR * (1.0 + self.exposure_count as f64).ln();
        let cap = (current_weight * MAX_WEAKENING_RATIO).max(0.0);
        self.long_term_weakening = (recovered + increment).min(cap);

        let modulation = self.stdp_modulation_at(now);
        self.window_narrowing = (modulation.window_narrowing
            + concentration * GABA_WINDOW_NARROWING_STEP)
            .min(GABA_WINDOW_NARROWING_MAX);
        self.asymmetry_shift = (modulation.asymmetry_shift
            + concentration * GABA_ASYMMETRY_SHIFT_STEP)
            .min(GABA_ASYMMETRY_SHIFT_MAX);
        self.modulation_updated_at = now;
        self.last_exposure_at = now;

        debug!(
            concentration,
            inhibition = self.inhibition,
            weakening = self.long_term_weakening,
            exposures = self.exposure_count,
            "GABA exposure applied"
        );
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}

/// Decaying additive modifier for the pruning weight threshold.
///
/// GABA pushes it up (pro-pruning), dopamine/serotonin/glutamate push it
/// down (protective); in between it relaxes exponentially toward zero.
#[derive(Debug, Clone)]
pub struct ThresholdModifier {
    value: f64,
    updated_at: Instant,
}

impl ThresholdModifier {
    pub fn new(now: Instant) -> Self {
        Self {
            value: 0.0,
            updated_at: now,
        }
    }

    /// Current modifier with decay toward zero applied.
    pub fn value_at(&self, now: Instant) -> f64 {
        self.value * decay_factor(self.updated_at, now, PRUNING_MODIFIER_DECAY_MS)
    }

    /// Decay, then shift by `delta`. Non-finite deltas are ignored.
    pub fn adjust_at(&mut self, delta: f64, now: Instant) {
        if !delta.is_finite() {
            return;
        }
        self.value = self.value_at(now) + delta;
        self.updated_at = now;
    }

    pub fn reset(&mut self, now: Instant) {
        self.value = 0.0;
        self.updated_at = now;
    }
}
