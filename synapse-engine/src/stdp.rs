//! The STDP / plasticity calculator.
//!
//! Converts a spike-timing difference Δt (ms, `t_pre − t_post`, negative =
//! causal) into a weight change:
//!
//! ```text
//! Δw =  η · exp(Δt/τ)        for −W < Δt < −ε   (LTP)
//! Δw = −η · α · exp(−Δt/τ)   for  ε < Δt <  W   (LTD)
//! Δw =  η · 0.1              for |Δt| < ε        (simultaneous, small LTP)
//! Δw =  0                    for |Δt| ≥ W
//! ```
//!
//! The base change is then scaled by the modulatory multipliers, in order:
//! weight dependence, neuromodulator influence, developmental factor, and
//! the BCM-style metaplasticity sliding threshold. A cooperativity gate can
//! zero the whole computation before any scaling. GABA narrows the
//! effective window and shifts the asymmetry on every timing-based request.
//!
//! The calculator is deterministic and never clamps: weight bounds are the
//! engine's responsibility.

use std::time::Duration;

use crate::config::PlasticityConfig;
use crate::neuromodulation::StdpModulation;
use crate::ring::BoundedRing;

/// |Δt| below this (ms) counts as simultaneous firing.
pub const SIMULTANEOUS_SPIKE_EPSILON_MS: f64 = 1.0;
/// Fraction of η granted as LTP on simultaneous firing.
pub const SIMULTANEOUS_LTP_FRACTION: f64 = 0.1;

/// Plasticity multiplier during the developmental critical period.
pub const CRITICAL_PERIOD_FACTOR: f64 = 2.5;
/// Numerator of the aging reduction `aging_factor / stage`.
pub const AGING_FACTOR: f64 = 1.0;

/// Samples required before the sliding threshold starts moving.
pub const METAPLASTICITY_HISTORY_MIN: usize = 10;
/// Capacity of the metaplasticity activity history.
pub const METAPLASTICITY_HISTORY_CAPACITY: usize = 50;

/// Crossover frequency of the BCM frequency-dependent rule (Hz).
pub const BCM_CROSSOVER_HZ: f64 = 10.0;
/// Ceiling on the LTP ratio of the frequency rule.
pub const BCM_LTP_RATIO_CAP: f64 = 2.0;
/// Stimulation duration at which the frequency rule saturates.
pub const BCM_SATURATION_DURATION: Duration = Duration::from_secs(60);

/// Biological clamp for dopamine levels.
pub const DOPAMINE_MAX: f64 = 5.0;
/// Biological clamp for acetylcholine levels.
pub const ACETYLCHOLINE_MAX: f64 = 3.0;
/// Biological clamp for norepinephrine levels.
pub const NOREPINEPHRINE_MAX: f64 = 3.0;
/// Norepinephrine level of peak effectiveness (inverted-U).
pub const NOREPINEPHRINE_OPTIMUM: f64 = 1.5;

/// Minimum stimulation strength for late-phase protein synthesis.
pub const LATE_PHASE_MIN_STIMULATION: f64 = 2.0;
/// Attenuation of heterosynaptic spread relative to the primary change.
pub const HETEROSYNAPTIC_ATTENUATION: f64 = 0.1;

/// Capacity of the per-side spike buffers used for pair discovery.
pub const SPIKE_BUFFER_CAPACITY: usize = 64;

/// Ambient neuromodulator levels at the synapse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuromodulatorLevels {
    /// Dopamine level; baseline 1.0 enhances nothing.
    pub dopamine: f64,
    /// Acetylcholine level; attention gate, baseline 1.0.
    pub acetylcholine: f64,
    /// Norepinephrine level; inverted-U around [`NOREPINEPHRINE_OPTIMUM`].
    pub norepinephrine: f64,
}

impl NeuromodulatorLevels {
    /// Neutral baseline levels (combined influence of 1.0).
    pub fn baseline() -> Self {
        Self {
            dopamine: 1.0,
            acetylcholine: 1.0,
            norepinephrine: NOREPINEPHRINE_OPTIMUM,
        }
    }

    /// Combined multiplicative influence on a weight change.
    ///
    /// Levels are clamped into their biological ranges first; non-finite
    /// levels collapse to baseline. Dopamine above 1.0 enhances, below 1.0
    /// suppresses; acetylcholine gates attention linearly; norepinephrine
    /// follows an inverted-U peaking at its optimum. The product is clamped
    /// to `[0.1, 3.0]`.
    pub fn influence(&self) -> f64 {
        let dopamine = sanitize(self.dopamine, 1.0).clamp(0.0, DOPAMINE_MAX);
        let acetylcholine = sanitize(self.acetylcholine, 1.0).clamp(0.0, ACETYLCHOLINE_MAX);
        let norepinephrine = sanitize(self.norepinephrine, NOREPINEPHRINE_OPTIMUM)
            .clamp(0.0, NOREPINEPHRINE_MAX);

        let dopamine_factor = 1.0 + 0.3 * (dopamine - 1.0);
        let attention_factor = 0.8 + 0.2 * acetylcholine;
        let deviation = norepinephrine - NOREPINEPHRINE_OPTIMUM;
        let arousal_factor = 0.5 + 0.5 * (-deviation * deviation / 0.5).exp();

        (dopamine_factor * attention_factor * arousal_factor).clamp(0.1, 3.0)
    }
}

impl Default for NeuromodulatorLevels {
    fn default() -> Self {
        Self::baseline()
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Optional modulatory context for one weight-change request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modulators {
    /// Ambient neuromodulator levels; `None` means neutral.
    pub neuromodulators: Option<NeuromodulatorLevels>,
    /// Developmental stage: `< 0.5` critical period, `0.5..=1.0` mature,
    /// `> 1.0` aging.
    pub developmental_stage: Option<f64>,
    /// Count of concurrently active cooperating inputs.
    pub cooperative_inputs: Option<u32>,
    /// GABA-imposed window narrowing and asymmetry shift.
    pub stdp_modulation: Option<StdpModulation>,
}

/// One discovered pre/post spike pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikePair {
    pub pre_ms: f64,
    pub post_ms: f64,
    /// `pre − post`; negative = causal.
    pub delta_t_ms: f64,
}

/// The unified timing-based weight-change calculator.
#[derive(Debug, Clone)]
pub struct PlasticityCalculator {
    config: PlasticityConfig,
    sliding_threshold: f64,
    activity_history: BoundedRing<f64>,
    pre_spikes: BoundedRing<f64>,
    post_spikes: BoundedRing<f64>,
}

impl PlasticityCalculator {
    pub fn new(config: PlasticityConfig) -> Self {
        Self {
            config,
            sliding_threshold: 1.0,
            activity_history: BoundedRing::new(METAPLASTICITY_HISTORY_CAPACITY),
            pre_spikes: BoundedRing::new(SPIKE_BUFFER_CAPACITY),
            post_spikes: BoundedRing::new(SPIKE_BUFFER_CAPACITY),
        }
    }

    pub fn config(&self) -> &PlasticityConfig {
        &self.config
    }

    /// Current BCM sliding threshold (baseline 1.0).
    pub fn sliding_threshold(&self) -> f64 {
        self.sliding_threshold
    }

    /// Restore calculator dynamics to their initialization values.
    pub fn reset(&mut self) {
        self.sliding_threshold = 1.0;
        self.activity_history.clear();
        self.pre_spikes.clear();
        self.post_spikes.clear();
    }

    /// Effective (τ, W, α) after applying GABA's window narrowing and
    /// asymmetry shift.
    fn effective_params(&self, modulation: Option<StdpModulation>) -> (f64, f64, f64) {
        let m = modulation.unwrap_or_default();
        let narrowing = m.window_narrowing.clamp(0.0, 1.0);
        let shift = m.asymmetry_shift.max(0.0);
        (
            self.config.time_constant_ms * (1.0 - narrowing),
            self.config.window_size_ms * (1.0 - narrowing),
            self.config.asymmetry_ratio * (1.0 + shift),
        )
    }

    /// The raw STDP shape, without learning-rate scaling.
    ///
    /// This is the quantity accumulated into the eligibility trace: the Δt
    /// sign survives, the magnitude is the exponential pairing strength.
    pub fn stdp_shape(&self, delta_t_ms: f64, modulation: Option<StdpModulation>) -> f64 {
        let (tau, window, asymmetry) = self.effective_params(modulation);
        shape(delta_t_ms, tau, window, asymmetry)
    }

    /// Timing-based weight change for `delta_t_ms` at `current_weight`.
    ///
    /// # Arguments
    /// * `delta_t_ms` - `t_pre − t_post` in milliseconds
    /// * `current_weight` - weight before the change
    /// * `rate_override` - per-call learning rate replacing the configured η
    /// * `modulators` - optional modulatory context
    ///
    /// The result is unclamped; the engine bounds it into the weight range.
    pub fn weight_change(
        &mut self,
        delta_t_ms: f64,
        current_weight: f64,
        rate_override: Option<f64>,
        modulators: &Modulators,
    ) -> f64 {
        if !self.config.enabled {
            return 0.0;
        }

        // The cooperativity gate fires before any scaling.
        if self.config.cooperativity_threshold > 0 {
            if let Some(inputs) = modulators.cooperative_inputs {
                if inputs < self.config.cooperativity_threshold {
                    return 0.0;
                }
            }
        }

        let learning_rate = match rate_override {
            Some(rate) if rate.is_finite() && rate >= 0.0 => rate,
            _ => self.config.learning_rate,
        };

        let (tau, window, asymmetry) = self.effective_params(modulators.stdp_modulation);
        let base = learning_rate * shape(delta_t_ms, tau, window, asymmetry);

        if self.config.metaplasticity_rate > 0.0 {
            self.record_activity_sample(delta_t_ms, tau, window);
        }
        if base == 0.0 {
            return 0.0;
        }

        let weight_factor = 2.0 - self.config.normalize_weight(current_weight);
        let neuromodulator_factor = modulators
            .neuromodulators
            .map(|levels| levels.influence())
            .unwrap_or(1.0);
        let developmental_factor = modulators
            .developmental_stage
            .map(developmental_factor)
            .unwrap_or(1.0);
        let metaplasticity_factor =
            self.metaplasticity_factor(self.config.normalize_weight(current_weight));

        base * weight_factor * neuromodulator_factor * developmental_factor * metaplasticity_factor
    }

    /// Pairing strength sample feeding the sliding threshold; scaled so a
    /// pairing at |Δt| ≈ τ·ln 2 sits at the 1.0 baseline.
    fn record_activity_sample(&mut self, delta_t_ms: f64, tau: f64, window: f64) {
        let sample = if delta_t_ms.is_finite() && tau > 0.0 && delta_t_ms.abs() < window {
            2.0 * (-delta_t_ms.abs() / tau).exp()
        } else {
            0.0
        };
        self.activity_history.push(sample);
    }

    /// BCM sliding-threshold factor.
    ///
    /// Once enough samples exist, the threshold shifts by
    /// `(mean_activity − 1) · metaplasticity_rate`, modulated by the
    /// recent-vs-older trend. Plasticity is boosted below the threshold
    /// and damped above it.
    fn metaplasticity_factor(&mut self, normalized_weight: f64) -> f64 {
        if self.config.metaplasticity_rate <= 0.0 {
            return 1.0;
        }

        if self.activity_history.len() >= METAPLASTICITY_HISTORY_MIN {
            let samples = self.activity_history.to_vec();
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let half = samples.len() / 2;
            let older = &samples[..half];
            let recent = &samples[half..];
            let older_mean = older.iter().sum::<f64>() / older.len().max(1) as f64;
            let recent_mean = recent.iter().sum::<f64>() / recent.len().max(1) as f64;
            let trend = (recent_mean - older_mean).clamp(-0.5, 0.5);

            let shift = (mean - 1.0) * self.config.metaplasticity_rate * (1.0 + trend);
            self.sliding_threshold = (self.sliding_threshold + shift).clamp(0.1, 2.0);
        }

        (1.0 + 0.5 * (self.sliding_threshold - normalized_weight)).clamp(0.5, 1.5)
    }

    /// Record a pre-synaptic spike time (caller's ms clock).
    pub fn note_pre_spike(&mut self, t_ms: f64) {
        if !t_ms.is_finite() {
            return;
        }
        self.pre_spikes.push(t_ms);
        let cutoff = t_ms - self.config.window_size_ms;
        self.pre_spikes.retain(|&t| t >= cutoff);
    }

    /// Record a post-synaptic spike time (caller's ms clock).
    pub fn note_post_spike(&mut self, t_ms: f64) {
        if !t_ms.is_finite() {
            return;
        }
        self.post_spikes.push(t_ms);
        let cutoff = t_ms - self.config.window_size_ms;
        self.post_spikes.retain(|&t| t >= cutoff);
    }

    /// All buffered (pre, post) pairings within the STDP window, each with
    /// its exact Δt.
    pub fn pairs(&self) -> Vec<SpikePair> {
        let window = self.config.window_size_ms;
        let mut pairs = Vec::new();
        for &pre in self.pre_spikes.iter() {
            for &post in self.post_spikes.iter() {
                let delta_t_ms = pre - post;
                if delta_t_ms.abs() < window {
                    pairs.push(SpikePair {
                        pre_ms: pre,
                        post_ms: post,
                        delta_t_ms,
                    });
                }
            }
        }
        pairs
    }

    /// Frequency-dependent (BCM) weight change.
    ///
    /// Stimulation below the crossover frequency depresses in proportion to
    /// `1 − f/f_c`; above it potentiates in proportion to `(f − f_c)/f_c`,
    /// capped at [`BCM_LTP_RATIO_CAP`]. The change scales with stimulation
    /// duration (saturating at one minute), weight dependence, and
    /// neuromodulator influence.
    pub fn frequency_change(
        &self,
        frequency_hz: f64,
        duration: Duration,
        current_weight: f64,
        modulators: &Modulators,
    ) -> f64 {
        if !self.config.enabled || !self.config.frequency_dependent {
            return 0.0;
        }
        if !frequency_hz.is_finite() || frequency_hz < 0.0 {
            return 0.0;
        }

        let ratio = if frequency_hz < BCM_CROSSOVER_HZ {
            -(1.0 - frequency_hz / BCM_CROSSOVER_HZ)
        } else {
            ((frequency_hz - BCM_CROSSOVER_HZ) / BCM_CROSSOVER_HZ).min(BCM_LTP_RATIO_CAP)
        };
        let sustain =
            (duration.as_secs_f64() / BCM_SATURATION_DURATION.as_secs_f64()).min(1.0);

        let weight_factor = 2.0 - self.config.normalize_weight(current_weight);
        let neuromodulator_factor = modulators
            .neuromodulators
            .map(|levels| levels.influence())
            .unwrap_or(1.0);

        self.config.learning_rate * ratio * sustain * weight_factor * neuromodulator_factor
    }
}

/// The raw STDP shape without learning-rate scaling.
fn shape(delta_t_ms: f64, tau_ms: f64, window_ms: f64, asymmetry: f64) -> f64 {
    if !delta_t_ms.is_finite() || tau_ms <= 0.0 || window_ms <= 0.0 {
        return 0.0;
    }
    if delta_t_ms.abs() >= window_ms {
        return 0.0;
    }
    if delta_t_ms.abs() < SIMULTANEOUS_SPIKE_EPSILON_MS {
        return SIMULTANEOUS_LTP_FRACTION;
    }
    if delta_t_ms < 0.0 {
        // Causal: pre before post.
        (delta_t_ms / tau_ms).exp()
    } else {
        -asymmetry * (-delta_t_ms / tau_ms).exp()
    }
}

/// Developmental scaling of plasticity.
///
/// The critical period (`stage < 0.5`) multiplies plasticity; maturity is
/// neutral; aging (`stage > 1.0`) attenuates as `AGING_FACTOR / stage`.
pub fn developmental_factor(stage: f64) -> f64 {
    if !stage.is_finite() || stage < 0.0 {
        return 1.0;
    }
    if stage < 0.5 {
        CRITICAL_PERIOD_FACTOR
    } else if stage <= 1.0 {
        1.0
    } else {
        AGING_FACTOR / stage
    }
}

/// Homeostatic scaling factor toward a target activity level.
///
/// `clamp(1 + rate·(target/current − 1), 0.5, 2.0)`; a non-positive current
/// activity yields the neutral factor.
pub fn homeostatic_scaling_factor(rate: f64, target_activity: f64, current_activity: f64) -> f64 {
    if !rate.is_finite() || !target_activity.is_finite() || !current_activity.is_finite() {
        return 1.0;
    }
    if current_activity <= 0.0 {
        return 1.0;
    }
    (1.0 + rate * (target_activity / current_activity - 1.0)).clamp(0.5, 2.0)
}

/// Heterosynaptic plasticity: a fraction of a primary weight change spreads
/// to neighboring synapses with the opposite sign, attenuated by distance.
#[derive(Debug, Clone, PartialEq)]
pub struct HeterosynapticRule {
    /// Fraction of the primary change spread to a neighbor at distance 0.
    pub attenuation: f64,
    /// Interaction radius; neighbors beyond it are unaffected.
    pub radius: f64,
}

impl Default for HeterosynapticRule {
    fn default() -> Self {
        Self {
            attenuation: HETEROSYNAPTIC_ATTENUATION,
            radius: 100.0,
        }
    }
}

impl HeterosynapticRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight change induced at a neighbor `distance` away by
    /// `primary_change` at the stimulated synapse.
    ///
    /// `−attenuation · primary · exp(−d / (R/3))` within the radius, zero
    /// outside it or for degenerate inputs.
    pub fn change(&self, primary_change: f64, distance: f64) -> f64 {
        if !primary_change.is_finite() || !distance.is_finite() {
            return 0.0;
        }
        if distance < 0.0 || self.radius <= 0.0 || distance > self.radius {
            return 0.0;
        }
        -self.attenuation * primary_change * (-distance / (self.radius / 3.0)).exp()
    }
}

/// Late-phase, protein-synthesis-dependent consolidation.
///
/// Only sufficiently strong induction events consolidate, and only within
/// the `[early_phase, late_phase]` interval after induction; the temporal
/// profile is the symmetric hump `4t(1−t)` across that window.
#[derive(Debug, Clone, PartialEq)]
pub struct LatePhasePlasticity {
    /// Minimum stimulation strength that triggers protein synthesis.
    pub min_stimulation: f64,
    /// Start of the consolidation window after induction (ms).
    pub early_phase_ms: f64,
    /// End of the consolidation window after induction (ms).
    pub late_phase_ms: f64,
}

impl Default for LatePhasePlasticity {
    fn default() -> Self {
        Self {
            min_stimulation: LATE_PHASE_MIN_STIMULATION,
            early_phase_ms: 60_000.0,
            late_phase_ms: 3_600_000.0,
        }
    }
}

impl LatePhasePlasticity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consolidation factor `elapsed_ms` after an induction of
    /// `stimulation_strength`.
    pub fn factor(&self, stimulation_strength: f64, elapsed_ms: f64) -> f64 {
        if !stimulation_strength.is_finite() || !elapsed_ms.is_finite() {
            return 0.0;
        }
        if stimulation_strength < self.min_stimulation {
            return 0.0;
        }
        if self.late_phase_ms <= self.early_phase_ms
            || elapsed_ms < self.early_phase_ms
            || elapsed_ms > self.late_phase_ms
        {
            return 0.0;
        }
        let t = (elapsed_ms - self.early_phase_ms) / (self.late_phase_ms - self.early_phase_ms);
        4.0 * t * (1.0 - t)
    }
}

/// Synaptic tagging and capture: a strongly stimulated synapse sets a tag
/// that lets nearby synapses capture plasticity products for a limited time.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapticTagging {
    /// Spatial range within which products are captured.
    pub capture_radius: f64,
    /// How long after tagging capture remains possible (ms).
    pub consolidation_window_ms: f64,
}

impl Default for SynapticTagging {
    fn default() -> Self {
        Self {
            capture_radius: 50.0,
            consolidation_window_ms: 1_800_000.0,
        }
    }
}

impl SynapticTagging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture enhancement for a synapse `distance` away, `elapsed_ms`
    /// after the tag was set: `exp(−d/R) · (1 − t/W)` inside the window
    /// and radius, zero outside.
    pub fn enhancement(&self, distance: f64, elapsed_ms: f64) -> f64 {
        if !distance.is_finite() || !elapsed_ms.is_finite() {
            return 0.0;
        }
        if distance < 0.0 || self.capture_radius <= 0.0 || distance > self.capture_radius {
            return 0.0;
        }
        if self.consolidation_window_ms <= 0.0
            || elapsed_ms < 0.0
            || elapsed_ms > self.consolidation_window_ms
        {
            return 0.0;
        }
        (-distance / self.capture_radius).exp()
            * (1.0 - elapsed_ms / self.consolidation_window_ms)
    }
}
