//! The synapse engine: public contract, delivery, plasticity commits,
//! neuromodulation, and the pruning decision.
//!
//! A [`Synapse`] composes the five subsystems behind a single reader/writer
//! lock. All public operations take `&self`; the synapse is shared between
//! threads as-is. The vesicle release check runs before the engine lock is
//! taken (the controller commits pool state under its own lock), so the
//! stochastic work never extends the engine's critical section.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::{PlasticityConfig, PruningConfig, VesicleConfig};
use crate::error::{Result, SynapseError};
use crate::monitor::{ActivityMonitor, ActivityReport, ComponentScores, HealthIssue,
    TransmissionRecord};
use crate::neuromodulation::{
    EligibilityTrace, GabaState, ThresholdModifier, DEFAULT_ELIGIBILITY_DECAY_MS,
    ELIGIBILITY_TRACE_THRESHOLD, GABA_INHIBITION_SCALING,
    GABA_STRONG_CONCENTRATION_THRESHOLD, TRANSMISSION_ELIGIBILITY_CONTRIBUTION,
};
use crate::neurotransmitter::Ligand;
use crate::ring::BoundedRing;
use crate::signaling::{
    ExtracellularMatrix, Neuron, PlasticityAdjustment, PlasticityEvent, PlasticityEventType,
    SignalRecord, SynapseCallbacks,
};
use crate::stdp::{homeostatic_scaling_factor, Modulators, PlasticityCalculator, SpikePair};
use crate::vesicle::{VesicleController, VesicleDebugInfo, VesiclePoolState};

/// Floor of the effective pruning threshold.
pub const PRUNING_THRESHOLD_MIN: f64 = 0.001;
/// Ceiling of the effective pruning threshold.
pub const PRUNING_THRESHOLD_MAX: f64 = 0.5;
/// Recent activity within `inactivity_threshold / ACTIVITY_RESCUE_DIVISOR`
/// protects a synapse from pruning outright.
pub const ACTIVITY_RESCUE_DIVISOR: f64 = 10.0;

/// Inhibition level corresponding to a strong GABA concentration.
pub const STRONG_INHIBITION_LEVEL: f64 =
    GABA_STRONG_CONCENTRATION_THRESHOLD * GABA_INHIBITION_SCALING;
/// GABA exposures at or beyond this mark prolonged exposure.
pub const PROLONGED_GABA_EXPOSURES: u32 = 2;
/// Comparison slack for threshold tests on decayed quantities.
const FLOAT_EPSILON: f64 = 1e-9;

/// Pruning-threshold push per unit GABA concentration.
pub const GABA_PRUNING_PUSH: f64 = 0.01;
/// Pruning-threshold push per unit strong GABA concentration.
pub const GABA_STRONG_PRUNING_PUSH: f64 = 0.05;
/// Pruning protection per unit of above-baseline dopamine.
pub const DOPAMINE_PRUNING_PROTECTION: f64 = 0.02;
/// Pruning protection per unit serotonin concentration.
pub const SEROTONIN_PRUNING_PROTECTION: f64 = 0.005;
/// Pruning protection per unit glutamate concentration.
pub const GLUTAMATE_PRUNING_PROTECTION: f64 = 0.003;

/// Capacity of the pre/post spike-time rings.
pub const SPIKE_HISTORY_CAPACITY: usize = 64;

/// Lifecycle state of a synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseState {
    Active,
    Inactive,
    Dormant,
    ShuttingDown,
    Damaged,
    Failed,
}

impl std::fmt::Display for SynapseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SynapseState::Active => "Active",
            SynapseState::Inactive => "Inactive",
            SynapseState::Dormant => "Dormant",
            SynapseState::ShuttingDown => "ShuttingDown",
            SynapseState::Damaged => "Damaged",
            SynapseState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

struct EngineState {
    lifecycle: SynapseState,
    weight: f64,
    delay: Duration,
    last_transmission: Option<Instant>,
    last_plasticity: Option<Instant>,
    pre_spikes: BoundedRing<Instant>,
    post_spikes: BoundedRing<Instant>,
    calculator: PlasticityCalculator,
    eligibility: EligibilityTrace,
    gaba: GabaState,
    threshold_modifier: ThresholdModifier,
    delivery_failures: u64,
}

/// An autonomous chemical synapse between two neurons.
pub struct Synapse {
    id: String,
    pre: Arc<dyn Neuron>,
    post: Arc<dyn Neuron>,
    neurotransmitter: Ligand,
    matrix: Option<Arc<dyn ExtracellularMatrix>>,
    plasticity_config: PlasticityConfig,
    pruning_config: PruningConfig,
    initial_weight: f64,
    initial_delay: Duration,
    created_at: Instant,
    state: RwLock<EngineState>,
    vesicles: VesicleController,
    monitor: ActivityMonitor,
    callbacks: RwLock<SynapseCallbacks>,
    pruning_rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Synapse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synapse")
            .field("id", &self.id)
            .field("pre", &self.pre.id())
            .field("post", &self.post.id())
            .field("weight", &self.weight())
            .field("state", &self.state())
            .finish()
    }
}

impl Synapse {
    /// Start building a synapse between `pre` and `post`.
    pub fn builder(
        id: impl Into<String>,
        pre: Arc<dyn Neuron>,
        post: Arc<dyn Neuron>,
    ) -> SynapseBuilder {
        SynapseBuilder::new(id, pre, post)
    }

    /// A glutamatergic synapse with default parameters.
    pub fn excitatory(
        id: impl Into<String>,
        pre: Arc<dyn Neuron>,
        post: Arc<dyn Neuron>,
        weight: f64,
    ) -> Result<Synapse> {
        Self::builder(id, pre, post)
            .neurotransmitter(Ligand::Glutamate)
            .weight(weight)
            .build()
    }

    /// A GABAergic synapse with default parameters.
    pub fn inhibitory(
        id: impl Into<String>,
        pre: Arc<dyn Neuron>,
        post: Arc<dyn Neuron>,
        weight: f64,
    ) -> Result<Synapse> {
        Self::builder(id, pre, post)
            .neurotransmitter(Ligand::Gaba)
            .weight(weight)
            .build()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_callbacks(&self) -> std::sync::RwLockReadGuard<'_, SynapseCallbacks> {
        self.callbacks.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pre-synaptic neuron ID.
    pub fn pre_id(&self) -> &str {
        self.pre.id()
    }

    /// Post-synaptic neuron ID.
    pub fn post_id(&self) -> &str {
        self.post.id()
    }

    /// The species this synapse releases.
    pub fn neurotransmitter(&self) -> Ligand {
        self.neurotransmitter
    }

    /// Synapse position: the midpoint between its neurons.
    pub fn position(&self) -> Point3<f64> {
        nalgebra::center(&self.pre.position(), &self.post.position())
    }

    /// Install or replace the chemical-environment callbacks.
    pub fn set_callbacks(&self, callbacks: SynapseCallbacks) {
        *self.callbacks.write().unwrap_or_else(|e| e.into_inner()) = callbacks;
    }

    /// Current synaptic weight.
    pub fn weight(&self) -> f64 {
        self.read_state().weight
    }

    /// Set the weight, clamping into the configured range. A non-finite
    /// input collapses to the range midpoint. The change is recorded as a
    /// homeostatic plasticity event, annotated when clamping occurred.
    pub fn set_weight(&self, weight: f64) {
        let now = Instant::now();
        let mut state = self.write_state();
        let before = state.weight;
        let after = self.plasticity_config.clamp_weight(weight);
        state.weight = after;
        state.last_plasticity = Some(now);
        drop(state);

        let context = if weight.is_finite() && (weight - after).abs() > FLOAT_EPSILON {
            Some(format!("clamped from {weight}"))
        } else if !weight.is_finite() {
            Some("non-finite input replaced by range midpoint".to_string())
        } else {
            None
        };
        self.commit_event(PlasticityEvent {
            event_type: PlasticityEventType::Homeostatic,
            weight_before: before,
            weight_after: after,
            delta_weight: after - before,
            delta_t_ms: None,
            occurred_at: now,
            context,
        });
    }

    /// Base synaptic delay.
    pub fn delay(&self) -> Duration {
        self.read_state().delay
    }

    /// Set the base synaptic delay.
    pub fn set_delay(&self, delay: Duration) {
        self.write_state().delay = delay;
    }

    /// Lifecycle state.
    pub fn state(&self) -> SynapseState {
        self.read_state().lifecycle
    }

    /// Whether the synapse currently accepts operations.
    pub fn is_active(&self) -> bool {
        self.state() == SynapseState::Active
    }

    /// Take the synapse out of service.
    pub fn deactivate(&self) {
        self.write_state().lifecycle = SynapseState::Inactive;
    }

    /// Return an inactive or dormant synapse to service. Damaged and failed
    /// synapses stay where they are; recovery policy belongs to the caller.
    pub fn reactivate(&self) {
        let mut state = self.write_state();
        if matches!(
            state.lifecycle,
            SynapseState::Inactive | SynapseState::Dormant
        ) {
            state.lifecycle = SynapseState::Active;
        }
    }

    /// Put the synapse into low-activity dormancy; `reactivate` restores it.
    pub fn enter_dormancy(&self) {
        self.write_state().lifecycle = SynapseState::Dormant;
    }

    /// Begin an orderly shutdown; the synapse accepts no further operations.
    pub fn begin_shutdown(&self) {
        self.write_state().lifecycle = SynapseState::ShuttingDown;
    }

    /// Mark the synapse damaged after repeated collaborator failures.
    pub fn mark_damaged(&self) {
        self.write_state().lifecycle = SynapseState::Damaged;
    }

    /// Mark the synapse permanently failed.
    pub fn mark_failed(&self) {
        self.write_state().lifecycle = SynapseState::Failed;
    }

    /// Delivery failures observed since construction or reset.
    pub fn delivery_failures(&self) -> u64 {
        self.read_state().delivery_failures
    }

    /// Current eligibility trace value (decayed to now).
    pub fn eligibility_trace(&self) -> f64 {
        self.read_state().eligibility.value_at(Instant::now())
    }

    /// Current GABA inhibition (decayed to now).
    pub fn gaba_inhibition(&self) -> f64 {
        self.read_state().gaba.current_inhibition_at(Instant::now())
    }

    /// Vesicle pool snapshot.
    pub fn vesicle_pool_state(&self) -> VesiclePoolState {
        self.vesicles.pool_state()
    }

    /// Vesicle diagnostics.
    pub fn vesicle_debug_info(&self) -> VesicleDebugInfo {
        self.vesicles.debug_info()
    }

    /// Measured release rate (Hz).
    pub fn current_release_rate(&self) -> f64 {
        self.vesicles.current_release_rate()
    }

    /// Activity summary.
    pub fn activity_report(&self) -> ActivityReport {
        self.monitor.report_at(Instant::now())
    }

    /// Component health scores.
    pub fn component_scores(&self) -> ComponentScores {
        self.monitor.component_scores_at(Instant::now())
    }

    /// Detected health issues.
    pub fn health_issues(&self) -> Vec<HealthIssue> {
        self.monitor.issues_at(Instant::now())
    }

    /// Human-readable renderings of the detected health issues.
    pub fn describe_issues(&self) -> Vec<String> {
        self.monitor.describe_issues_at(Instant::now())
    }

    /// Discovered spike pairings within the STDP window.
    pub fn spike_pairs(&self) -> Vec<SpikePair> {
        self.read_state().calculator.pairs()
    }

    /// Transmit a pre-synaptic signal through this synapse.
    ///
    /// At most one message is delivered per call. On
    /// [`SynapseError::VesicleDepleted`] nothing is delivered and the only
    /// visible effect is release-rate bookkeeping. On success the delivered
    /// value is `signal × weight × (1 − inhibition)`, a pre-spike timestamp
    /// is appended, the eligibility trace receives its fixed contribution,
    /// and the optional neurotransmitter-release callback fires.
    pub fn transmit(&self, signal: f64) -> Result<()> {
        let started = Instant::now();

        if !signal.is_finite() {
            self.record_failed_transmission(started, signal, false, "non-finite signal");
            return Err(SynapseError::TransmissionFailed(
                "non-finite input signal".to_string(),
            ));
        }

        // Stochastic release check happens before the engine lock; the
        // controller commits its pool state atomically under its own lock.
        if !self.vesicles.try_release_at(started) {
            self.record_failed_transmission(started, signal, false, "vesicle depleted");
            return Err(SynapseError::VesicleDepleted);
        }

        let mut state = self.write_state();
        if state.lifecycle != SynapseState::Active {
            let lifecycle = state.lifecycle;
            drop(state);
            self.record_failed_transmission(started, signal, true, "synapse inactive");
            return Err(SynapseError::SynapseInactive(lifecycle.to_string()));
        }

        let callbacks = self.read_callbacks();

        // Pull the freshest calcium reading into the release controller so
        // subsequent release decisions see it.
        let calcium_level = match &callbacks.calcium_level {
            Some(probe) => {
                let level = probe();
                self.vesicles.set_calcium_level(level);
                if level.is_finite() {
                    level
                } else {
                    1.0
                }
            }
            None => 1.0,
        };

        let inhibition = state.gaba.current_inhibition_at(started);
        let effective_signal = signal * state.weight * (1.0 - inhibition);

        let base_delay = state.delay;
        let matrix_delay = match &self.matrix {
            Some(matrix) => matrix
                .enhance_synaptic_delay(self.pre.id(), self.post.id(), &self.id, base_delay)
                .max(base_delay),
            None => base_delay,
        };
        let environment_delay = callbacks
            .transmission_delay
            .as_ref()
            .map(|probe| probe())
            .unwrap_or(Duration::ZERO);
        let total_delay = matrix_delay + environment_delay;
        let spatial_delay = total_delay - base_delay;

        let record = SignalRecord {
            value: effective_signal,
            original_value: signal,
            effective_weight: state.weight,
            pre_spike_at: started,
            total_delay,
            synaptic_delay: base_delay,
            spatial_delay,
            source_id: self.pre.id().to_string(),
            target_id: self.post.id().to_string(),
            synapse_id: self.id.clone(),
            neurotransmitter: self.neurotransmitter,
            vesicle_released: true,
            calcium_level,
            learning_hint: None,
        };

        if let Some(release) = &callbacks.release_neurotransmitter {
            release(self.neurotransmitter, effective_signal.abs());
        }

        // Delivery: immediate for zero delay, otherwise delegated to the
        // pre-synaptic neuron's scheduler. No thread is ever spawned here.
        let delivery = if total_delay.is_zero() {
            match &callbacks.deliver_message {
                Some(deliver) => deliver(self.post.id(), &record),
                None => self.post.receive(record.clone()),
            }
        } else {
            self.pre
                .schedule_delayed_delivery(record.clone(), Arc::clone(&self.post), total_delay)
        };
        drop(callbacks);

        if let Err(err) = delivery {
            state.delivery_failures += 1;
            drop(state);
            self.record_failed_transmission(started, signal, true, "delivery rejected");
            return Err(SynapseError::TransmissionFailed(err.to_string()));
        }

        state.pre_spikes.push(started);
        Self::evict_expired_spikes(
            &mut state.pre_spikes,
            started,
            self.plasticity_config.window_size_ms,
        );
        state
            .eligibility
            .accumulate_at(TRANSMISSION_ELIGIBILITY_CONTRIBUTION, started);
        state.last_transmission = Some(started);
        drop(state);

        self.monitor.record_transmission(TransmissionRecord {
            at: started,
            success: true,
            vesicle_released: true,
            signal_strength: effective_signal,
            calcium_level,
            processing_time: started.elapsed(),
            error_kind: None,
        });
        trace!(
            synapse = %self.id,
            value = effective_signal,
            delay_ms = total_delay.as_secs_f64() * 1000.0,
            "signal transmitted"
        );
        Ok(())
    }

    fn record_failed_transmission(
        &self,
        at: Instant,
        signal: f64,
        vesicle_released: bool,
        error_kind: &str,
    ) {
        self.monitor.record_transmission(TransmissionRecord {
            at,
            success: false,
            vesicle_released,
            signal_strength: signal,
            calcium_level: 1.0,
            processing_time: at.elapsed(),
            error_kind: Some(error_kind.to_string()),
        });
    }

    fn evict_expired_spikes(ring: &mut BoundedRing<Instant>, now: Instant, window_ms: f64) {
        if window_ms <= 0.0 {
            return;
        }
        let window = Duration::try_from_secs_f64(window_ms / 1000.0).unwrap_or(Duration::MAX);
        if let Some(cutoff) = now.checked_sub(window) {
            ring.retain(|&t| t >= cutoff);
        }
    }

    /// Apply a spike-timing-based plasticity adjustment.
    ///
    /// With STDP disabled this is an accepted no-op. Otherwise the
    /// calculator's change is clamped into the weight range, committed, and
    /// recorded; the raw STDP shape (without learning-rate scaling) is
    /// accumulated into the eligibility trace so the Δt sign is preserved.
    pub fn apply_plasticity(&self, adjustment: &PlasticityAdjustment) -> Result<()> {
        let now = Instant::now();
        let mut state = self.write_state();
        if state.lifecycle != SynapseState::Active {
            return Err(SynapseError::SynapseInactive(state.lifecycle.to_string()));
        }
        if !self.plasticity_config.enabled {
            return Ok(());
        }

        if let Some(train) = &adjustment.pre_spike_train_ms {
            for &t in train {
                state.calculator.note_pre_spike(t);
            }
        }
        if let Some(train) = &adjustment.post_spike_train_ms {
            for &t in train {
                state.calculator.note_post_spike(t);
            }
        }
        state.post_spikes.push(now);
        Self::evict_expired_spikes(
            &mut state.post_spikes,
            now,
            self.plasticity_config.window_size_ms,
        );

        let modulation = state.gaba.stdp_modulation_at(now);
        let modulators = Modulators {
            stdp_modulation: Some(modulation),
            ..Default::default()
        };
        let weight = state.weight;
        let delta = state.calculator.weight_change(
            adjustment.delta_t_ms,
            weight,
            adjustment.learning_rate_override,
            &modulators,
        );

        let before = state.weight;
        let target = before + delta;
        let after = self.plasticity_config.clamp_weight(target);
        state.weight = after;

        let shape = state
            .calculator
            .stdp_shape(adjustment.delta_t_ms, Some(modulation));
        state.eligibility.accumulate_at(shape, now);
        state.last_plasticity = Some(now);
        drop(state);

        // Null outcomes (out-of-window, degenerate constants) are not worth
        // an event unless the caller insists.
        if delta == 0.0 && !adjustment.force_update {
            return Ok(());
        }

        let context = if (target - after).abs() > FLOAT_EPSILON {
            Some(format!("clamped from {target}"))
        } else {
            adjustment
                .modulator_hint
                .map(|ligand| format!("modulator hint: {ligand:?}"))
        };
        self.commit_event(PlasticityEvent {
            event_type: adjustment.event_type.unwrap_or(PlasticityEventType::Stdp),
            weight_before: before,
            weight_after: after,
            delta_weight: after - before,
            delta_t_ms: Some(adjustment.delta_t_ms),
            occurred_at: now,
            context,
        });
        Ok(())
    }

    /// Combine the eligibility trace with a ligand-specific modulation
    /// factor into a weight change (the three-factor rule).
    ///
    /// GABA always additionally raises inhibition and long-term weakening,
    /// strengthens its STDP modulation, and pushes the pruning threshold up;
    /// dopamine above baseline, serotonin, and glutamate protect against
    /// pruning. Returns the actually applied weight change (zero when the
    /// trace is below threshold, the synapse is not active, or the
    /// concentration is not finite).
    pub fn process_neuromodulation(&self, ligand: Ligand, concentration: f64) -> f64 {
        let now = Instant::now();
        if !concentration.is_finite() {
            return 0.0;
        }
        let mut state = self.write_state();
        if state.lifecycle != SynapseState::Active {
            return 0.0;
        }

        let eligibility = state.eligibility.value_at(now);
        let factor = ligand.modulation_factor(concentration);

        match ligand {
            Ligand::Gaba => {
                let weight = state.weight;
                state.gaba.apply_exposure_at(concentration, weight, now);
                let push = if concentration >= GABA_STRONG_CONCENTRATION_THRESHOLD {
                    GABA_STRONG_PRUNING_PUSH
                } else {
                    GABA_PRUNING_PUSH
                };
                state
                    .threshold_modifier
                    .adjust_at(push * concentration, now);
            }
            Ligand::Dopamine if concentration > 1.0 => {
                state
                    .threshold_modifier
                    .adjust_at(-DOPAMINE_PRUNING_PROTECTION * (concentration - 1.0), now);
            }
            Ligand::Serotonin => {
                state
                    .threshold_modifier
                    .adjust_at(-SEROTONIN_PRUNING_PROTECTION * concentration, now);
            }
            Ligand::Glutamate => {
                state
                    .threshold_modifier
                    .adjust_at(-GLUTAMATE_PRUNING_PROTECTION * concentration, now);
            }
            _ => {}
        }

        let mut applied = 0.0;
        let committed = eligibility.abs() >= ELIGIBILITY_TRACE_THRESHOLD;
        let before = state.weight;
        if committed {
            let delta = self.plasticity_config.learning_rate * eligibility * factor;
            let after = self.plasticity_config.clamp_weight(before + delta);
            state.weight = after;
            applied = after - before;
            state.last_plasticity = Some(now);
        }
        drop(state);

        if committed {
            let event_type = match ligand {
                Ligand::Dopamine => PlasticityEventType::Reward,
                Ligand::Gaba => PlasticityEventType::Punishment,
                _ => PlasticityEventType::Modulation,
            };
            self.commit_event(PlasticityEvent {
                event_type,
                weight_before: before,
                weight_after: before + applied,
                delta_weight: applied,
                delta_t_ms: None,
                occurred_at: now,
                context: Some(format!("{ligand:?} at {concentration}")),
            });
        }
        debug!(
            synapse = %self.id,
            ?ligand,
            concentration,
            eligibility,
            applied,
            "neuromodulation processed"
        );
        applied
    }

    /// Scale the weight toward a target activity level.
    ///
    /// The factor is `clamp(1 + rate·(target/current − 1), 0.5, 2.0)` with
    /// the current activity taken from the monitor.
    pub fn apply_homeostatic_scaling(&self, scaling_rate: f64, target_rate_hz: f64) -> f64 {
        let now = Instant::now();
        let current = self.monitor.activity_level_at(now);
        let factor = homeostatic_scaling_factor(scaling_rate, target_rate_hz, current);

        let mut state = self.write_state();
        if state.lifecycle != SynapseState::Active {
            return 0.0;
        }
        let before = state.weight;
        let after = self.plasticity_config.clamp_weight(before * factor);
        state.weight = after;
        if after != before {
            state.last_plasticity = Some(now);
        }
        drop(state);

        if after != before {
            self.commit_event(PlasticityEvent {
                event_type: PlasticityEventType::Homeostatic,
                weight_before: before,
                weight_after: after,
                delta_weight: after - before,
                delta_t_ms: None,
                occurred_at: now,
                context: Some(format!("scaling factor {factor}")),
            });
        }
        after - before
    }

    /// Apply the frequency-dependent (BCM) rule for a stimulation episode.
    pub fn apply_frequency_plasticity(&self, frequency_hz: f64, duration: Duration) -> f64 {
        let now = Instant::now();
        let mut state = self.write_state();
        if state.lifecycle != SynapseState::Active {
            return 0.0;
        }
        let weight = state.weight;
        let delta = state.calculator.frequency_change(
            frequency_hz,
            duration,
            weight,
            &Modulators::default(),
        );
        if delta == 0.0 {
            return 0.0;
        }
        let before = state.weight;
        let after = self.plasticity_config.clamp_weight(before + delta);
        state.weight = after;
        state.last_plasticity = Some(now);
        drop(state);

        self.commit_event(PlasticityEvent {
            event_type: PlasticityEventType::Stdp,
            weight_before: before,
            weight_after: after,
            delta_weight: after - before,
            delta_t_ms: None,
            occurred_at: now,
            context: Some(format!("frequency {frequency_hz} Hz")),
        });
        after - before
    }

    fn commit_event(&self, event: PlasticityEvent) {
        if let Some(report) = &self.read_callbacks().report_plasticity {
            report(&event);
        }
        self.monitor.snapshot_weight(event.occurred_at, event.weight_after);
        self.monitor.record_plasticity(event);
    }

    /// Decide whether this synapse should be structurally eliminated.
    ///
    /// The decision combines effective weight (weight minus long-term GABA
    /// weakening) against the modifier-shifted threshold, inactivity,
    /// current inhibition, and prolonged GABA exposure. Recent activity
    /// rescues the synapse outright; actual removal is the owning neuron's
    /// responsibility.
    pub fn should_prune(&self) -> bool {
        if !self.pruning_config.enabled {
            return false;
        }
        let now = Instant::now();
        if let Some(protection) = self.pruning_config.protection_period {
            if now.saturating_duration_since(self.created_at) < protection {
                return false;
            }
        }

        let state = self.read_state();
        let last_activity = match (state.last_transmission, state.last_plasticity) {
            (Some(t), Some(p)) => Some(t.max(p)),
            (Some(t), None) => Some(t),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        }
        .unwrap_or(self.created_at);
        let idle = now.saturating_duration_since(last_activity);

        // Recent activity protects regardless of weight.
        let rescue_window = self
            .pruning_config
            .inactivity_threshold
            .div_f64(ACTIVITY_RESCUE_DIVISOR);
        if idle < rescue_window {
            return false;
        }

        let modifier = state.threshold_modifier.value_at(now);
        let effective_threshold = (self.pruning_config.weight_threshold + modifier)
            .clamp(PRUNING_THRESHOLD_MIN, PRUNING_THRESHOLD_MAX);
        let effective_weight = state.weight - state.gaba.long_term_weakening_at(now);
        let inhibition = state.gaba.current_inhibition_at(now);
        let exposures = state.gaba.exposure_count();
        drop(state);

        let strongly_weak = effective_weight < effective_threshold * 0.5;
        let weak_and_inactive = effective_weight < effective_threshold
            && idle > self.pruning_config.inactivity_threshold;
        let gaba_suppressed = inhibition + FLOAT_EPSILON >= STRONG_INHIBITION_LEVEL
            && effective_weight < effective_threshold * 1.5;
        let gaba_worn = exposures >= PROLONGED_GABA_EXPOSURES
            && effective_weight < effective_threshold * 1.5;
        let metabolically_starved = match self.pruning_config.metabolic_threshold {
            Some(threshold) => {
                effective_weight < effective_threshold
                    && self.monitor.component_scores_at(now).metabolic_efficiency < threshold
            }
            None => false,
        };

        let verdict = strongly_weak
            || weak_and_inactive
            || gaba_suppressed
            || gaba_worn
            || metabolically_starved;
        if !verdict {
            return false;
        }

        let verdict = if self.pruning_config.pruning_probability >= 1.0 {
            true
        } else {
            let mut rng = self.pruning_rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen::<f64>() <= self.pruning_config.pruning_probability
        };
        if verdict {
            debug!(
                synapse = %self.id,
                effective_weight,
                effective_threshold,
                idle_ms = idle.as_millis() as u64,
                "synapse marked for pruning"
            );
        }
        verdict
    }

    /// Return all dynamic state to its initialization values, preserving
    /// configuration: weight and delay back to their construction values,
    /// histories and counters cleared, traces and modulations zeroed,
    /// sliding threshold back to baseline, pools refilled, state Active.
    pub fn reset(&self) {
        let now = Instant::now();
        let mut state = self.write_state();
        state.lifecycle = SynapseState::Active;
        state.weight = self.initial_weight;
        state.delay = self.initial_delay;
        state.last_transmission = None;
        state.last_plasticity = None;
        state.pre_spikes.clear();
        state.post_spikes.clear();
        state.calculator.reset();
        state.eligibility.reset(now);
        state.gaba.reset(now);
        state.threshold_modifier.reset(now);
        state.delivery_failures = 0;
        drop(state);

        self.vesicles.reset();
        self.monitor.reset();
        debug!(synapse = %self.id, "synapse reset");
    }

    /// The BCM sliding threshold (1.0 at baseline; see `reset`).
    pub fn metaplasticity_threshold(&self) -> f64 {
        self.read_state().calculator.sliding_threshold()
    }

    /// Health score in `[0, 1]`.
    pub fn health_score(&self) -> f64 {
        self.monitor.health_score_at(Instant::now())
    }

    /// The plasticity configuration this synapse was built with.
    pub fn plasticity_config(&self) -> &PlasticityConfig {
        &self.plasticity_config
    }

    /// The pruning configuration this synapse was built with.
    pub fn pruning_config(&self) -> &PruningConfig {
        &self.pruning_config
    }
}

/// Fluent constructor for [`Synapse`].
pub struct SynapseBuilder {
    id: String,
    pre: Arc<dyn Neuron>,
    post: Arc<dyn Neuron>,
    weight: f64,
    delay: Duration,
    neurotransmitter: Ligand,
    plasticity: PlasticityConfig,
    pruning: PruningConfig,
    vesicles: VesicleConfig,
    matrix: Option<Arc<dyn ExtracellularMatrix>>,
    eligibility_decay_ms: f64,
    seed: Option<u64>,
}

impl SynapseBuilder {
    pub fn new(id: impl Into<String>, pre: Arc<dyn Neuron>, post: Arc<dyn Neuron>) -> Self {
        Self {
            id: id.into(),
            pre,
            post,
            weight: 0.5,
            delay: Duration::from_millis(1),
            neurotransmitter: Ligand::Glutamate,
            plasticity: PlasticityConfig::default(),
            pruning: PruningConfig::default(),
            vesicles: VesicleConfig::default(),
            matrix: None,
            eligibility_decay_ms: DEFAULT_ELIGIBILITY_DECAY_MS,
            seed: None,
        }
    }

    /// Initial weight (clamped into the plasticity range at build time).
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Base synaptic delay.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Released species.
    pub fn neurotransmitter(mut self, ligand: Ligand) -> Self {
        self.neurotransmitter = ligand;
        self
    }

    /// STDP parameters.
    pub fn plasticity_config(mut self, config: PlasticityConfig) -> Self {
        self.plasticity = config;
        self
    }

    /// Pruning parameters.
    pub fn pruning_config(mut self, config: PruningConfig) -> Self {
        self.pruning = config;
        self
    }

    /// Vesicle-release parameters.
    pub fn vesicle_config(mut self, config: VesicleConfig) -> Self {
        self.vesicles = config;
        self
    }

    /// Attach an extracellular-matrix collaborator.
    pub fn matrix(mut self, matrix: Arc<dyn ExtracellularMatrix>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Eligibility-trace decay time constant (ms).
    pub fn eligibility_decay_ms(mut self, decay_ms: f64) -> Self {
        self.eligibility_decay_ms = decay_ms;
        self
    }

    /// Seed all stochastic behavior for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configurations and construct the synapse.
    ///
    /// Correctable parameter problems are fixed to defaults (and logged);
    /// irrecoverable ones return [`SynapseError::InvalidConfiguration`].
    pub fn build(self) -> Result<Synapse> {
        if self.id.is_empty() {
            return Err(SynapseError::InvalidConfiguration(
                "synapse id must not be empty".to_string(),
            ));
        }
        let (plasticity, _) = self.plasticity.validated()?;
        let (pruning, _) = self.pruning.validated()?;
        let (vesicle_config, _) = self.vesicles.validated()?;

        let weight = plasticity.clamp_weight(self.weight);
        let now = Instant::now();
        let vesicles = match self.seed {
            Some(seed) => VesicleController::with_seed(vesicle_config, seed),
            None => VesicleController::new(vesicle_config),
        };
        let pruning_rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };

        Ok(Synapse {
            state: RwLock::new(EngineState {
                lifecycle: SynapseState::Active,
                weight,
                delay: self.delay,
                last_transmission: None,
                last_plasticity: None,
                pre_spikes: BoundedRing::new(SPIKE_HISTORY_CAPACITY),
                post_spikes: BoundedRing::new(SPIKE_HISTORY_CAPACITY),
                calculator: PlasticityCalculator::new(plasticity.clone()),
                eligibility: EligibilityTrace::new(self.eligibility_decay_ms, now),
                gaba: GabaState::new(now),
                threshold_modifier: ThresholdModifier::new(now),
                delivery_failures: 0,
            }),
            id: self.id,
            pre: self.pre,
            post: self.post,
            neurotransmitter: self.neurotransmitter,
            matrix: self.matrix,
            plasticity_config: plasticity,
            pruning_config: pruning,
            initial_weight: weight,
            initial_delay: self.delay,
            created_at: now,
            vesicles,
            monitor: ActivityMonitor::new(),
            callbacks: RwLock::new(SynapseCallbacks::default()),
            pruning_rng: Mutex::new(pruning_rng),
        })
    }
}
