//! Collaborator interfaces and the messages that cross them.
//!
//! The engine never owns its neurons: it holds non-owning trait-object
//! handles supplying identity, position, and delivery. The extracellular
//! matrix and the chemical environment are optional collaborators injected
//! the same way.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::Point3;

use crate::error::Result;
use crate::neurotransmitter::Ligand;

/// A neuron as seen from one of its synapses.
///
/// Implementations must be thread-safe: many synapses may call into the same
/// neuron concurrently. Delayed delivery is the neuron's responsibility; the
/// synapse never spawns threads or timers.
pub trait Neuron: Send + Sync {
    /// Stable identifier.
    fn id(&self) -> &str;

    /// Soma position in space.
    fn position(&self) -> Point3<f64>;

    /// Immediate delivery of a synaptic signal.
    fn receive(&self, signal: SignalRecord) -> Result<()>;

    /// Deferred delivery of a synaptic signal after `delay`.
    fn schedule_delayed_delivery(
        &self,
        signal: SignalRecord,
        target: Arc<dyn Neuron>,
        delay: Duration,
    ) -> Result<()>;
}

/// Spatial delay enhancement supplied by the extracellular matrix.
pub trait ExtracellularMatrix: Send + Sync {
    /// Total transmission delay for a message, at least `base_delay`.
    fn enhance_synaptic_delay(
        &self,
        pre_id: &str,
        post_id: &str,
        synapse_id: &str,
        base_delay: Duration,
    ) -> Duration;
}

/// A transmitted signal as delivered to the post-synaptic neuron.
#[derive(Debug, Clone)]
pub struct SignalRecord {
    /// Delivered value: post-weight, post-inhibition.
    pub value: f64,
    /// The raw pre-synaptic input.
    pub original_value: f64,
    /// Weight in effect at transmission time.
    pub effective_weight: f64,
    /// When the pre-synaptic spike entered the synapse.
    pub pre_spike_at: Instant,
    /// Full delivery delay (synaptic + spatial).
    pub total_delay: Duration,
    /// Base synaptic delay component.
    pub synaptic_delay: Duration,
    /// Spatial component added by the extracellular matrix.
    pub spatial_delay: Duration,
    /// Pre-synaptic neuron ID.
    pub source_id: String,
    /// Post-synaptic neuron ID.
    pub target_id: String,
    /// Originating synapse ID.
    pub synapse_id: String,
    /// Species released for this message.
    pub neurotransmitter: Ligand,
    /// Whether a vesicle fused for this message (always true on delivery).
    pub vesicle_released: bool,
    /// Pre-synaptic calcium level at release time.
    pub calcium_level: f64,
    /// Optional learning-context hint for the receiver.
    pub learning_hint: Option<String>,
}

/// Category of a recorded plasticity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlasticityEventType {
    /// Timing-driven change (STDP or frequency rule).
    Stdp,
    /// Positive neuromodulated change.
    Reward,
    /// Negative neuromodulated change.
    Punishment,
    /// Scaling toward a target activity level, including direct SetWeight.
    Homeostatic,
    /// Any other modulatory change.
    Modulation,
}

/// A committed weight change and its context.
#[derive(Debug, Clone)]
pub struct PlasticityEvent {
    pub event_type: PlasticityEventType,
    pub weight_before: f64,
    pub weight_after: f64,
    /// The applied (post-clamp) change.
    pub delta_weight: f64,
    /// Spike-timing difference for timing-driven events (ms, pre − post).
    pub delta_t_ms: Option<f64>,
    pub occurred_at: Instant,
    /// Free-form context, e.g. a clamp annotation or the triggering ligand.
    pub context: Option<String>,
}

/// A plasticity request from the post-synaptic neuron.
#[derive(Debug, Clone, Default)]
pub struct PlasticityAdjustment {
    /// `t_pre − t_post` in milliseconds; negative is causal.
    pub delta_t_ms: f64,
    /// Optional pre-synaptic spike train (ms timestamps on the caller's
    /// clock) for pair discovery.
    pub pre_spike_train_ms: Option<Vec<f64>>,
    /// Optional post-synaptic spike train (same clock as the pre train).
    pub post_spike_train_ms: Option<Vec<f64>>,
    /// Per-call learning-rate override.
    pub learning_rate_override: Option<f64>,
    /// Neuromodulator context hint.
    pub modulator_hint: Option<Ligand>,
    /// Event classification override.
    pub event_type: Option<PlasticityEventType>,
    /// Apply even when the computed change is negligible.
    pub force_update: bool,
}

impl PlasticityAdjustment {
    /// Adjustment carrying only a spike-timing difference.
    pub fn from_delta_t(delta_t_ms: f64) -> Self {
        Self {
            delta_t_ms,
            ..Default::default()
        }
    }
}

/// Best-effort chemical-environment callbacks, injected via
/// [`crate::Synapse::set_callbacks`].
///
/// Every field is optional; an absent callback simply disables that
/// integration point. Callbacks may be invoked while the synapse lock is
/// held, so they must never call back into the same synapse.
#[derive(Default)]
pub struct SynapseCallbacks {
    /// Current pre-synaptic calcium level.
    pub calcium_level: Option<Box<dyn Fn() -> f64 + Send + Sync>>,
    /// Immediate message delivery, replacing the direct `Neuron::receive`
    /// path when present.
    pub deliver_message: Option<Box<dyn Fn(&str, &SignalRecord) -> Result<()> + Send + Sync>>,
    /// Notification that neurotransmitter was released into the cleft.
    pub release_neurotransmitter: Option<Box<dyn Fn(Ligand, f64) + Send + Sync>>,
    /// Extra environment-imposed transmission delay.
    pub transmission_delay: Option<Box<dyn Fn() -> Duration + Send + Sync>>,
    /// Observation hook for committed plasticity events.
    pub report_plasticity: Option<Box<dyn Fn(&PlasticityEvent) + Send + Sync>>,
}

impl fmt::Debug for SynapseCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynapseCallbacks")
            .field("calcium_level", &self.calcium_level.is_some())
            .field("deliver_message", &self.deliver_message.is_some())
            .field(
                "release_neurotransmitter",
                &self.release_neurotransmitter.is_some(),
            )
            .field("transmission_delay", &self.transmission_delay.is_some())
            .field("report_plasticity", &self.report_plasticity.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_from_delta_t() {
        let adj = PlasticityAdjustment::from_delta_t(-10.0);
        assert_eq!(adj.delta_t_ms, -10.0);
        assert!(adj.learning_rate_override.is_none());
        assert!(!adj.force_update);
    }

    #[test]
    fn test_callbacks_debug_reports_presence() {
        let callbacks = SynapseCallbacks {
            calcium_level: Some(Box::new(|| 1.0)),
            ..Default::default()
        };
        let text = format!("{callbacks:?}");
        assert!(text.contains("calcium_level: true"));
        assert!(text.contains("deliver_message: false"));
    }
}
