//! # Synapse Engine
//!
//! A concurrent, biologically realistic chemical synapse engine for spiking
//! neural simulations.
//!
//! ## Overview
//!
//! Each [`Synapse`] is an autonomous, thread-safe state machine between two
//! neurons that:
//!
//! - **Transmits** weighted, delayed signals, gated by a stochastic
//!   three-pool vesicle controller (ready/recycling/reserve) with calcium
//!   enhancement, fatigue, and a per-synapse release-rate limit
//! - **Adapts** its weight through spike-timing-dependent plasticity with
//!   weight dependence, neuromodulatory gating, developmental scaling, and
//!   a BCM-style metaplasticity sliding threshold
//! - **Learns from chemistry** via a decaying eligibility trace combined
//!   with ligand-specific modulation (the three-factor rule), with GABA in
//!   a dual inhibitory/penalty role
//! - **Monitors itself**: reliability, activity rate, health scoring,
//!   issue detection, and trend analysis
//! - **Participates in structural plasticity**: a pruning decision built
//!   from weight, inactivity, and chemical context
//!
//! The engine owns no threads and performs no I/O. Delayed delivery is
//! delegated to the pre-synaptic neuron's scheduler; every decaying
//! quantity (eligibility, inhibition, fatigue, threshold modifiers) is
//! decayed lazily at read time.
//!
//! ## Example: transmission and STDP
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use synapse_engine::{Neuron, PlasticityAdjustment, SignalRecord, Synapse};
//!
//! # use std::sync::Mutex;
//! # struct MockNeuron { id: String, received: Mutex<Vec<SignalRecord>> }
//! # impl MockNeuron {
//! #     fn new(id: &str) -> Arc<Self> {
//! #         Arc::new(Self { id: id.to_string(), received: Mutex::new(Vec::new()) })
//! #     }
//! # }
//! # impl Neuron for MockNeuron {
//! #     fn id(&self) -> &str { &self.id }
//! #     fn position(&self) -> nalgebra::Point3<f64> { nalgebra::Point3::origin() }
//! #     fn receive(&self, signal: SignalRecord) -> synapse_engine::Result<()> {
//! #         self.received.lock().unwrap().push(signal);
//! #         Ok(())
//! #     }
//! #     fn schedule_delayed_delivery(
//! #         &self,
//! #         signal: SignalRecord,
//! #         _target: Arc<dyn Neuron>,
//! #         _delay: Duration,
//! #     ) -> synapse_engine::Result<()> {
//! #         self.received.lock().unwrap().push(signal);
//! #         Ok(())
//! #     }
//! # }
//! # fn main() -> synapse_engine::Result<()> {
//! let pre = MockNeuron::new("pre");
//! let post = MockNeuron::new("post");
//!
//! let synapse = Synapse::builder("syn-0", pre, post)
//!     .weight(0.5)
//!     .delay(Duration::ZERO)
//!     .seed(42)
//!     .build()?;
//!
//! // A pre-synaptic spike; vesicle release is stochastic.
//! let _ = synapse.transmit(1.0);
//!
//! // Causal pairing (pre fires 10 ms before post) potentiates.
//! synapse.apply_plasticity(&PlasticityAdjustment::from_delta_t(-10.0))?;
//! assert!(synapse.weight() > 0.5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: three-factor learning
//!
//! Timing builds an eligibility trace; a later dopamine burst converts it
//! into a weight change:
//!
//! ```text
//! for _ in 0..10 {
//!     synapse.apply_plasticity(&PlasticityAdjustment::from_delta_t(-10.0))?;
//! }
//! let applied = synapse.process_neuromodulation(Ligand::Dopamine, 2.0);
//! assert!(applied > 0.0);
//! ```
//!
//! ## Biophysical background
//!
//! ### STDP window
//!
//! With Δt = t_pre − t_post (negative = causal):
//!
//! ```text
//! Δw =  η · exp(Δt/τ)        for −W < Δt < 0   (LTP)
//! Δw = −η · α · exp(−Δt/τ)   for  0 < Δt < W   (LTD)
//! ```
//!
//! ### Vesicle release
//!
//! Release probability combines the baseline with calcium enhancement,
//! fatigue, and ready-pool depletion:
//!
//! ```text
//! p = p₀ · ca · (1 − fatigue) · (1 − depletion)
//! ```
//!
//! Released vesicles recycle along a fast (~70 %) or slow pathway before
//! returning to the ready pool; the reserve pool refills a depleted ready
//! pool during quiescence.
//!
//! ### Three-factor rule
//!
//! ```text
//! Δw = η · E(t) · M(ligand, c)
//! ```
//!
//! where `E` is the decayed eligibility trace and `M` the ligand-specific
//! modulation factor (dopamine: `c − 1`; GABA: `−c`; serotonin: `0.2c`;
//! glutamate: `0.1c`).
//!
//! ## Concurrency
//!
//! One reader/writer lock per synapse, fine-grained internal locks inside
//! the vesicle controller and activity monitor, no locks shared across
//! synapses, no background threads. The stochastic release check commits
//! under the controller's own lock before the engine lock is taken.
//! Randomness is injected and seedable for reproducible simulations.
//!
//! ## References
//!
//! - Bi & Poo (1998). Synaptic modifications in cultured hippocampal
//!   neurons: dependence on spike timing, synaptic strength, and
//!   postsynaptic cell type.
//! - Bienenstock, Cooper & Munro (1982). Theory for the development of
//!   neuron selectivity.
//! - Rizzoli & Betz (2005). Synaptic vesicle pools.
//! - Frémaux & Gerstner (2016). Neuromodulated spike-timing-dependent
//!   plasticity, and theory of three-factor learning rules.

pub mod config;
pub mod error;
pub mod monitor;
pub mod neuromodulation;
pub mod neurotransmitter;
pub mod ring;
pub mod signaling;
pub mod stdp;
pub mod synapse;
pub mod vesicle;

#[cfg(test)]
mod testutil;

// Re-export the public surface.
pub use config::{ConfigWarning, PlasticityConfig, PruningConfig, VesicleConfig};
pub use error::{Result, SynapseError};
pub use monitor::{
    ActivityMonitor, ActivityReport, ActivityTrend, ComponentScores, HealthIssue,
};
pub use neuromodulation::StdpModulation;
pub use neurotransmitter::{Ligand, LigandClass};
pub use signaling::{
    ExtracellularMatrix, Neuron, PlasticityAdjustment, PlasticityEvent, PlasticityEventType,
    SignalRecord, SynapseCallbacks,
};
pub use stdp::{
    HeterosynapticRule, LatePhasePlasticity, Modulators, NeuromodulatorLevels,
    PlasticityCalculator, SpikePair, SynapticTagging,
};
pub use synapse::{Synapse, SynapseBuilder, SynapseState};
pub use vesicle::{
    RecyclingPathway, ReleaseEvent, VesicleController, VesicleDebugInfo, VesiclePoolState,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::testutil::StubNeuron;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> (Synapse, Arc<StubNeuron>, Arc<StubNeuron>) {
        let pre = StubNeuron::new("pre", [0.0, 0.0, 0.0]);
        let post = StubNeuron::new("post", [10.0, 0.0, 0.0]);
        let synapse = Synapse::builder("syn", pre.clone(), post.clone())
            .weight(0.5)
            .delay(Duration::ZERO)
            .vesicle_config(VesicleConfig {
                baseline_release_probability: 1.0,
                max_release_rate_hz: 200.0,
                ..Default::default()
            })
            .seed(21)
            .build()
            .unwrap();
        synapse.set_callbacks(SynapseCallbacks {
            calcium_level: Some(Box::new(|| 2.0)),
            ..Default::default()
        });
        (synapse, pre, post)
    }

    #[test]
    fn test_transmission_feeds_monitoring_and_eligibility() {
        let (synapse, _pre, post) = engine();
        for _ in 0..5 {
            synapse.transmit(1.0).unwrap();
        }
        assert_eq!(post.received_count(), 5);

        let report = synapse.activity_report();
        assert_eq!(report.total_transmissions, 5);
        assert_eq!(report.successful_transmissions, 5);
        assert_eq!(report.reliability, 1.0);
        assert!(synapse.eligibility_trace() > 0.5);
        assert!(synapse.health_score() > 0.9);
    }

    #[test]
    fn test_gaba_dominates_dopamine() {
        let (synapse, _pre, post) = engine();
        // Build positive eligibility through causal pairings.
        for _ in 0..10 {
            synapse
                .apply_plasticity(&PlasticityAdjustment::from_delta_t(-10.0))
                .unwrap();
        }

        let rewarded = synapse.process_neuromodulation(Ligand::Dopamine, 2.0);
        let punished = synapse.process_neuromodulation(Ligand::Gaba, 1.5);
        assert!(rewarded > 0.0);
        assert!(punished < 0.0);
        assert!(punished.abs() > rewarded.abs());
        assert!(synapse.gaba_inhibition() > 0.0);

        // The inhibited synapse delivers strictly less.
        synapse.transmit(1.0).unwrap();
        let value = post.last_received().unwrap().value;
        assert!(value < synapse.weight());
    }

    #[test]
    fn test_burst_depletes_and_recovers() {
        let pre = StubNeuron::new("pre", [0.0, 0.0, 0.0]);
        let post = StubNeuron::new("post", [1.0, 0.0, 0.0]);
        let synapse = Synapse::builder("syn", pre, post)
            .delay(Duration::ZERO)
            .vesicle_config(VesicleConfig {
                ready_pool_size: 20,
                reserve_pool_size: 0,
                max_release_rate_hz: 200.0,
                ..Default::default()
            })
            .seed(5)
            .build()
            .unwrap();

        let attempts = 40;
        let mut succeeded = 0;
        for _ in 0..attempts {
            if synapse.transmit(1.0).is_ok() {
                succeeded += 1;
            }
        }
        assert!(succeeded > 0);
        assert!(succeeded < attempts);
        assert!(synapse.vesicle_pool_state().ready < 20);

        // Quiescence lets recycling restore the ready pool.
        std::thread::sleep(Duration::from_millis(600));
        assert_eq!(synapse.vesicle_pool_state().ready, 20);
    }

    #[test]
    fn test_weight_stays_bounded_under_mixed_workload() {
        let (synapse, _pre, _post) = engine();
        let config = synapse.plasticity_config().clone();
        for i in 0..50 {
            let _ = synapse.transmit(1.0);
            let delta_t = if i % 2 == 0 { -5.0 } else { 15.0 };
            synapse
                .apply_plasticity(&PlasticityAdjustment::from_delta_t(delta_t))
                .unwrap();
            let ligand = if i % 3 == 0 {
                Ligand::Dopamine
            } else {
                Ligand::Gaba
            };
            synapse.process_neuromodulation(ligand, 1.0 + (i % 4) as f64 * 0.5);

            let weight = synapse.weight();
            assert!(weight >= config.min_weight && weight <= config.max_weight);
            assert!(weight.is_finite());
        }
    }
}
