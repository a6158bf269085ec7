//! Property-based invariant tests for the synapse engine.

mod common;

use std::time::{Duration, Instant};

use common::StubNeuron;
use proptest::prelude::*;
use synapse_engine::{
    Ligand, Modulators, PlasticityAdjustment, PlasticityCalculator, PlasticityConfig, Synapse,
    VesicleConfig,
};

fn reference_config() -> PlasticityConfig {
    PlasticityConfig {
        learning_rate: 0.01,
        time_constant_ms: 20.0,
        window_size_ms: 100.0,
        min_weight: 0.001,
        max_weight: 2.0,
        asymmetry_ratio: 1.2,
        ..Default::default()
    }
}

fn build_synapse(seed: u64) -> Synapse {
    let pre = StubNeuron::new("pre");
    let post = StubNeuron::new("post");
    Synapse::builder("prop", pre, post)
        .weight(0.5)
        .delay(Duration::ZERO)
        .plasticity_config(reference_config())
        .seed(seed)
        .build()
        .unwrap()
}

proptest! {
    /// `SetWeight(x)` then `GetWeight()` returns `clamp(x, min, max)`, and
    /// never a non-finite value.
    #[test]
    fn prop_set_weight_clamp_idempotent(weight in prop::num::f64::ANY) {
        let synapse = build_synapse(1);
        let config = reference_config();
        synapse.set_weight(weight);

        let observed = synapse.weight();
        prop_assert!(observed.is_finite());
        prop_assert!(observed >= config.min_weight);
        prop_assert!(observed <= config.max_weight);
        if weight.is_finite() {
            prop_assert_eq!(observed, weight.clamp(config.min_weight, config.max_weight));
        }
        // Idempotence: setting the observed value changes nothing.
        synapse.set_weight(observed);
        prop_assert_eq!(synapse.weight(), observed);
    }

    /// The STDP sign law: causal pairings inside the window potentiate,
    /// anti-causal ones depress, out-of-window pairings change nothing.
    #[test]
    fn prop_stdp_sign_law(delta_t in -200.0_f64..200.0) {
        let mut calc = PlasticityCalculator::new(reference_config());
        let dw = calc.weight_change(delta_t, 0.5, None, &Modulators::default());

        if delta_t.abs() >= 100.0 {
            prop_assert_eq!(dw, 0.0);
        } else if delta_t.abs() < 1.0 {
            prop_assert!(dw > 0.0);
        } else if delta_t < 0.0 {
            prop_assert!(dw > 0.0);
        } else {
            prop_assert!(dw < 0.0);
        }
    }

    /// Monotone decay: LTP strength decreases with pairing distance.
    #[test]
    fn prop_stdp_monotone_decay(
        near in -40.0_f64..-1.0,
        separation in 1.0_f64..50.0,
    ) {
        let mut calc = PlasticityCalculator::new(reference_config());
        let far = near - separation;
        let dw_near = calc.weight_change(near, 0.5, None, &Modulators::default());
        let dw_far = calc.weight_change(far, 0.5, None, &Modulators::default());
        prop_assert!(dw_far.abs() <= dw_near.abs());
    }

    /// Asymmetry: |LTD| / |LTP| equals the configured ratio at equal |Δt|,
    /// before any modulators.
    #[test]
    fn prop_stdp_asymmetry_ratio(delta_t in 1.5_f64..99.0) {
        let calc = PlasticityCalculator::new(reference_config());
        let ltp = calc.stdp_shape(-delta_t, None);
        let ltd = calc.stdp_shape(delta_t, None);
        prop_assert!(ltp > 0.0);
        prop_assert!(ltd < 0.0);
        let ratio = ltd.abs() / ltp.abs();
        prop_assert!((ratio - 1.2).abs() < 1e-9);
    }

    /// Weight dependence: the same causal pairing moves a minimum-weight
    /// synapse strictly more than a maximum-weight one.
    #[test]
    fn prop_weight_dependence(delta_t in -99.0_f64..-1.5) {
        let mut calc = PlasticityCalculator::new(reference_config());
        let config = reference_config();
        let weak = calc.weight_change(delta_t, config.min_weight, None, &Modulators::default());
        let strong = calc.weight_change(delta_t, config.max_weight, None, &Modulators::default());
        prop_assert!(weak > strong);
    }

    /// The weight invariant holds across arbitrary operation sequences, and
    /// every derived scalar stays finite and in range.
    #[test]
    fn prop_weight_bounded_under_arbitrary_operations(
        seed in 0u64..1000,
        ops in prop::collection::vec(0u8..5, 1..40),
    ) {
        let synapse = build_synapse(seed);
        let config = reference_config();

        for (i, op) in ops.iter().enumerate() {
            match op {
                0 => { let _ = synapse.transmit(1.0); }
                1 => {
                    let delta_t = (i as f64 * 7.0) % 240.0 - 120.0;
                    let _ = synapse.apply_plasticity(
                        &PlasticityAdjustment::from_delta_t(delta_t),
                    );
                }
                2 => { synapse.process_neuromodulation(Ligand::Dopamine, 2.0); }
                3 => { synapse.process_neuromodulation(Ligand::Gaba, 1.5); }
                _ => { synapse.set_weight(i as f64 - 2.0); }
            }

            let weight = synapse.weight();
            prop_assert!(weight >= config.min_weight && weight <= config.max_weight);

            let health = synapse.health_score();
            prop_assert!((0.0..=1.0).contains(&health));
            let report = synapse.activity_report();
            prop_assert!((0.0..=1.0).contains(&report.reliability));
            prop_assert!(report.activity_level_hz >= 0.0);
            prop_assert!(report.activity_level_hz.is_finite());

            let pool = synapse.vesicle_pool_state();
            prop_assert!((0.0..=1.0).contains(&pool.depletion_level));
            prop_assert!((0.0..=1.0).contains(&pool.fatigue_level));
            prop_assert!(synapse.gaba_inhibition() >= 0.0);
            prop_assert!(synapse.gaba_inhibition() <= 1.0);
            prop_assert!(synapse.eligibility_trace().is_finite());
        }
    }

    /// Transmission accounting: the monitor's total equals the attempt
    /// count and its success count equals the number of `Ok` returns.
    #[test]
    fn prop_transmission_accounting(seed in 0u64..1000, attempts in 1usize..60) {
        let pre = StubNeuron::new("pre");
        let post = StubNeuron::new("post");
        let synapse = Synapse::builder("prop", pre, post)
            .delay(Duration::ZERO)
            .vesicle_config(VesicleConfig {
                ready_pool_size: 10,
                reserve_pool_size: 0,
                ..Default::default()
            })
            .seed(seed)
            .build()
            .unwrap();

        let mut ok = 0u64;
        for _ in 0..attempts {
            if synapse.transmit(1.0).is_ok() {
                ok += 1;
            }
        }
        let report = synapse.activity_report();
        prop_assert_eq!(report.total_transmissions, attempts as u64);
        prop_assert_eq!(report.successful_transmissions, ok);
        prop_assert_eq!(report.failed_transmissions, attempts as u64 - ok);
    }

    /// Vesicle conservation: ready + recycling + reserve is invariant.
    #[test]
    fn prop_vesicle_conservation(seed in 0u64..1000, attempts in 1usize..80) {
        let synapse = build_synapse(seed);
        let initial = synapse.vesicle_pool_state().total();
        for _ in 0..attempts {
            let _ = synapse.transmit(1.0);
            prop_assert_eq!(synapse.vesicle_pool_state().total(), initial);
        }
    }

    /// Reset returns every piece of dynamic state to initialization values
    /// regardless of the preceding workload.
    #[test]
    fn prop_reset_round_trip(seed in 0u64..1000, ops in prop::collection::vec(0u8..4, 1..20)) {
        let synapse = build_synapse(seed);
        for op in &ops {
            match op {
                0 => { let _ = synapse.transmit(1.0); }
                1 => {
                    let _ = synapse.apply_plasticity(
                        &PlasticityAdjustment::from_delta_t(-10.0),
                    );
                }
                2 => { synapse.process_neuromodulation(Ligand::Gaba, 2.0); }
                _ => { synapse.set_weight(1.7); }
            }
        }

        synapse.reset();

        prop_assert!(synapse.is_active());
        prop_assert_eq!(synapse.weight(), 0.5);
        prop_assert_eq!(synapse.eligibility_trace(), 0.0);
        prop_assert_eq!(synapse.gaba_inhibition(), 0.0);
        prop_assert_eq!(synapse.metaplasticity_threshold(), 1.0);
        prop_assert_eq!(synapse.health_score(), 1.0);
        let report = synapse.activity_report();
        prop_assert_eq!(report.total_transmissions, 0);
        prop_assert_eq!(report.successful_transmissions, 0);
        prop_assert_eq!(report.failed_transmissions, 0);
        let pool = synapse.vesicle_pool_state();
        prop_assert_eq!(pool.recycling, 0);
        prop_assert_eq!(pool.fatigue_level, 0.0);
    }

    /// Non-finite inputs never panic and never poison derived metrics.
    #[test]
    fn prop_pathological_inputs_are_sanitized(
        seed in 0u64..1000,
        selector in 0u8..3,
    ) {
        let synapse = build_synapse(seed);
        let poison = match selector {
            0 => f64::NAN,
            1 => f64::INFINITY,
            _ => f64::NEG_INFINITY,
        };

        let _ = synapse.transmit(poison);
        let _ = synapse.apply_plasticity(&PlasticityAdjustment::from_delta_t(poison));
        synapse.process_neuromodulation(Ligand::Dopamine, poison);
        synapse.set_weight(poison);

        prop_assert!(synapse.weight().is_finite());
        prop_assert!(synapse.health_score().is_finite());
        prop_assert!(synapse.eligibility_trace().is_finite());
        prop_assert!(synapse.activity_report().reliability.is_finite());
    }
}

/// Eligibility decay follows `E₀ · exp(−t/τ)` (exercised through the public
/// trace read at increasing delays; the engine decays lazily on read).
#[test]
fn eligibility_decay_is_exponential() {
    use synapse_engine::neuromodulation::EligibilityTrace;

    let t0 = Instant::now();
    let mut trace = EligibilityTrace::new(500.0, t0);
    trace.accumulate_at(1.5, t0);

    for &ms in &[0u64, 100, 250, 500, 1000, 5000] {
        let at = t0 + Duration::from_millis(ms);
        let expected = 1.5 * (-(ms as f64) / 500.0).exp();
        let observed = trace.value_at(at);
        assert!(
            (observed - expected).abs() < 1e-9,
            "at {ms} ms: {observed} vs {expected}"
        );
    }
}
