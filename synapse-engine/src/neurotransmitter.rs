//! Ligand taxonomy and neuromodulatory classification.
//!
//! This module defines the chemical species a synapse can release or respond
//! to, their excitatory/inhibitory/modulatory classification, and the
//! modulation factor each ligand contributes to the three-factor learning
//! rule.

use serde::{Deserialize, Serialize};

/// Chemical ligands recognized by the engine.
///
/// Concentrations arriving for species without a dedicated learning rule fall
/// through to the same mild positive modulation as [`Ligand::Other`], so an
/// unrecognized ligand never destabilizes a synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ligand {
    /// Glutamate - primary excitatory neurotransmitter.
    Glutamate,
    /// GABA - primary inhibitory neurotransmitter.
    Gaba,
    /// Glycine - inhibitory, prominent in spinal circuits.
    Glycine,
    /// Dopamine - reward prediction and motor control.
    Dopamine,
    /// Serotonin - mood and sleep regulation.
    Serotonin,
    /// Norepinephrine - arousal and stress response.
    Norepinephrine,
    /// Acetylcholine - attention and muscle activation.
    Acetylcholine,
    /// Endorphin - endogenous opioid signalling.
    Endorphin,
    /// Oxytocin - social bonding peptide.
    Oxytocin,
    /// Vasopressin - homeostatic peptide.
    Vasopressin,
    /// Sentinel for species the engine has no dedicated handling for.
    Other,
}

/// Broad functional classification of a ligand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LigandClass {
    Excitatory,
    Inhibitory,
    Modulatory,
}

impl Ligand {
    /// Functional class of this ligand.
    pub fn class(&self) -> LigandClass {
        match self {
            Ligand::Glutamate => LigandClass::Excitatory,
            Ligand::Gaba | Ligand::Glycine => LigandClass::Inhibitory,
            Ligand::Dopamine
            | Ligand::Serotonin
            | Ligand::Norepinephrine
            | Ligand::Acetylcholine
            | Ligand::Endorphin
            | Ligand::Oxytocin
            | Ligand::Vasopressin
            | Ligand::Other => LigandClass::Modulatory,
        }
    }

    /// Modulation factor `M` applied to the eligibility trace in the
    /// three-factor rule.
    ///
    /// - Dopamine encodes a reward-prediction error: `M = c − 1`, so a
    ///   concentration at baseline (1.0) is neutral.
    /// - GABA is purely depressive: `M = −c`.
    /// - Serotonin and glutamate contribute mild potentiation.
    /// - Everything else contributes a small positive factor proportional
    ///   to concentration.
    ///
    /// Non-finite concentrations yield 0 (neutral).
    pub fn modulation_factor(&self, concentration: f64) -> f64 {
        if !concentration.is_finite() {
            return 0.0;
        }
        match self {
            Ligand::Dopamine => concentration - 1.0,
            Ligand::Gaba => -concentration,
            Ligand::Serotonin => 0.2 * concentration,
            Ligand::Glutamate => 0.1 * concentration,
            _ => 0.05 * concentration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(Ligand::Glutamate.class(), LigandClass::Excitatory);
        assert_eq!(Ligand::Gaba.class(), LigandClass::Inhibitory);
        assert_eq!(Ligand::Glycine.class(), LigandClass::Inhibitory);
        assert_eq!(Ligand::Dopamine.class(), LigandClass::Modulatory);
        assert_eq!(Ligand::Other.class(), LigandClass::Modulatory);
    }

    #[test]
    fn test_dopamine_reward_prediction_error() {
        // Baseline concentration is neutral, above rewards, below punishes.
        assert_eq!(Ligand::Dopamine.modulation_factor(1.0), 0.0);
        assert!(Ligand::Dopamine.modulation_factor(2.0) > 0.0);
        assert!(Ligand::Dopamine.modulation_factor(0.5) < 0.0);
    }

    #[test]
    fn test_gaba_is_depressive() {
        assert!(Ligand::Gaba.modulation_factor(1.5) < 0.0);
        assert_eq!(Ligand::Gaba.modulation_factor(2.0), -2.0);
    }

    #[test]
    fn test_unknown_ligand_mild_positive() {
        let m = Ligand::Other.modulation_factor(2.0);
        assert!(m > 0.0);
        assert!(m < Ligand::Serotonin.modulation_factor(2.0));
        assert_eq!(m, Ligand::Oxytocin.modulation_factor(2.0));
    }

    #[test]
    fn test_non_finite_concentration_neutral() {
        assert_eq!(Ligand::Dopamine.modulation_factor(f64::NAN), 0.0);
        assert_eq!(Ligand::Gaba.modulation_factor(f64::INFINITY), 0.0);
    }
}
