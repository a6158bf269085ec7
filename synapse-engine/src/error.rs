//! Error types for the synapse engine.

use thiserror::Error;

/// Errors that can occur in synaptic operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynapseError {
    /// Operation attempted on a synapse that is not in the Active state.
    #[error("Synapse is not active (state: {0})")]
    SynapseInactive(String),

    /// Vesicle release failed stochastically, by pool exhaustion, or by rate limit.
    #[error("Vesicle release failed: pool depleted or rate-limited")]
    VesicleDepleted,

    /// The post-synaptic neuron or delivery scheduler rejected the message.
    #[error("Transmission failed: {0}")]
    TransmissionFailed(String),

    /// Construction or mutation with parameters that cannot be corrected.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for synapse operations.
pub type Result<T> = std::result::Result<T, SynapseError>;
