//! Test doubles for the neuron and matrix collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nalgebra::Point3;

use crate::error::{Result, SynapseError};
use crate::signaling::{ExtracellularMatrix, Neuron, SignalRecord};

/// A recording neuron stub.
pub struct StubNeuron {
    id: String,
    position: Point3<f64>,
    pub received: Mutex<Vec<SignalRecord>>,
    pub scheduled: Mutex<Vec<(SignalRecord, Duration)>>,
    pub fail_delivery: AtomicBool,
}

impl StubNeuron {
    pub fn new(id: &str, position: [f64; 3]) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            position: Point3::new(position[0], position[1], position[2]),
            received: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
            fail_delivery: AtomicBool::new(false),
        })
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub fn last_received(&self) -> Option<SignalRecord> {
        self.received.lock().unwrap().last().cloned()
    }

    pub fn last_scheduled(&self) -> Option<(SignalRecord, Duration)> {
        self.scheduled.lock().unwrap().last().cloned()
    }
}

impl Neuron for StubNeuron {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Point3<f64> {
        self.position
    }

    fn receive(&self, signal: SignalRecord) -> Result<()> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(SynapseError::TransmissionFailed(
                "stub refused delivery".to_string(),
            ));
        }
        self.received.lock().unwrap().push(signal);
        Ok(())
    }

    fn schedule_delayed_delivery(
        &self,
        signal: SignalRecord,
        _target: Arc<dyn Neuron>,
        delay: Duration,
    ) -> Result<()> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(SynapseError::TransmissionFailed(
                "stub refused scheduling".to_string(),
            ));
        }
        self.scheduled.lock().unwrap().push((signal, delay));
        Ok(())
    }
}

/// A matrix stub adding a fixed spatial delay.
pub struct StubMatrix {
    pub extra: Duration,
}

impl ExtracellularMatrix for StubMatrix {
    fn enhance_synaptic_delay(
        &self,
        _pre_id: &str,
        _post_id: &str,
        _synapse_id: &str,
        base_delay: Duration,
    ) -> Duration {
        base_delay + self.extra
    }
}
