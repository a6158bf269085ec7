//! Shared collaborator doubles for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nalgebra::Point3;
use synapse_engine::{Neuron, Result, SignalRecord};

/// A recording neuron double.
pub struct StubNeuron {
    id: String,
    position: Point3<f64>,
    pub received: Mutex<Vec<SignalRecord>>,
    pub scheduled: Mutex<Vec<(SignalRecord, Duration)>>,
}

impl StubNeuron {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            position: Point3::origin(),
            received: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
        })
    }

    pub fn last_received(&self) -> Option<SignalRecord> {
        self.received.lock().unwrap().last().cloned()
    }

    pub fn delivered_count(&self) -> usize {
        self.received.lock().unwrap().len() + self.scheduled.lock().unwrap().len()
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
        self.received.lock().unwrap().push(signal);
        Ok(())
    }

    fn schedule_delayed_delivery(
        &self,
        signal: SignalRecord,
        _target: Arc<dyn Neuron>,
        delay: Duration,
    ) -> Result<()> {
        self.scheduled.lock().unwrap().push((signal, delay));
        Ok(())
    }
}
