//! Activity monitoring, health scoring, and trend analysis.
//!
//! The monitor observes every transmission and plasticity event without
//! touching the hot path: recording is a short lock over bounded rings, and
//! all derived metrics are computed on demand. Raw records may carry any
//! value the outside world produced (including NaN and infinities); derived
//! metrics are guaranteed finite.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::ring::BoundedRing;
use crate::signaling::PlasticityEvent;

/// Capacity of the transmission-event ring.
pub const TRANSMISSION_RING_CAPACITY: usize = 1000;
/// Capacity of the plasticity-event ring.
pub const PLASTICITY_RING_CAPACITY: usize = 500;
/// Capacity of the weight-snapshot ring.
pub const WEIGHT_SNAPSHOT_CAPACITY: usize = 200;

/// Rolling analysis window for rates, consistency, and trends.
pub const ACTIVITY_WINDOW: Duration = Duration::from_secs(60);

/// Reliability below this raises [`HealthIssue::LowReliability`].
pub const LOW_RELIABILITY_THRESHOLD: f64 = 0.70;
/// Inactivity beyond this raises [`HealthIssue::ProlongedInactivity`].
pub const INACTIVITY_ISSUE_THRESHOLD: Duration = Duration::from_secs(60);
/// Health below this raises [`HealthIssue::CriticalHealth`].
pub const CRITICAL_HEALTH_THRESHOLD: f64 = 0.30;

/// Inactivity duration at which the health penalty saturates (at 50 %).
pub const INACTIVITY_PENALTY_SATURATION: Duration = Duration::from_secs(30);
/// Maximum health penalty from inactivity.
pub const INACTIVITY_PENALTY_MAX: f64 = 0.5;
/// Window within which recent plasticity rewards health.
pub const PLASTICITY_REWARD_WINDOW: Duration = Duration::from_secs(10);
/// Maximum health reward from recent plasticity.
pub const PLASTICITY_REWARD_MAX: f64 = 0.1;

/// Weights of the component scores in the overall health aggregate.
pub const HEALTH_WEIGHT_RELIABILITY: f64 = 0.30;
pub const HEALTH_WEIGHT_CONSISTENCY: f64 = 0.20;
pub const HEALTH_WEIGHT_PLASTICITY: f64 = 0.20;
pub const HEALTH_WEIGHT_METABOLIC: f64 = 0.15;
pub const HEALTH_WEIGHT_PRECISION: f64 = 0.15;

/// Relative margin between window halves for a trend verdict.
pub const TREND_MARGIN: f64 = 0.2;

/// One recorded transmission attempt.
#[derive(Debug, Clone)]
pub struct TransmissionRecord {
    pub at: Instant,
    pub success: bool,
    pub vesicle_released: bool,
    pub signal_strength: f64,
    pub calcium_level: f64,
    pub processing_time: Duration,
    /// Error classification for failed attempts.
    pub error_kind: Option<String>,
}

/// A detected health problem.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthIssue {
    /// Success ratio dropped below [`LOW_RELIABILITY_THRESHOLD`].
    LowReliability(f64),
    /// No successful transmission for longer than the issue threshold.
    ProlongedInactivity(Duration),
    /// Overall health fell below [`CRITICAL_HEALTH_THRESHOLD`].
    CriticalHealth(f64),
}

impl std::fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthIssue::LowReliability(r) => {
                write!(f, "low reliability: {:.0}% of transmissions succeed", r * 100.0)
            }
            HealthIssue::ProlongedInactivity(idle) => {
                write!(f, "no successful transmission for {:.1} s", idle.as_secs_f64())
            }
            HealthIssue::CriticalHealth(h) => {
                write!(f, "health score critically low at {h:.2}")
            }
        }
    }
}

/// Direction of recent activity, comparing window halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTrend {
    Rising,
    Declining,
    Stable,
}

/// Per-dimension health scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentScores {
    pub reliability: f64,
    pub consistency: f64,
    pub plasticity_responsiveness: f64,
    pub metabolic_efficiency: f64,
    pub temporal_precision: f64,
    pub overall: f64,
}

/// Compact activity summary for host-side diagnostics.
#[derive(Debug, Clone)]
pub struct ActivityReport {
    pub total_transmissions: u64,
    pub successful_transmissions: u64,
    pub failed_transmissions: u64,
    pub reliability: f64,
    pub activity_level_hz: f64,
    pub health_score: f64,
    pub last_transmission: Option<Instant>,
    pub last_plasticity: Option<Instant>,
    pub trend: ActivityTrend,
}

struct MonitorInner {
    total: u64,
    successful: u64,
    failed: u64,
    cumulative_latency: Duration,
    transmissions: BoundedRing<TransmissionRecord>,
    plasticity_events: BoundedRing<PlasticityEvent>,
    weight_snapshots: BoundedRing<(Instant, f64)>,
    last_success_at: Option<Instant>,
    last_plasticity_at: Option<Instant>,
}

/// The per-synapse activity monitor.
pub struct ActivityMonitor {
    inner: Mutex<MonitorInner>,
}

impl std::fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ActivityMonitor")
            .field("total", &inner.total)
            .field("successful", &inner.successful)
            .field("failed", &inner.failed)
            .finish()
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl ActivityMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                total: 0,
                successful: 0,
                failed: 0,
                cumulative_latency: Duration::ZERO,
                transmissions: BoundedRing::new(TRANSMISSION_RING_CAPACITY),
                plasticity_events: BoundedRing::new(PLASTICITY_RING_CAPACITY),
                weight_snapshots: BoundedRing::new(WEIGHT_SNAPSHOT_CAPACITY),
                last_success_at: None,
                last_plasticity_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one transmission attempt. Raw values are stored as supplied;
    /// only the counters and cutoffs are maintained here.
    pub fn record_transmission(&self, record: TransmissionRecord) {
        let mut inner = self.lock();
        inner.total += 1;
        if record.success {
            inner.successful += 1;
            inner.last_success_at = Some(record.at);
        } else {
            inner.failed += 1;
        }
        inner.cumulative_latency = inner.cumulative_latency.saturating_add(record.processing_time);
        let cutoff = record.at.checked_sub(ACTIVITY_WINDOW);
        inner.transmissions.push(record);
        if let Some(cutoff) = cutoff {
            inner.transmissions.retain(|r| r.at >= cutoff);
        }
    }

    /// Record a committed plasticity event.
    pub fn record_plasticity(&self, event: PlasticityEvent) {
        let mut inner = self.lock();
        inner.last_plasticity_at = Some(event.occurred_at);
        let cutoff = event.occurred_at.checked_sub(ACTIVITY_WINDOW);
        inner.plasticity_events.push(event);
        if let Some(cutoff) = cutoff {
            inner.plasticity_events.retain(|e| e.occurred_at >= cutoff);
        }
    }

    /// Record a weight observation for stability analysis.
    pub fn snapshot_weight(&self, at: Instant, weight: f64) {
        let mut inner = self.lock();
        inner.weight_snapshots.push((at, weight));
    }

    /// `successful / total`; 1.0 with no data.
    pub fn reliability(&self) -> f64 {
        let inner = self.lock();
        inner.reliability()
    }

    /// Successful transmissions per second over the rolling window.
    pub fn activity_level_at(&self, now: Instant) -> f64 {
        let inner = self.lock();
        inner.activity_level_at(now)
    }

    /// Overall health score in `[0, 1]`.
    ///
    /// Starts at 1, multiplied by the success rate, penalized up to 50 %
    /// for extended inactivity, rewarded slightly for recent plasticity.
    pub fn health_score_at(&self, now: Instant) -> f64 {
        let inner = self.lock();
        inner.health_score_at(now)
    }

    /// Component health scores and their weighted aggregate.
    pub fn component_scores_at(&self, now: Instant) -> ComponentScores {
        let inner = self.lock();

        let reliability = inner.reliability();
        let consistency = inner.consistency_at(now);
        let plasticity = inner.plasticity_responsiveness_at(now);
        let metabolic = inner.metabolic_efficiency();
        let precision = inner.temporal_precision_at(now);

        let overall = (HEALTH_WEIGHT_RELIABILITY * reliability
            + HEALTH_WEIGHT_CONSISTENCY * consistency
            + HEALTH_WEIGHT_PLASTICITY * plasticity
            + HEALTH_WEIGHT_METABOLIC * metabolic
            + HEALTH_WEIGHT_PRECISION * precision)
            .clamp(0.0, 1.0);

        ComponentScores {
            reliability,
            consistency,
            plasticity_responsiveness: plasticity,
            metabolic_efficiency: metabolic,
            temporal_precision: precision,
            overall,
        }
    }

    /// Threshold-detected problems, worst first.
    pub fn issues_at(&self, now: Instant) -> Vec<HealthIssue> {
        let inner = self.lock();
        let mut issues = Vec::new();

        let health = inner.health_score_at(now);
        if health < CRITICAL_HEALTH_THRESHOLD {
            issues.push(HealthIssue::CriticalHealth(health));
        }
        let reliability = inner.reliability();
        if inner.total > 0 && reliability < LOW_RELIABILITY_THRESHOLD {
            issues.push(HealthIssue::LowReliability(reliability));
        }
        if let Some(last) = inner.last_success_at {
            let idle = now.saturating_duration_since(last);
            if idle > INACTIVITY_ISSUE_THRESHOLD {
                issues.push(HealthIssue::ProlongedInactivity(idle));
            }
        }

        if !issues.is_empty() {
            debug!(count = issues.len(), "synapse health issues detected");
        }
        issues
    }

    /// Human-readable renderings of the detected issues.
    pub fn describe_issues_at(&self, now: Instant) -> Vec<String> {
        self.issues_at(now)
            .iter()
            .map(|issue| issue.to_string())
            .collect()
    }

    /// Compare success rates between the two halves of the rolling window.
    pub fn trend_at(&self, now: Instant) -> ActivityTrend {
        let inner = self.lock();
        inner.trend_at(now)
    }

    /// Compact summary of everything above.
    pub fn report_at(&self, now: Instant) -> ActivityReport {
        let inner = self.lock();
        ActivityReport {
            total_transmissions: inner.total,
            successful_transmissions: inner.successful,
            failed_transmissions: inner.failed,
            reliability: inner.reliability(),
            activity_level_hz: inner.activity_level_at(now),
            health_score: inner.health_score_at(now),
            last_transmission: inner.transmissions.latest().map(|r| r.at),
            last_plasticity: inner.last_plasticity_at,
            trend: inner.trend_at(now),
        }
    }

    /// Mean delivery latency across all recorded attempts.
    pub fn mean_latency(&self) -> Duration {
        let inner = self.lock();
        if inner.total == 0 {
            return Duration::ZERO;
        }
        inner.cumulative_latency / inner.total as u32
    }

    /// Recorded plasticity events, oldest first.
    pub fn plasticity_events(&self) -> Vec<PlasticityEvent> {
        self.lock().plasticity_events.to_vec()
    }

    /// Clear every counter and ring.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.total = 0;
        inner.successful = 0;
        inner.failed = 0;
        inner.cumulative_latency = Duration::ZERO;
        inner.transmissions.clear();
        inner.plasticity_events.clear();
        inner.weight_snapshots.clear();
        inner.last_success_at = None;
        inner.last_plasticity_at = None;
    }
}

impl MonitorInner {
    fn reliability(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        finite_or(self.successful as f64 / self.total as f64, 1.0).clamp(0.0, 1.0)
    }

    fn windowed_successes(&self, now: Instant) -> Vec<Instant> {
        let cutoff = now.checked_sub(ACTIVITY_WINDOW);
        self.transmissions
            .iter()
            .filter(|r| r.success)
            .filter(|r| cutoff.map_or(true, |c| r.at >= c))
            .map(|r| r.at)
            .collect()
    }

    fn activity_level_at(&self, now: Instant) -> f64 {
        let successes = self.windowed_successes(now).len() as f64;
        finite_or(successes / ACTIVITY_WINDOW.as_secs_f64(), 0.0)
    }

    fn health_score_at(&self, now: Instant) -> f64 {
        let mut score = self.reliability();

        if let Some(last) = self.last_success_at {
            let idle = now.saturating_duration_since(last);
            let saturation = INACTIVITY_PENALTY_SATURATION.as_secs_f64();
            let penalty =
                INACTIVITY_PENALTY_MAX * (idle.as_secs_f64() / saturation).min(1.0);
            score *= 1.0 - penalty;
        }

        if let Some(last) = self.last_plasticity_at {
            let since = now.saturating_duration_since(last);
            let window = PLASTICITY_REWARD_WINDOW.as_secs_f64();
            if since.as_secs_f64() < window {
                score += PLASTICITY_REWARD_MAX * (1.0 - since.as_secs_f64() / window);
            }
        }

        finite_or(score, 0.0).clamp(0.0, 1.0)
    }

    /// 1 − coefficient of variation of inter-success intervals, clamped.
    fn consistency_at(&self, now: Instant) -> f64 {
        let successes = self.windowed_successes(now);
        if successes.len() < 3 {
            return 1.0;
        }
        let intervals: Vec<f64> = successes
            .windows(2)
            .map(|w| w[1].saturating_duration_since(w[0]).as_secs_f64())
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if mean <= 0.0 {
            return 1.0;
        }
        let variance = intervals
            .iter()
            .map(|i| (i - mean) * (i - mean))
            .sum::<f64>()
            / intervals.len() as f64;
        let cv = variance.sqrt() / mean;
        finite_or(1.0 - cv, 0.0).clamp(0.0, 1.0)
    }

    /// Decaying score of how recently plasticity fired.
    fn plasticity_responsiveness_at(&self, now: Instant) -> f64 {
        match self.last_plasticity_at {
            None => {
                // A synapse that never needed adjustment is not unhealthy.
                if self.plasticity_events.is_empty() {
                    1.0
                } else {
                    0.0
                }
            }
            Some(last) => {
                let since = now.saturating_duration_since(last).as_secs_f64();
                finite_or((-since / ACTIVITY_WINDOW.as_secs_f64()).exp(), 0.0)
            }
        }
    }

    /// Success rate discounted by mean processing cost.
    fn metabolic_efficiency(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let mean_latency_ms =
            self.cumulative_latency.as_secs_f64() * 1000.0 / self.total as f64;
        let cost_discount = (-mean_latency_ms / 50.0).exp();
        finite_or(self.reliability() * cost_discount, 0.0).clamp(0.0, 1.0)
    }

    /// Inverse spread of processing times within the window.
    fn temporal_precision_at(&self, now: Instant) -> f64 {
        let cutoff = now.checked_sub(ACTIVITY_WINDOW);
        let latencies: Vec<f64> = self
            .transmissions
            .iter()
            .filter(|r| cutoff.map_or(true, |c| r.at >= c))
            .map(|r| r.processing_time.as_secs_f64() * 1000.0)
            .collect();
        if latencies.len() < 3 {
            return 1.0;
        }
        let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
        let variance = latencies
            .iter()
            .map(|l| (l - mean) * (l - mean))
            .sum::<f64>()
            / latencies.len() as f64;
        finite_or(1.0 / (1.0 + variance.sqrt() / 10.0), 0.0).clamp(0.0, 1.0)
    }

    fn trend_at(&self, now: Instant) -> ActivityTrend {
        let successes = self.windowed_successes(now);
        if successes.len() < 4 {
            return ActivityTrend::Stable;
        }
        let half = now.checked_sub(ACTIVITY_WINDOW / 2);
        let Some(half) = half else {
            return ActivityTrend::Stable;
        };
        let recent = successes.iter().filter(|&&t| t >= half).count() as f64;
        let older = successes.len() as f64 - recent;
        if recent > older * (1.0 + TREND_MARGIN) {
            ActivityTrend::Rising
        } else if recent < older * (1.0 - TREND_MARGIN) {
            ActivityTrend::Declining
        } else {
            ActivityTrend::Stable
        }
    }
}
