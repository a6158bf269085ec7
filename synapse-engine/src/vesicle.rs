//! Vesicle pool dynamics and stochastic release gating.
//!
//! The controller tracks three conserved pools of vesicles:
//! 1. Ready - docked and immediately releasable
//! 2. Recycling - released, undergoing endocytosis and repriming
//! 3. Reserve - mobilized into the ready pool when it runs low
//!
//! Release is gated probabilistically by baseline probability, calcium
//! enhancement, fatigue, depletion, and a per-synapse rate limit. Recycling
//! and recovery are applied lazily on every observation; the controller owns
//! no timers or threads. All state sits behind an internal lock so the
//! engine can run the release check before taking its own lock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::VesicleConfig;
use crate::ring::BoundedRing;

/// Fast-pathway recycling time (kiss-and-run endocytosis).
pub const FAST_RECYCLING_MS: u64 = 100;
/// Slow-pathway recycling time (clathrin-mediated endocytosis).
pub const SLOW_RECYCLING_MS: u64 = 400;
/// Upper bound of the uniform repriming jitter added to fast recycling.
pub const REPRIMING_JITTER_MS: u64 = 20;
/// Probability that a released vesicle takes the fast pathway.
pub const FAST_PATHWAY_PROBABILITY: f64 = 0.7;

/// Fatigue added per release.
pub const FATIGUE_INCREMENT: f64 = 0.015;
/// Fatigue exponential recovery time constant (ms).
pub const FATIGUE_RECOVERY_MS: f64 = 500.0;

/// Highest accepted calcium level; inputs above are clamped.
pub const MAX_CALCIUM_LEVEL: f64 = 10.0;
/// Ceiling on the calcium release-probability multiplier.
pub const MAX_CALCIUM_ENHANCEMENT: f64 = 3.0;

/// Rolling window over which the release rate is measured.
pub const RELEASE_RATE_WINDOW: Duration = Duration::from_secs(1);
/// Capacity of the release-event ring.
pub const RELEASE_EVENT_CAPACITY: usize = 256;

/// Ready-pool fraction below which reserve mobilization starts.
pub const RESERVE_MOBILIZATION_FRACTION: f64 = 0.25;
/// Time to mobilize one reserve vesicle into the ready pool (ms).
pub const RESERVE_MOBILIZATION_MS: u64 = 200;

/// Endocytosis pathway taken by a released vesicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecyclingPathway {
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy)]
struct PendingRecycle {
    ready_at: Instant,
}

/// One recorded vesicle-release event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub at: Instant,
    pub pathway: RecyclingPathway,
}

/// Consistent snapshot of the pool counters and derived levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesiclePoolState {
    pub ready: u32,
    pub recycling: u32,
    pub reserve: u32,
    /// `1 − ready/ready_capacity`, in `[0, 1]`.
    pub depletion_level: f64,
    /// Accumulated release fatigue, in `[0, 1]`.
    pub fatigue_level: f64,
    /// Current calcium multiplier, in `[0, MAX_CALCIUM_ENHANCEMENT]`.
    pub calcium_enhancement: f64,
}

impl VesiclePoolState {
    /// Total vesicles across all pools.
    pub fn total(&self) -> u32 {
        self.ready + self.recycling + self.reserve
    }
}

/// Read-only diagnostic snapshot.
#[derive(Debug, Clone)]
pub struct VesicleDebugInfo {
    pub pool: VesiclePoolState,
    pub release_rate_hz: f64,
    pub max_release_rate_hz: f64,
    pub baseline_release_probability: f64,
    pub total_released: u64,
}

struct VesicleInner {
    config: VesicleConfig,
    ready: u32,
    reserve: u32,
    pending: VecDeque<PendingRecycle>,
    fatigue: f64,
    fatigue_updated_at: Instant,
    calcium_enhancement: f64,
    release_events: BoundedRing<ReleaseEvent>,
    last_mobilization_at: Instant,
    total_released: u64,
    rng: StdRng,
}

/// The per-synapse release controller.
pub struct VesicleController {
    inner: Mutex<VesicleInner>,
}

impl std::fmt::Debug for VesicleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VesicleController")
            .field("pool", &self.pool_state())
            .finish()
    }
}

impl VesicleController {
    /// Create a controller with entropy-seeded randomness.
    pub fn new(config: VesicleConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Create a controller with deterministic randomness for reproducible
    /// simulations and tests.
    pub fn with_seed(config: VesicleConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: VesicleConfig, rng: StdRng) -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(VesicleInner {
                ready: config.ready_pool_size,
                reserve: config.reserve_pool_size,
                pending: VecDeque::new(),
                fatigue: 0.0,
                fatigue_updated_at: now,
                calcium_enhancement: 1.0,
                release_events: BoundedRing::new(RELEASE_EVENT_CAPACITY),
                last_mobilization_at: now,
                total_released: 0,
                config,
                rng,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VesicleInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attempt a release at `now`. On success the pool state is already
    /// committed when this returns; on failure nothing changed except rate
    /// bookkeeping.
    pub fn try_release_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        inner.settle(now);

        if inner.ready == 0 {
            trace!("release refused: ready pool empty");
            return false;
        }

        let depletion = inner.depletion_level();
        let fatigue = inner.fatigue;
        let probability = (inner.config.baseline_release_probability
            * inner.calcium_enhancement
            * (1.0 - fatigue)
            * (1.0 - depletion))
            .clamp(0.0, 1.0);

        if inner.release_rate_at(now) >= inner.config.max_release_rate_hz {
            trace!("release refused: rate limit reached");
            return false;
        }

        let draw: f64 = inner.rng.gen();
        if draw > probability {
            trace!(probability, draw, "release refused: stochastic failure");
            return false;
        }

        inner.ready -= 1;
        let fast = inner.rng.gen_bool(FAST_PATHWAY_PROBABILITY);
        let (pathway, delay_ms) = if fast {
            let jitter = inner.rng.gen_range(0..=REPRIMING_JITTER_MS);
            (RecyclingPathway::Fast, FAST_RECYCLING_MS + jitter)
        } else {
            (RecyclingPathway::Slow, SLOW_RECYCLING_MS)
        };
        inner.pending.push_back(PendingRecycle {
            ready_at: now + Duration::from_millis(delay_ms),
        });
        inner.fatigue = (inner.fatigue + FATIGUE_INCREMENT).min(1.0);
        inner.fatigue_updated_at = now;
        inner.release_events.push(ReleaseEvent { at: now, pathway });
        inner.total_released += 1;
        true
    }

    /// Attempt a release now.
    pub fn try_release(&self) -> bool {
        self.try_release_at(Instant::now())
    }

    /// Update the calcium level driving release enhancement.
    ///
    /// The level is clamped into `[0, MAX_CALCIUM_LEVEL]` and mapped to a
    /// multiplier `0.5 + 0.5·level`, capped at [`MAX_CALCIUM_ENHANCEMENT`].
    /// Non-finite inputs collapse to the neutral multiplier.
    pub fn set_calcium_level(&self, level: f64) {
        let mut inner = self.lock();
        inner.calcium_enhancement = if level.is_finite() {
            let level = level.clamp(0.0, MAX_CALCIUM_LEVEL);
            (0.5 + 0.5 * level).min(MAX_CALCIUM_ENHANCEMENT)
        } else {
            1.0
        };
    }

    /// Pool snapshot at `now`, after settling due recycling.
    pub fn pool_state_at(&self, now: Instant) -> VesiclePoolState {
        let mut inner = self.lock();
        inner.settle(now);
        VesiclePoolState {
            ready: inner.ready,
            recycling: inner.pending.len() as u32,
            reserve: inner.reserve,
            depletion_level: inner.depletion_level(),
            fatigue_level: inner.fatigue,
            calcium_enhancement: inner.calcium_enhancement,
        }
    }

    /// Pool snapshot now.
    pub fn pool_state(&self) -> VesiclePoolState {
        self.pool_state_at(Instant::now())
    }

    /// Measured release rate (Hz) over the rolling window.
    pub fn current_release_rate_at(&self, now: Instant) -> f64 {
        let mut inner = self.lock();
        inner.settle(now);
        inner.release_rate_at(now)
    }

    /// Measured release rate (Hz) now.
    pub fn current_release_rate(&self) -> f64 {
        self.current_release_rate_at(Instant::now())
    }

    /// Diagnostic snapshot; totals and derived fields agree.
    pub fn debug_info_at(&self, now: Instant) -> VesicleDebugInfo {
        let mut inner = self.lock();
        inner.settle(now);
        VesicleDebugInfo {
            pool: VesiclePoolState {
                ready: inner.ready,
                recycling: inner.pending.len() as u32,
                reserve: inner.reserve,
                depletion_level: inner.depletion_level(),
                fatigue_level: inner.fatigue,
                calcium_enhancement: inner.calcium_enhancement,
            },
            release_rate_hz: inner.release_rate_at(now),
            max_release_rate_hz: inner.config.max_release_rate_hz,
            baseline_release_probability: inner.config.baseline_release_probability,
            total_released: inner.total_released,
        }
    }

    /// Diagnostic snapshot now.
    pub fn debug_info(&self) -> VesicleDebugInfo {
        self.debug_info_at(Instant::now())
    }

    /// Recent release events (timestamp and recycling pathway), oldest
    /// first, bounded by the event ring capacity.
    pub fn recent_releases(&self) -> Vec<ReleaseEvent> {
        self.lock().release_events.to_vec()
    }

    /// Restore pools, fatigue, calcium, and rate bookkeeping to their
    /// initialization values. The RNG stream is left as-is.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.ready = inner.config.ready_pool_size;
        inner.reserve = inner.config.reserve_pool_size;
        inner.pending.clear();
        inner.fatigue = 0.0;
        inner.fatigue_updated_at = now;
        inner.calcium_enhancement = 1.0;
        inner.release_events.clear();
        inner.last_mobilization_at = now;
        inner.total_released = 0;
    }
}

impl VesicleInner {
    /// Apply every time-driven change due by `now`: recycling completions,
    /// fatigue recovery, and reserve mobilization.
    fn settle(&mut self, now: Instant) {
        while let Some(&front) = self.pending.front() {
            if front.ready_at > now {
                break;
            }
            self.pending.pop_front();
            self.ready += 1;
        }

        let elapsed_ms = now
            .saturating_duration_since(self.fatigue_updated_at)
            .as_secs_f64()
            * 1000.0;
        if elapsed_ms > 0.0 {
            self.fatigue *= (-elapsed_ms / FATIGUE_RECOVERY_MS).exp();
            self.fatigue_updated_at = now;
        }

        self.mobilize_reserve(now);
    }

    /// Move reserve vesicles into a depleted ready pool, one per
    /// mobilization interval.
    fn mobilize_reserve(&mut self, now: Instant) {
        let watermark =
            (self.config.ready_pool_size as f64 * RESERVE_MOBILIZATION_FRACTION).ceil() as u32;
        if self.ready >= watermark || self.reserve == 0 {
            self.last_mobilization_at = now;
            return;
        }

        let elapsed_ms = now
            .saturating_duration_since(self.last_mobilization_at)
            .as_millis() as u64;
        let due = (elapsed_ms / RESERVE_MOBILIZATION_MS) as u32;
        if due == 0 {
            return;
        }
        let deficit = self.config.ready_pool_size - self.ready;
        let moved = due.min(deficit).min(self.reserve);
        self.reserve -= moved;
        self.ready += moved;
        self.last_mobilization_at = now;
    }

    fn depletion_level(&self) -> f64 {
        let capacity = self.config.ready_pool_size as f64;
        (1.0 - self.ready as f64 / capacity).clamp(0.0, 1.0)
    }

    fn release_rate_at(&mut self, now: Instant) -> f64 {
        let cutoff = now.checked_sub(RELEASE_RATE_WINDOW);
        if let Some(cutoff) = cutoff {
            self.release_events.retain(|event| event.at >= cutoff);
        }
        self.release_events.len() as f64 / RELEASE_RATE_WINDOW.as_secs_f64()
    }
}
