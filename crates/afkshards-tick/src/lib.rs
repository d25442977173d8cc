//! Tick-second scheduler for afkshards.
//!
//! Every timer in the lifecycle engine (entry countdowns, earning
//! intervals, deferred hook actions) counts in whole ticks of this clock.
//! The default rate is 1 Hz, so one tick is one "tick-second".
//!
//! # Integration
//!
//! The scheduler sits inside a shard actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* lifecycle events */ }
//!         info = scheduler.wait_for_tick() => {
//!             manager.tick(|p| owns(p));
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! A rate of 0 parks the scheduler: [`TickScheduler::wait_for_tick`]
//! pends forever, which freezes every countdown. Hosts use that in tests
//! that drive ticks by hand.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Deserialize;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the shard wakes up late for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "mode")]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule from now. Countdowns then
    /// run slightly long rather than firing in a burst.
    #[default]
    Skip,
    /// Fire up to `max_catchup` missed ticks back to back so timers
    /// stay aligned with wall-clock seconds.
    CatchUp { max_catchup: u32 },
    /// Keep the original cadence and drop the late tick's lateness.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second. 0 parks the scheduler.
    pub tick_rate_hz: u32,
    /// Overrun handling.
    pub policy: TickPolicy,
    /// Fraction of the tick budget (0.0–1.0) above which tick work
    /// is logged as slow.
    pub budget_warn_threshold: f64,
    /// Random delay (0–max ms) before the first tick, so shards started
    /// together don't all wake in the same instant.
    pub initial_jitter_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 1,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.5,
            initial_jitter_ms: 50,
        }
    }
}

impl TickConfig {
    /// Upper bound on the rate. Matches the host game's own 20 Hz loop;
    /// anything faster would tick AFK timers more often than the world.
    pub const MAX_TICK_RATE_HZ: u32 = 20;

    /// Config for a given rate, everything else default.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz above maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        if !self.budget_warn_threshold.is_finite() {
            self.budget_warn_threshold = 0.5;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick, `None` when parked.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Woke more than 10% of a tick late.
    pub overrun: bool,
    /// Ticks skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Running counters, cheap enough to always keep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    pub slow_ticks: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep clock. One per shard actor.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
    paused: bool,
    stats: TickStats,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.initial_jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..config.initial_jitter_ms))
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        debug!(
            rate_hz = config.tick_rate_hz,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            stats: TickStats::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Pends forever while parked (rate 0) or paused, leaving the other
    /// `select!` branches to make progress.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) if !self.paused => (next, dur),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > dur / 10;
        let behind = (late_by.as_nanos() / dur.as_nanos()) as u64;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun && behind > 0 {
                    ticks_skipped = behind;
                    warn!(tick = self.tick_count, skipped = behind, "tick overrun, skipping ahead");
                }
                now + dur
            }
            TickPolicy::CatchUp { max_catchup } => {
                let cap = u64::from(max_catchup);
                if overrun && behind > cap {
                    ticks_skipped = behind - cap;
                    warn!(
                        tick = self.tick_count,
                        behind,
                        skipped = ticks_skipped,
                        "tick overrun beyond catch-up cap"
                    );
                    now + dur
                } else {
                    next + dur
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(tick = self.tick_count, "tick overrun, keeping original cadence");
                }
                next + dur
            }
        });

        if overrun {
            self.stats.total_overruns += 1;
        }
        self.stats.total_skipped += ticks_skipped;
        self.stats.total_ticks += 1;
        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of this tick's work for budget accounting.
    pub fn record_tick_end(&mut self) {
        let (Some(start), Some(budget)) = (self.tick_start.take(), self.tick_duration) else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            self.stats.slow_ticks += 1;
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching budget"
            );
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Restarts ticking one full tick from now, so time spent paused
    /// never turns into a burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(dur) = self.tick_duration {
                self.next_tick = Some(TokioInstant::now() + dur);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `true` for a rate of 0.
    pub fn is_parked(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
