//! Integration tests for the tick-second scheduler.
//!
//! Uses `start_paused = true` so tokio's clock auto-advances and
//! `sleep_until` resolves without real waiting.

use std::time::Duration;

use afkshards_tick::{TickConfig, TickPolicy, TickScheduler};

// =========================================================================
// Helpers
// =========================================================================

fn one_hz() -> TickConfig {
    TickConfig {
        initial_jitter_ms: 0,
        ..TickConfig::default()
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_one_tick_per_second() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 1);
    assert_eq!(cfg.tick_duration(), Some(Duration::from_secs(1)));
    assert_eq!(cfg.policy, TickPolicy::Skip);
}

#[test]
fn test_zero_rate_is_parked() {
    let cfg = TickConfig::with_rate(0);
    assert_eq!(cfg.tick_duration(), None);
    assert!(TickScheduler::new(cfg).is_parked());
}

#[test]
fn test_validated_clamps_rate_and_threshold() {
    let cfg = TickConfig {
        tick_rate_hz: 500,
        budget_warn_threshold: 7.0,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

#[test]
fn test_config_deserializes_from_toml() {
    let cfg: TickConfig = toml::from_str(
        r#"
        tick_rate_hz = 2
        policy = { mode = "catch-up", max_catchup = 3 }
        "#,
    )
    .unwrap();
    assert_eq!(cfg.tick_rate_hz, 2);
    assert_eq!(cfg.policy, TickPolicy::CatchUp { max_catchup: 3 });
    assert_eq!(cfg.initial_jitter_ms, TickConfig::default().initial_jitter_ms);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_after_one_second() {
    let mut s = TickScheduler::new(one_hz());
    let start = tokio::time::Instant::now();

    let info = s.wait_for_tick().await;

    assert_eq!(info.tick, 1);
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increment_monotonically() {
    let mut s = TickScheduler::new(one_hz());
    for expected in 1..=5 {
        assert_eq!(s.wait_for_tick().await.tick, expected);
        s.record_tick_end();
    }
    assert_eq!(s.tick_count(), 5);
    assert_eq!(s.stats().total_ticks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_parked_scheduler_never_fires() {
    let mut s = TickScheduler::with_rate(0);
    let result = tokio::time::timeout(Duration::from_secs(60), s.wait_for_tick()).await;
    assert!(result.is_err(), "parked scheduler should pend forever");
}

// =========================================================================
// Pause / Resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_ticks() {
    let mut s = TickScheduler::new(one_hz());
    s.wait_for_tick().await;
    s.pause();

    let result = tokio::time::timeout(Duration::from_secs(10), s.wait_for_tick()).await;
    assert!(result.is_err(), "paused scheduler should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_allows_ticks_again() {
    let mut s = TickScheduler::new(one_hz());
    s.wait_for_tick().await;
    s.pause();
    s.pause();
    s.resume();
    s.resume();
    assert!(!s.is_paused());

    assert_eq!(s.wait_for_tick().await.tick, 2);
}

// =========================================================================
// Overruns
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_skipped_ticks() {
    let mut s = TickScheduler::new(one_hz());
    s.wait_for_tick().await;

    // Stall for three and a half ticks before waiting again.
    tokio::time::advance(Duration::from_millis(3_500)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);
    assert_eq!(s.stats().total_overruns, 1);
}

#[tokio::test(start_paused = true)]
async fn test_catchup_within_cap_skips_nothing() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::CatchUp { max_catchup: 5 },
        ..one_hz()
    });
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(2_500)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(one_hz());
    s.record_tick_end();
    assert_eq!(s.stats().slow_ticks, 0);
}

// =========================================================================
// select! loop pattern (mirrors the shard actor)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = TickScheduler::new(one_hz());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        tx.send("stop").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.wait_for_tick() => {
                fired += 1;
                assert_eq!(info.tick, fired);
                s.record_tick_end();
            }
        }
    }

    assert_eq!(fired, 3);
}
