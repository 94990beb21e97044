//! Time-slot countdown clock
//!
//! Every client derives its own remaining time from the shared,
//! immutable `slot_ends_at`: the value itself is never synchronized, so
//! viewers that subscribed at different moments still agree. The ticking
//! handle is a scoped resource: dropping it aborts the timer task, and
//! the owning view swaps in a fresh clock whenever the active media
//! changes.

#![allow(dead_code)] // client-side core: consumed by the dashboard frontends, not by the api binary

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Remaining display time at a given instant: `max(0, slot_ends_at - now)`.
pub fn remaining_at(slot_ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (slot_ends_at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Remaining display time right now.
pub fn remaining(slot_ends_at: DateTime<Utc>) -> Duration {
    remaining_at(slot_ends_at, Utc::now())
}

/// Render a remaining duration as m:ss for countdown display.
pub fn format_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// A per-view countdown ticking roughly once per second.
///
/// Reaching zero stops the tick loop but does not deactivate anything -
/// expiry is advisory display state, not an enforced transition.
pub struct SlotClock {
    slot_ends_at: DateTime<Utc>,
    rx: watch::Receiver<Duration>,
    task: JoinHandle<()>,
}

impl SlotClock {
    pub fn start(slot_ends_at: DateTime<Utc>) -> Self {
        let (tx, rx) = watch::channel(remaining(slot_ends_at));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let left = remaining(slot_ends_at);
                if tx.send(left).is_err() {
                    break; // every watcher is gone
                }
                if left == Duration::ZERO {
                    break;
                }
            }
        });
        Self {
            slot_ends_at,
            rx,
            task,
        }
    }

    /// The slot end this clock counts toward.
    pub fn slot_ends_at(&self) -> DateTime<Utc> {
        self.slot_ends_at
    }

    /// Latest published remaining time.
    pub fn remaining(&self) -> Duration {
        *self.rx.borrow()
    }

    /// Watch the countdown; receivers see each published tick value.
    pub fn subscribe(&self) -> watch::Receiver<Duration> {
        self.rx.clone()
    }
}

impl Drop for SlotClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_remaining_is_slot_end_minus_now() {
        let t0 = Utc::now();
        let ends = t0 + ChronoDuration::milliseconds(60_000);

        // Upload at t0 with a 1-minute slot, activation at t0+5s: a
        // client joining right then has 55s left, not a fresh 60, and
        // one joining at t0+10s has 50: activation never resets the
        // slot.
        assert_eq!(
            remaining_at(ends, t0 + ChronoDuration::seconds(5)),
            Duration::from_secs(55)
        );
        assert_eq!(
            remaining_at(ends, t0 + ChronoDuration::seconds(10)),
            Duration::from_secs(50)
        );
        assert_eq!(remaining_at(ends, t0), Duration::from_secs(60));
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let t0 = Utc::now();
        let ends = t0 + ChronoDuration::seconds(1);
        assert_eq!(
            remaining_at(ends, t0 + ChronoDuration::seconds(30)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(55)), "0:55");
        assert_eq!(format_remaining(Duration::from_secs(61)), "1:01");
        assert_eq!(format_remaining(Duration::ZERO), "0:00");
    }

    #[tokio::test]
    async fn test_clock_publishes_initial_remaining() {
        let ends = Utc::now() + ChronoDuration::seconds(120);
        let clock = SlotClock::start(ends);

        let left = clock.remaining();
        assert!(left <= Duration::from_secs(120));
        assert!(left > Duration::from_secs(118));
    }

    #[tokio::test]
    async fn test_expired_slot_reads_zero_and_stops() {
        let ends = Utc::now() - ChronoDuration::seconds(5);
        let clock = SlotClock::start(ends);

        let mut rx = clock.subscribe();
        // First tick fires immediately and publishes the clamped zero.
        rx.changed().await.ok();
        assert_eq!(*rx.borrow(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_drop_cancels_timer_task() {
        let ends = Utc::now() + ChronoDuration::seconds(600);
        let clock = SlotClock::start(ends);
        let mut rx = clock.subscribe();

        drop(clock);

        // Drain any tick already in flight; once the aborted task's
        // sender is gone, changed() errors out.
        while rx.changed().await.is_ok() {}
    }
}
