//! Round countdown for Spyglass.
//!
//! A [`Countdown`] fires once per `tick_interval` while it is armed and pends
//! forever while it is not. It never touches game state itself; the room
//! actor owns the clock and decides what a tick means.
//!
//! # Integration
//!
//! The countdown sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = cmd_rx.recv() => { /* handle commands */ }
//!         info = countdown.wait_for_tick() => {
//!             let events = room.tick(info.elapsed);
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_tick` is cancel-safe: when another branch wins, the pending
//! sleep is dropped and no state has been touched, so the next call waits
//! for the same deadline.
//!
//! # Late wake-ups
//!
//! If the actor was busy past one or more deadlines, the next tick reports
//! every interval that has passed in [`TickInfo::elapsed`] and the schedule
//! stays on its original cadence. A round that is 300 seconds long
//! therefore ends 300 seconds after it started, however the wake-ups were
//! distributed.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Time between ticks. Default: 1 second.
    pub tick_interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Shortest interval accepted.
    pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Countdown::new`]. A zero interval would
    /// make the countdown spin, so it is raised to
    /// [`Self::MIN_TICK_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.tick_interval < Self::MIN_TICK_INTERVAL {
            warn!(
                interval = ?self.tick_interval,
                min = ?Self::MIN_TICK_INTERVAL,
                "tick_interval below minimum, clamping"
            );
            self.tick_interval = Self::MIN_TICK_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about one tick, returned by [`Countdown::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number since the countdown was last armed (starts at 1).
    pub tick: u64,
    /// Whole intervals this tick accounts for. `1` normally, more if the
    /// actor woke up late.
    pub elapsed: u32,
    /// `true` if at least one deadline was missed.
    pub late: bool,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// Interval timer for one room. Disarmed on creation.
pub struct Countdown {
    interval: Duration,
    /// When the next tick is due. `None` while disarmed.
    next_tick: Option<Instant>,
    tick_count: u64,
    missed_total: u64,
}

impl Countdown {
    pub fn new(config: CountdownConfig) -> Self {
        let config = config.validated();
        Self {
            interval: config.tick_interval,
            next_tick: None,
            tick_count: 0,
            missed_total: 0,
        }
    }

    /// Starts ticking from now. Re-arming an armed countdown restarts it.
    pub fn arm(&mut self) {
        self.next_tick = Some(Instant::now() + self.interval);
        self.tick_count = 0;
        debug!(interval = ?self.interval, "countdown armed");
    }

    /// Stops ticking. Idempotent.
    pub fn cancel(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(ticks = self.tick_count, "countdown cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Waits until the next tick is due.
    ///
    /// While disarmed this future never resolves, which lets it sit in a
    /// `select!` next to the command channel unconditionally.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let late_by = Instant::now().saturating_duration_since(next);
        let missed = late_by.as_nanos() / self.interval.as_nanos();
        let missed = u32::try_from(missed).unwrap_or(u32::MAX - 1);
        let elapsed = missed + 1;

        self.next_tick = Some(next + self.interval * elapsed);
        self.tick_count += 1;
        self.missed_total += u64::from(missed);

        if missed > 0 {
            warn!(
                tick = self.tick_count,
                missed,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "countdown woke up late"
            );
        } else {
            trace!(tick = self.tick_count, "tick");
        }

        TickInfo {
            tick: self.tick_count,
            elapsed,
            late: missed > 0,
        }
    }

    /// Ticks since the countdown was last armed.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Deadlines missed over the countdown's lifetime.
    pub fn missed_total(&self) -> u64 {
        self.missed_total
    }

    pub fn tick_interval(&self) -> Duration {
        self.interval
    }
}
