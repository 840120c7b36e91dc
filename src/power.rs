//! Power-save duty cycling.
//!
//! [`PowerSaveTimer`] is the pure state machine deciding when the radio may
//! be powered down. It counts scheduler ticks between "last link closed" and
//! "radio off" so a client that disconnects can reconnect without waiting
//! for a wake cycle. The facade drives it from the periodic power-save tick
//! and from connection events; this module performs no I/O itself.

/// The countdown toward radio power-down.
///
/// `Blocked` while a link is (or is about to be) active, `Counting` while a
/// grace period runs, `Uninitialized` before the first power plan arrives or
/// after the timer expired and the radio went down. The next wake tick
/// re-arms an `Uninitialized` countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Countdown {
    Blocked,
    Counting(u32),
    Uninitialized,
}

/// BLE section of the firmware power plan. All durations are scheduler
/// ticks. A zero duration means "stay awake", not "sleep immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlePowerPlan {
    /// Grace period after power-on, before the first connection.
    pub initial_time_up: u32,
    /// Grace period after the last link disconnects.
    pub running_time_up: u32,
    /// How long the radio stays off between wake cycles.
    pub time_down: u32,
}

/// The power-management facility: blocking power save keeps the whole
/// device awake while the radio needs to stay on.
pub trait PowerControl {
    fn block_power_save(&self);
    fn unblock_power_save(&self);
}

/// What a count tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Nothing to do; tick again after one tick.
    Idle,
    /// The grace period expired: power the radio down and tick again
    /// (as a wake tick) after `time_down` ticks.
    Sleep { time_down: u32 },
}

pub struct PowerSaveTimer {
    plan: BlePowerPlan,
    countdown: Countdown,
}

impl PowerSaveTimer {
    pub const fn new() -> Self {
        Self {
            plan: BlePowerPlan {
                initial_time_up: 0,
                running_time_up: 0,
                time_down: 0,
            },
            countdown: Countdown::Uninitialized,
        }
    }

    /// Apply a (new) power plan. Unless a link holds the countdown at
    /// `Blocked`, the grace period restarts from `initial_time_up`.
    pub fn apply_plan(&mut self, plan: &BlePowerPlan) {
        self.plan = *plan;
        if self.countdown != Countdown::Blocked {
            self.countdown = Self::counting(plan.initial_time_up);
        }
    }

    /// A wake tick fired. Re-arms an expired/unset countdown with
    /// `running_time_up`; an already armed or blocked countdown is kept.
    pub fn arm_for_wake(&mut self) {
        if self.countdown == Countdown::Uninitialized {
            self.countdown = Self::counting(self.plan.running_time_up);
        }
    }

    /// A link is being established: freeze the countdown so the radio
    /// cannot power down under it.
    pub fn block(&mut self) {
        self.countdown = Countdown::Blocked;
    }

    /// The last link closed: start the post-disconnect grace period.
    pub fn rearm_after_disconnect(&mut self) {
        self.countdown = Self::counting(self.plan.running_time_up);
    }

    /// A count tick fired. Decrements a running countdown; on reaching
    /// zero the countdown becomes `Uninitialized` and the caller is told
    /// to power down. `Blocked` and `Uninitialized` never decrement.
    pub fn tick(&mut self) -> TickOutcome {
        match self.countdown {
            Countdown::Counting(n) if n > 1 => {
                self.countdown = Countdown::Counting(n - 1);
                TickOutcome::Idle
            }
            Countdown::Counting(_) => {
                self.countdown = Countdown::Uninitialized;
                TickOutcome::Sleep {
                    time_down: self.plan.time_down,
                }
            }
            Countdown::Blocked | Countdown::Uninitialized => TickOutcome::Idle,
        }
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    // A zero grace period degenerates to "stay awake": the original
    // firmware's falsy check skipped the decrement entirely for 0.
    fn counting(ticks: u32) -> Countdown {
        if ticks == 0 {
            Countdown::Blocked
        } else {
            Countdown::Counting(ticks)
        }
    }
}
