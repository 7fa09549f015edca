// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Wait for a number of ticks without stopping the rest of the system.
//!
//! Owns one timer slot. [`CooperativeDelay::wait_ticks`] arms it and yields to
//! the scheduler until the slot fires, so every other process keeps running
//! during the delay.

use core::cell::Cell;

use kernel::hil::time::{TimerClient, TimerSlots};
use kernel::sched::{wait_until, Yield};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

use crate::timer_table::TimerTable;

pub struct CooperativeDelay<'a> {
    timers: &'a TimerTable<'a>,
    yielder: &'a dyn Yield,
    slot: OptionalCell<usize>,
    expired: Cell<bool>,
}

impl<'a> CooperativeDelay<'a> {
    pub fn new(timers: &'a TimerTable<'a>, yielder: &'a dyn Yield) -> CooperativeDelay<'a> {
        CooperativeDelay {
            timers,
            yielder,
            slot: OptionalCell::empty(),
            expired: Cell::new(true),
        }
    }

    /// Allocate the timer slot. Must be called once before `wait_ticks`.
    pub fn register(&'a self) -> Result<(), ErrorCode> {
        let slot = self.timers.add(self, 0)?;
        self.slot.set(slot);
        Ok(())
    }

    /// Yield until `ticks` ticks have passed.
    pub fn wait_ticks(&self, ticks: u32) -> Result<(), ErrorCode> {
        let slot = self.slot.get().ok_or(ErrorCode::OFF)?;
        if ticks == 0 {
            return Ok(());
        }
        if !self.expired.get() {
            // Another caller is already waiting on this slot.
            return Err(ErrorCode::BUSY);
        }
        self.expired.set(false);
        self.timers.arm(slot, ticks);
        wait_until(self.yielder, || self.expired.get());
        Ok(())
    }
}

impl TimerClient for CooperativeDelay<'_> {
    fn fired(&self, _slot: usize) {
        self.expired.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::CooperativeDelay;
    use crate::timer_table::TimerTable;
    use core::cell::Cell;
    use kernel::hil::time::TickClient;
    use kernel::sched::cooperative::CooperativeSched;
    use kernel::sched::Process;
    use kernel::ErrorCode;

    struct TickSource<'a> {
        timers: &'a TimerTable<'a>,
    }

    impl Process for TickSource<'_> {
        fn process(&self) {
            self.timers.tick();
        }
    }

    struct Busy {
        runs: Cell<u32>,
    }

    impl Process for Busy {
        fn process(&self) {
            self.runs.set(self.runs.get() + 1);
        }
    }

    #[test]
    fn wait_keeps_other_processes_running() {
        let timers = TimerTable::new();
        let sched = CooperativeSched::new();
        let ticks = TickSource { timers: &timers };
        let busy = Busy { runs: Cell::new(0) };
        sched.add(&ticks).unwrap();
        sched.add(&busy).unwrap();

        let delay = CooperativeDelay::new(&timers, &sched);
        delay.register().unwrap();
        delay.wait_ticks(25).unwrap();

        assert_eq!(timers.uptime(), 25);
        assert_eq!(busy.runs.get(), 25);
    }

    #[test]
    fn unregistered_delay_is_off() {
        let timers = TimerTable::new();
        let sched = CooperativeSched::new();
        let delay = CooperativeDelay::new(&timers, &sched);
        assert_eq!(delay.wait_ticks(3), Err(ErrorCode::OFF));
        delay.register().unwrap();
        assert_eq!(delay.wait_ticks(0), Ok(()));
    }
}
