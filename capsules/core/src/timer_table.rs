// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! A fixed table of software countdown timers driven by the system tick.
//!
//! Every subsystem that needs "check again in N ticks" owns one slot,
//! allocated during board setup with [`TimerTable::add`] and kept for the
//! life of the system. A slot is armed while its counter is non-zero. On each
//! tick the 64-bit uptime advances, then every armed slot counts down; a slot
//! reaching zero calls its client from the tick interrupt and, if it has a
//! reload period, starts counting again from that period.
//!
//! Slot numbers that were never allocated are ignored by every operation.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let timers = static_init!(TimerTable<'static>, TimerTable::new());
//! peripherals.rit.set_client(timers);
//! let slot = timers.add(poller, 0)?;
//! timers.arm(slot, 600);
//! ```

use core::cell::Cell;

use kernel::hil::time::{TickClient, TimerClient, TimerSlots};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

/// Number of slots in the table.
pub const MAX_TIMER_SLOTS: usize = 16;

struct Slot<'a> {
    counter: Cell<u32>,
    reload: Cell<u32>,
    client: OptionalCell<&'a dyn TimerClient>,
}

impl<'a> Slot<'a> {
    const fn new() -> Slot<'a> {
        Slot {
            counter: Cell::new(0),
            reload: Cell::new(0),
            client: OptionalCell::empty(),
        }
    }
}

pub struct TimerTable<'a> {
    slots: [Slot<'a>; MAX_TIMER_SLOTS],
    count: Cell<usize>,
    uptime: Cell<u64>,
}

impl<'a> TimerTable<'a> {
    pub const fn new() -> TimerTable<'a> {
        TimerTable {
            slots: [const { Slot::new() }; MAX_TIMER_SLOTS],
            count: Cell::new(0),
            uptime: Cell::new(0),
        }
    }

    /// Allocate the next slot for `client`, dormant, with the given reload
    /// period.
    pub fn add(&self, client: &'a dyn TimerClient, reload: u32) -> Result<usize, ErrorCode> {
        let index = self.count.get();
        let slot = self.slots.get(index).ok_or(ErrorCode::NOMEM)?;
        slot.client.set(client);
        slot.reload.set(reload);
        slot.counter.set(0);
        self.count.set(index + 1);
        Ok(index)
    }

    fn slot(&self, index: usize) -> Option<&Slot<'a>> {
        if index < self.count.get() {
            self.slots.get(index)
        } else {
            None
        }
    }

    /// Ticks since the table started receiving ticks.
    pub fn uptime(&self) -> u64 {
        self.uptime.get()
    }

    pub fn is_armed(&self, index: usize) -> bool {
        self.slot(index).map_or(false, |slot| slot.counter.get() > 0)
    }
}

impl TimerSlots for TimerTable<'_> {
    fn arm(&self, slot: usize, counter: u32) {
        if let Some(slot) = self.slot(slot) {
            slot.counter.set(counter);
        }
    }

    fn set_reload(&self, slot: usize, reload: u32) {
        if let Some(slot) = self.slot(slot) {
            slot.reload.set(reload);
        }
    }

    fn read(&self, slot: usize) -> Option<(u32, u32)> {
        self.slot(slot)
            .map(|slot| (slot.counter.get(), slot.reload.get()))
    }

    fn disarm(&self, slot: usize) {
        if let Some(slot) = self.slot(slot) {
            slot.counter.set(0);
            slot.reload.set(0);
        }
    }
}

impl TickClient for TimerTable<'_> {
    fn tick(&self) {
        self.uptime.set(self.uptime.get().wrapping_add(1));
        for (index, slot) in self.slots.iter().take(self.count.get()).enumerate() {
            let counter = slot.counter.get();
            if counter == 0 {
                continue;
            }
            slot.counter.set(counter - 1);
            if counter == 1 {
                slot.client.map(|client| client.fired(index));
                let reload = slot.reload.get();
                if reload > 0 {
                    slot.counter.set(reload);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TimerTable, MAX_TIMER_SLOTS};
    use core::cell::{Cell, RefCell};
    use kernel::hil::time::{TickClient, TimerClient, TimerSlots};
    use kernel::ErrorCode;
    use std::vec::Vec;

    struct Recorder<'a> {
        fired_at: RefCell<Vec<u64>>,
        timers: Cell<Option<&'a TimerTable<'a>>>,
    }

    impl<'a> Recorder<'a> {
        fn new() -> Recorder<'a> {
            Recorder {
                fired_at: RefCell::new(Vec::new()),
                timers: Cell::new(None),
            }
        }
    }

    impl TimerClient for Recorder<'_> {
        fn fired(&self, _slot: usize) {
            let now = self.timers.get().map_or(0, |t| t.uptime());
            self.fired_at.borrow_mut().push(now);
        }
    }

    fn run(timers: &TimerTable, ticks: u32) {
        for _ in 0..ticks {
            timers.tick();
        }
    }

    #[test]
    fn one_shot_fires_once_after_n_ticks() {
        let timers = TimerTable::new();
        let rec = Recorder::new();
        rec.timers.set(Some(&timers));
        let slot = timers.add(&rec, 0).unwrap();

        timers.arm(slot, 5);
        run(&timers, 4);
        assert!(rec.fired_at.borrow().is_empty());
        run(&timers, 1);
        assert_eq!(*rec.fired_at.borrow(), vec![5]);
        run(&timers, 100);
        assert_eq!(rec.fired_at.borrow().len(), 1);
        assert_eq!(timers.read(slot), Some((0, 0)));
    }

    #[test]
    fn reload_repeats_until_disarmed() {
        let timers = TimerTable::new();
        let rec = Recorder::new();
        rec.timers.set(Some(&timers));
        let slot = timers.add(&rec, 0).unwrap();

        timers.set_reload(slot, 3);
        timers.arm(slot, 3);
        run(&timers, 10);
        assert_eq!(*rec.fired_at.borrow(), vec![3, 6, 9]);
        assert_eq!(timers.read(slot), Some((2, 3)));

        timers.disarm(slot);
        run(&timers, 10);
        assert_eq!(rec.fired_at.borrow().len(), 3);
    }

    #[test]
    fn dormant_slots_do_not_fire_and_uptime_counts() {
        let timers = TimerTable::new();
        let rec = Recorder::new();
        let slot = timers.add(&rec, 0).unwrap();
        run(&timers, 50);
        assert!(rec.fired_at.borrow().is_empty());
        assert!(!timers.is_armed(slot));
        assert_eq!(timers.uptime(), 50);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let timers = TimerTable::new();
        let rec = Recorder::new();
        timers.add(&rec, 0).unwrap();

        timers.arm(1, 5);
        timers.set_reload(1, 5);
        timers.disarm(MAX_TIMER_SLOTS + 1);
        assert_eq!(timers.read(1), None);
        assert_eq!(timers.read(usize::MAX), None);
        run(&timers, 10);
        assert!(rec.fired_at.borrow().is_empty());
    }

    #[test]
    fn table_is_bounded() {
        let timers = TimerTable::new();
        let rec = Recorder::new();
        for expected in 0..MAX_TIMER_SLOTS {
            assert_eq!(timers.add(&rec, 0), Ok(expected));
        }
        assert_eq!(timers.add(&rec, 0), Err(ErrorCode::NOMEM));
    }

    struct Rearm<'a> {
        timers: &'a TimerTable<'a>,
        fires: Cell<usize>,
    }

    impl TimerClient for Rearm<'_> {
        fn fired(&self, slot: usize) {
            self.fires.set(self.fires.get() + 1);
            if self.fires.get() < 3 {
                self.timers.arm(slot, 2);
            }
        }
    }

    #[test]
    fn one_shot_client_can_rearm_itself() {
        let timers = TimerTable::new();
        let rearm = Rearm {
            timers: &timers,
            fires: Cell::new(0),
        };
        let slot = timers.add(&rearm, 0).unwrap();
        timers.arm(slot, 1);
        run(&timers, 20);
        assert_eq!(rearm.fires.get(), 3);
        assert_eq!(timers.uptime(), 20);
    }
}
