// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interfaces for the periodic system tick and the software timers it drives.

/// Hardware that raises an interrupt at a fixed period.
pub trait Ticker<'a> {
    fn set_client(&self, client: &'a dyn TickClient);

    /// Start ticking every `period_us` microseconds.
    fn start(&self, period_us: u32);

    fn stop(&self);
}

pub trait TickClient {
    /// Called once per hardware tick, in interrupt context.
    fn tick(&self);
}

/// Receives the expiry of a software timer slot.
pub trait TimerClient {
    /// Called in tick context; must be short and must not wait.
    fn fired(&self, slot: usize);
}

/// Access to a table of countdown slots, counted in ticks.
///
/// Slot numbers that do not exist are ignored.
pub trait TimerSlots {
    /// Set the countdown of `slot` to `counter` ticks. Zero leaves the slot
    /// dormant.
    fn arm(&self, slot: usize, counter: u32);

    /// Set the period the slot is re-armed with after firing. Zero makes it
    /// one-shot.
    fn set_reload(&self, slot: usize, reload: u32);

    /// Current `(counter, reload)` of `slot`.
    fn read(&self, slot: usize) -> Option<(u32, u32)>;

    /// Stop `slot` and clear its reload.
    fn disarm(&self, slot: usize);
}
