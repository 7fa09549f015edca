// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Cooperative main-loop scheduling.
//!
//! There is one thread of control. Each subsystem contributes a [`Process`]
//! whose `process()` advances its state machine a little without ever
//! waiting. Any code that has to wait for a condition does so by running the
//! registered processes until the condition holds, see [`wait_until`].
//!
//! Waiting can nest: a process may itself wait, which re-enters every other
//! process (including, possibly, itself) from inside its own call. Processes
//! must therefore tolerate re-entrant calls.

pub mod cooperative;

/// A subsystem's main-loop hook.
pub trait Process {
    /// Advance the subsystem. Must not block.
    fn process(&self);
}

/// Something that can give the rest of the system a chance to run.
pub trait Yield {
    /// Run every registered process once.
    fn yield_once(&self);

    /// Passes currently on the stack. Above one, the caller runs inside
    /// somebody else's wait.
    fn depth(&self) -> usize;
}

/// Yield until `condition` holds.
pub fn wait_until<F: FnMut() -> bool>(yielder: &dyn Yield, mut condition: F) {
    while !condition() {
        yielder.yield_once();
    }
}
