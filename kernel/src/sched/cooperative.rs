// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Cooperative Scheduler
//!
//! Runs a fixed, ordered list of processes. The list is filled during board
//! setup and never shrinks. One pass over the list is one yield.

use core::cell::Cell;

use crate::sched::{Process, Yield};
use crate::utilities::cells::OptionalCell;
use crate::ErrorCode;

/// Maximum number of processes that can be registered.
pub const MAX_PROCESSES: usize = 8;

/// Cooperative Scheduler
pub struct CooperativeSched<'a> {
    processes: [OptionalCell<&'a dyn Process>; MAX_PROCESSES],
    count: Cell<usize>,
    depth: Cell<usize>,
}

impl<'a> CooperativeSched<'a> {
    pub const fn new() -> CooperativeSched<'a> {
        CooperativeSched {
            processes: [const { OptionalCell::empty() }; MAX_PROCESSES],
            count: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    /// Append `process` to the end of the run order.
    pub fn add(&self, process: &'a dyn Process) -> Result<(), ErrorCode> {
        let count = self.count.get();
        if count >= MAX_PROCESSES {
            return Err(ErrorCode::NOMEM);
        }
        self.processes[count].set(process);
        self.count.set(count + 1);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count.get()
    }

    /// Run every registered process once, in registration order.
    pub fn run_once(&self) {
        self.depth.set(self.depth.get() + 1);
        for slot in self.processes.iter().take(self.count.get()) {
            slot.map(|process| process.process());
        }
        self.depth.set(self.depth.get() - 1);
    }

    /// How many `run_once` calls are currently on the stack.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// The main loop. Never returns.
    pub fn run_forever(&self) -> ! {
        loop {
            self.run_once();
        }
    }
}

impl Yield for CooperativeSched<'_> {
    fn yield_once(&self) {
        self.run_once();
    }

    fn depth(&self) -> usize {
        self.depth.get()
    }
}
