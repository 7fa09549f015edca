// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Core kernel for the flash storage firmware.
//!
//! Holds the pieces every other crate in the tree builds on: the shared
//! `ErrorCode`, the cell types used to lend `'static` buffers between
//! drivers, the hardware interface layer (HIL) traits that separate chip
//! drivers from capsules, the `debug!` output facility, compile-time
//! configuration, and the cooperative scheduler that implements the yield
//! contract used by every "wait until" loop in the system.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub use tock_registers::{register_bitfields, register_structs};

#[macro_use]
pub mod debug;
pub mod config;
pub mod errorcode;
pub mod hil;
pub mod sched;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
