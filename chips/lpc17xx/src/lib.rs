// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Peripheral drivers for the NXP LPC17xx family used by the flash engine:
//! SSP0, the general purpose DMA controller, the repetitive interrupt timer
//! and GPIO outputs.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod gpdma;
pub mod gpio;
pub mod rit;
pub mod ssp;
