// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

#![forbid(unsafe_code)]
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config_store;
pub mod flash_cursor;
pub mod m25p80;

#[cfg(test)]
mod test;
