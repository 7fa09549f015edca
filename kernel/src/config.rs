// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Data structure for storing compile-time configuration options.
//!
//! Options live in a typed `const` rather than behind `#[cfg]` so that every
//! code path is type-checked even when disabled; the compiler folds the
//! constant and removes the dead branches. The values are selected by the
//! kernel crate's cargo features, and this file is the only place those
//! features are read.

/// Data structure holding compile-time configuration options.
pub struct Config {
    /// Whether the flash engine should trace operations to the debug output.
    ///
    /// If enabled, the engine prints a line when a read, write or erase is
    /// started, refused, or completes.
    pub trace_flash: bool,

    /// Whether the DMA channel arbiter should report interrupts no client
    /// claimed.
    pub trace_dma: bool,

    /// Whether the bus arbiter should report idle interrupts no driver
    /// claimed.
    pub trace_bus: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    trace_flash: cfg!(feature = "trace_flash"),
    trace_dma: cfg!(feature = "trace_dma"),
    trace_bus: cfg!(feature = "trace_bus"),
};
