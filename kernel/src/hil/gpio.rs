// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface for GPIO output pins.

/// A pin driven by software, e.g. a chip-select line.
pub trait Output {
    /// Drive the pin high.
    fn set(&self);

    /// Drive the pin low.
    fn clear(&self);

    /// Whether the pin is currently driven high.
    fn is_set(&self) -> bool;
}
