// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Public traits for interfaces between capsules and chip implementations

pub mod dma;
pub mod flash;
pub mod gpio;
pub mod spi;
pub mod time;
