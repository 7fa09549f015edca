// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Standard error enum for invoking operations

/// Standard errors.
///
/// Every fallible operation in the tree reports one of these. Operations that
/// lend a `'static` buffer hand it back next to the code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL,
    /// Underlying system is busy; retry
    BUSY,
    /// The component is powered down
    OFF,
    /// Reservation required before use
    RESERVE,
    /// An invalid parameter was passed
    INVAL,
    /// Parameter passed was too large
    SIZE,
    /// Memory required not available
    NOMEM,
    /// Operation is not supported
    NOSUPPORT,
}
