// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface for page-granular external flash.
//!
//! Pages are the unit of reading and programming, sectors the unit of
//! erasing. Long operations return as soon as they are started; the
//! `*_in_progress` queries and the [`Client`] callbacks report completion.
//!
//! A user of this interface might look like:
//!
//! ```rust,ignore
//! use kernel::hil::flash::{Client, PagedFlash};
//! use kernel::ErrorCode;
//!
//! impl Client for Logger {
//!     fn read_complete(&self, page: usize, buffer: &'static mut [u8], result: Result<(), ErrorCode>) {
//!         self.buffer.replace(buffer);
//!     }
//!     fn write_complete(&self, _page: usize) {}
//!     fn erase_complete(&self) {}
//! }
//! ```

use crate::ErrorCode;

/// Completion callbacks for a [`PagedFlash`] user.
pub trait Client {
    /// A `read_page` finished. `buffer` is the buffer passed in.
    fn read_complete(&self, page: usize, buffer: &'static mut [u8], result: Result<(), ErrorCode>);

    /// A `write_page` was programmed and the device is idle again.
    fn write_complete(&self, page: usize);

    /// An `erase_sector` or `erase_bulk` finished.
    fn erase_complete(&self);
}

pub trait HasClient<'a> {
    fn set_client(&self, client: &'a dyn Client);
}

pub trait PagedFlash {
    fn page_size(&self) -> usize;
    fn page_count(&self) -> usize;
    fn pages_per_sector(&self) -> usize;

    /// Start fetching `page` into `buffer`, completion is reported through
    /// [`Client::read_complete`].
    fn read_page(
        &self,
        page: usize,
        buffer: &'static mut [u8],
    ) -> Result<(), (ErrorCode, &'static mut [u8])>;

    /// Fetch `page` into `buffer`, yielding to the scheduler until done.
    fn read_page_blocking(&self, page: usize, buffer: &mut [u8]) -> Result<(), ErrorCode>;

    /// Program `page` with the first page-size bytes of `data`. The data is
    /// copied before this returns.
    fn write_page(&self, page: usize, data: &[u8]) -> Result<(), ErrorCode>;

    fn erase_sector(&self, sector: usize) -> Result<(), ErrorCode>;

    fn erase_bulk(&self) -> Result<(), ErrorCode>;

    /// No operation is running or waiting for a resource to start.
    fn is_idle(&self) -> bool;

    fn read_in_progress(&self) -> bool;
    fn write_in_progress(&self) -> bool;
    fn erase_in_progress(&self) -> bool;
}
