// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Byte-at-a-time sequential reader over a paged flash.
//!
//! Two page buffers alternate by page parity. When the cursor enters page
//! `p`, page `p + 1` is fetched in the background into the buffer that held
//! `p - 1`, so a sequential scan only stalls on the fetch at `seek`.
//!
//! The cursor must be the flash's client so prefetched buffers come back.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let cursor = static_init!(
//!     FlashCursor<'static, M25p80<'static, Ssp, Gpdma, GpioPin>>,
//!     FlashCursor::new(flash, scheduler, &mut PAGE_A, &mut PAGE_B)
//! );
//! flash.set_client(cursor);
//! cursor.seek(0x1000)?;
//! let first = cursor.getc(false);
//! ```

use core::cell::Cell;

use kernel::config;
use kernel::debug;
use kernel::hil::flash::{Client, PagedFlash};
use kernel::sched::{wait_until, Yield};
use kernel::utilities::cells::TakeCell;
use kernel::ErrorCode;

/// Returned for every byte while an erase makes the contents undefined.
const ERASED_BYTE: u8 = 0xFF;

pub struct FlashCursor<'a, F: PagedFlash> {
    flash: &'a F,
    yielder: &'a dyn Yield,
    buffers: [TakeCell<'static, [u8]>; 2],
    /// Page currently held by each buffer.
    valid: [Cell<Option<usize>>; 2],
    /// Page a background read is fetching into each buffer.
    fetching: [Cell<Option<usize>>; 2],
    address: Cell<usize>,
}

impl<'a, F: PagedFlash> FlashCursor<'a, F> {
    pub fn new(
        flash: &'a F,
        yielder: &'a dyn Yield,
        even: &'static mut [u8],
        odd: &'static mut [u8],
    ) -> FlashCursor<'a, F> {
        FlashCursor {
            flash,
            yielder,
            buffers: [TakeCell::new(even), TakeCell::new(odd)],
            valid: [Cell::new(None), Cell::new(None)],
            fetching: [Cell::new(None), Cell::new(None)],
            address: Cell::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.flash.page_size() * self.flash.page_count()
    }

    /// Current byte address.
    pub fn address(&self) -> usize {
        self.address.get()
    }

    /// Move to `address`, loading its page and starting the fetch of the
    /// next one.
    pub fn seek(&self, address: usize) -> Result<(), ErrorCode> {
        if address >= self.capacity() {
            return Err(ErrorCode::INVAL);
        }
        self.address.set(address);
        if self.flash.erase_in_progress() {
            return Ok(());
        }
        let page = address / self.flash.page_size();
        if self.valid[page % 2].get() != Some(page) {
            self.load_blocking(page)?;
        }
        self.prefetch(page + 1);
        Ok(())
    }

    /// Return the byte at the cursor, advancing past it unless `peek`.
    ///
    /// Yields while a write is in progress or the byte's page is still
    /// being fetched. Returns `0xFF`, without moving, while an erase runs.
    pub fn getc(&self, peek: bool) -> u8 {
        if self.flash.erase_in_progress() {
            return ERASED_BYTE;
        }
        let page_size = self.flash.page_size();
        let address = self.address.get();
        let byte = self.byte_at(address / page_size, address % page_size);
        if peek {
            return byte;
        }

        let next = (address + 1) % self.capacity();
        self.address.set(next);
        if next % page_size == 0 {
            self.prefetch(next / page_size + 1);
        }
        byte
    }

    /// Forget both buffers, e.g. after the flash was modified behind our back.
    pub fn invalidate(&self) {
        for valid in self.valid.iter() {
            valid.set(None);
        }
    }

    fn byte_at(&self, page: usize, offset: usize) -> u8 {
        wait_until(self.yielder, || !self.flash.write_in_progress());
        let slot = page % 2;
        wait_until(self.yielder, || self.buffers[slot].is_some());
        if self.valid[slot].get() != Some(page) && self.load_blocking(page).is_err() {
            return ERASED_BYTE;
        }
        self.buffers[slot].map_or(ERASED_BYTE, |buffer| buffer[offset])
    }

    fn load_blocking(&self, page: usize) -> Result<(), ErrorCode> {
        let slot = page % 2;
        wait_until(self.yielder, || self.buffers[slot].is_some());
        self.valid[slot].set(None);
        let result = self
            .buffers[slot]
            .map(|buffer| self.flash.read_page_blocking(page, buffer))
            .unwrap_or(Err(ErrorCode::RESERVE));
        if result.is_ok() {
            self.valid[slot].set(Some(page));
        }
        result
    }

    /// Start a background read of `page` unless it is already held or on
    /// its way. A refused fetch leaves the buffer invalid, so the next
    /// access to that page reads it synchronously.
    fn prefetch(&self, page: usize) {
        let page = page % self.flash.page_count();
        let slot = page % 2;
        if self.valid[slot].get() == Some(page) || self.fetching[slot].get().is_some() {
            return;
        }
        let Some(buffer) = self.buffers[slot].take() else {
            return;
        };
        self.valid[slot].set(None);
        self.fetching[slot].set(Some(page));
        if let Err((e, buffer)) = self.flash.read_page(page, buffer) {
            self.fetching[slot].set(None);
            self.buffers[slot].replace(buffer);
            if config::CONFIG.trace_flash {
                debug!("cursor: prefetch of page {} refused: {:?}", page, e);
            }
        }
    }
}

impl<'a, F: PagedFlash> Client for FlashCursor<'a, F> {
    fn read_complete(&self, page: usize, buffer: &'static mut [u8], result: Result<(), ErrorCode>) {
        let slot = page % 2;
        if self.fetching[slot].get() == Some(page) {
            self.fetching[slot].set(None);
        }
        self.valid[slot].set(result.ok().map(|()| page));
        self.buffers[slot].replace(buffer);
    }

    fn write_complete(&self, page: usize) {
        let slot = page % 2;
        if self.valid[slot].get() == Some(page) {
            self.valid[slot].set(None);
        }
    }

    fn erase_complete(&self) {
        self.invalidate();
    }
}
