// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Persistent configuration record kept in the top pages of one flash sector.
//!
//! The record shares its 64 KiB erase sector with other data. Saving
//! therefore copies the rest of the sector to a scratch sector, erases the
//! record sector, and writes back the preserved pages followed by the new
//! record:
//!
//! ```text
//!  sector 14                               sector 15 (scratch)
//! +------------------------+--------+     +------------------------+
//! | preserved (240 pages)  | record |     | copy of preserved      |
//! +------------------------+--------+     +------------------------+
//!  3584                     3824  3839     3840
//! ```
//!
//! A failure between the erase and the rewrite leaves the record sector
//! blank; there is no journal.
//!
//! The image layout is owned by the application, except for a little-endian
//! `u32` format version at offset 0.

use core::cell::Cell;

use kernel::debug;
use kernel::hil::flash::PagedFlash;
use kernel::sched::{wait_until, Process, Yield};
use kernel::utilities::cells::TakeCell;
use kernel::ErrorCode;

pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Largest flash page the store can stage on its stack.
pub const MAX_PAGE_SIZE: usize = 256;

const ERASED_VERSION: u32 = 0xFFFF_FFFF;

/// Where the record and the scratch area live, in pages and sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigLayout {
    pub pages_per_sector: usize,
    pub record_sector: usize,
    pub record_pages: usize,
    pub scratch_sector: usize,
}

impl ConfigLayout {
    /// The 16 top pages of sector 14, sector 15 as scratch.
    pub const DEFAULT: ConfigLayout = ConfigLayout {
        pages_per_sector: 256,
        record_sector: 14,
        record_pages: 16,
        scratch_sector: 15,
    };

    pub const fn sector_base(&self, sector: usize) -> usize {
        sector * self.pages_per_sector
    }

    /// First page of the record.
    pub const fn record_base(&self) -> usize {
        self.sector_base(self.record_sector) + self.pages_per_sector - self.record_pages
    }

    /// Pages of the record sector below the record.
    pub const fn preserved_pages(&self) -> usize {
        self.pages_per_sector - self.record_pages
    }

    fn check<F: PagedFlash>(&self, flash: &F) -> Result<(), ErrorCode> {
        let sectors = flash.page_count() / flash.pages_per_sector();
        if self.pages_per_sector != flash.pages_per_sector()
            || self.record_pages == 0
            || self.record_pages > self.pages_per_sector
            || self.record_sector >= sectors
            || self.scratch_sector >= sectors
            || self.record_sector == self.scratch_sector
        {
            return Err(ErrorCode::INVAL);
        }
        Ok(())
    }
}

impl Default for ConfigLayout {
    fn default() -> ConfigLayout {
        ConfigLayout::DEFAULT
    }
}

pub struct ConfigStore<'a, F: PagedFlash> {
    flash: &'a F,
    yielder: &'a dyn Yield,
    layout: ConfigLayout,
    image: TakeCell<'static, [u8]>,
    saving: Cell<bool>,
    save_requested: Cell<bool>,
}

impl<'a, F: PagedFlash> ConfigStore<'a, F> {
    /// `image` must hold `layout.record_pages` flash pages.
    pub fn new(
        flash: &'a F,
        yielder: &'a dyn Yield,
        layout: ConfigLayout,
        image: &'static mut [u8],
    ) -> ConfigStore<'a, F> {
        ConfigStore {
            flash,
            yielder,
            layout,
            image: TakeCell::new(image),
            saving: Cell::new(false),
            save_requested: Cell::new(false),
        }
    }

    pub fn layout(&self) -> ConfigLayout {
        self.layout
    }

    pub fn is_saving(&self) -> bool {
        self.saving.get()
    }

    /// Run `save` from the main loop once the flash is quiet.
    pub fn request_save(&self) {
        self.save_requested.set(true);
    }

    pub fn with_image<R, C: FnOnce(&mut [u8]) -> R>(&self, closure: C) -> Option<R> {
        self.image.map(closure)
    }

    /// Format version of the image in memory.
    pub fn version(&self) -> Option<u32> {
        self.image
            .map_or(None, |image| image.first_chunk::<4>().copied())
            .map(u32::from_le_bytes)
    }

    /// Copy record page `index` of the in-memory image into `buffer`.
    pub fn copy_page(&self, index: usize, buffer: &mut [u8]) -> Result<(), ErrorCode> {
        let page_size = self.flash.page_size();
        if index >= self.layout.record_pages {
            return Err(ErrorCode::INVAL);
        }
        if buffer.len() < page_size {
            return Err(ErrorCode::SIZE);
        }
        self.image
            .map(|image| {
                let page = image
                    .get(index * page_size..(index + 1) * page_size)
                    .ok_or(ErrorCode::SIZE)?;
                buffer[..page_size].copy_from_slice(page);
                Ok(())
            })
            .unwrap_or(Err(ErrorCode::RESERVE))
    }

    fn check(&self) -> Result<usize, ErrorCode> {
        self.layout.check(self.flash)?;
        let page_size = self.flash.page_size();
        if page_size > MAX_PAGE_SIZE {
            return Err(ErrorCode::NOSUPPORT);
        }
        let image_len = self.image.map_or(0, |image| image.len());
        if image_len < self.layout.record_pages * page_size {
            return Err(ErrorCode::SIZE);
        }
        Ok(page_size)
    }

    /// Read the record from flash into the image.
    ///
    /// A blank record is replaced by a zeroed image carrying the current
    /// format version.
    pub fn load(&self) -> Result<(), ErrorCode> {
        if self.saving.get() {
            return Err(ErrorCode::BUSY);
        }
        let page_size = self.check()?;
        let base = self.layout.record_base();
        let mut page = [0u8; MAX_PAGE_SIZE];
        let page = &mut page[..page_size];
        for index in 0..self.layout.record_pages {
            self.read(base + index, page)?;
            self.image.map(|image| {
                image[index * page_size..(index + 1) * page_size].copy_from_slice(page)
            });
        }

        if self.version() == Some(ERASED_VERSION) {
            self.image.map(|image| {
                image.fill(0);
                image[..4].copy_from_slice(&CONFIG_FORMAT_VERSION.to_le_bytes());
            });
            debug!("config: blank record, using defaults");
        }
        Ok(())
    }

    /// Write the image to flash, preserving the rest of its sector.
    ///
    /// Yields to the scheduler for the whole transaction. Returns `BUSY` if
    /// called again from a process that runs while a save yields.
    pub fn save(&self) -> Result<(), ErrorCode> {
        if self.saving.get() {
            return Err(ErrorCode::BUSY);
        }
        self.saving.set(true);
        self.save_requested.set(false);
        let result = self.save_transaction();
        self.saving.set(false);
        debug!("config: save {:?}", result);
        result
    }

    fn save_transaction(&self) -> Result<(), ErrorCode> {
        let page_size = self.check()?;
        let layout = self.layout;
        let record = layout.sector_base(layout.record_sector);
        let scratch = layout.sector_base(layout.scratch_sector);
        let mut page = [0u8; MAX_PAGE_SIZE];
        let page = &mut page[..page_size];

        self.erase(layout.scratch_sector)?;
        for index in 0..layout.preserved_pages() {
            self.read(record + index, page)?;
            self.write(scratch + index, page)?;
        }

        self.erase(layout.record_sector)?;
        for index in 0..layout.preserved_pages() {
            self.read(scratch + index, page)?;
            self.write(record + index, page)?;
        }

        let base = layout.record_base();
        for index in 0..layout.record_pages {
            self.copy_page(index, page)?;
            self.write(base + index, page)?;
        }
        Ok(())
    }

    fn idle(&self) -> bool {
        !self.flash.write_in_progress() && !self.flash.erase_in_progress()
    }

    /// Blocking read, retried while a write or erase refuses it.
    fn read(&self, page: usize, buffer: &mut [u8]) -> Result<(), ErrorCode> {
        loop {
            match self.flash.read_page_blocking(page, buffer) {
                Err(ErrorCode::BUSY) => wait_until(self.yielder, || self.idle()),
                result => return result,
            }
        }
    }

    /// Program a page and wait for it to finish. Blank pages are skipped,
    /// programming them would not change anything.
    fn write(&self, page: usize, data: &[u8]) -> Result<(), ErrorCode> {
        if data.iter().all(|&b| b == 0xFF) {
            return Ok(());
        }
        loop {
            match self.flash.write_page(page, data) {
                Err(ErrorCode::BUSY) => wait_until(self.yielder, || self.idle()),
                result => {
                    result?;
                    break;
                }
            }
        }
        wait_until(self.yielder, || self.idle());
        Ok(())
    }

    fn erase(&self, sector: usize) -> Result<(), ErrorCode> {
        loop {
            match self.flash.erase_sector(sector) {
                Err(ErrorCode::BUSY) => wait_until(self.yielder, || self.idle()),
                result => {
                    result?;
                    break;
                }
            }
        }
        wait_until(self.yielder, || self.idle());
        Ok(())
    }
}

/// A requested save starts only from an outermost pass with the flash
/// quiet. Inside another subsystem's wait the save could need a resource
/// that subsystem holds until its wait returns.
impl<'a, F: PagedFlash> Process for ConfigStore<'a, F> {
    fn process(&self) {
        if self.saving.get() || !self.save_requested.get() {
            return;
        }
        if self.yielder.depth() > 1 || !self.flash.is_idle() {
            return;
        }
        if let Err(e) = self.save() {
            debug!("config: deferred save failed: {:?}", e);
        }
    }
}
