// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Sector and bulk erase, and the status poll that ends writes and erases.

use kernel::config;
use kernel::debug;
use kernel::hil::dma::DmaController;
use kernel::hil::gpio::Output;
use kernel::hil::spi::SpiPort;
use kernel::sched::wait_until;
use kernel::ErrorCode;

use super::{
    M25p80, Opcodes, SectorIndex, WriteState, BULK_ERASE_FIRST_POLL_TICKS, ERASE_POLL_TICKS,
    SECTOR_ERASE_FIRST_POLL_TICKS, STATUS_WIP, WRITE_POLL_TICKS,
};

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> M25p80<'a, P, D, CS> {
    /// Erase one 64 KiB sector to `0xFF`.
    ///
    /// Returns once the command is issued; `erase_complete` follows. Refused
    /// with `BUSY` while another erase is active.
    pub fn erase_sector(&self, sector: usize) -> Result<(), ErrorCode> {
        let sector = SectorIndex::new(sector)?;
        if self.state.erase_in_progress.get() {
            return Err(ErrorCode::BUSY);
        }

        wait_until(self.yielder, || self.bus.try_acquire());
        if self.state.erase_in_progress.get() {
            self.bus.release();
            return Err(ErrorCode::BUSY);
        }
        self.state.erase_in_progress.set(true);

        self.enable_write();
        self.chip_select.clear();
        self.address_command(Opcodes::SE, sector.address());
        self.chip_select.set();
        self.arm_poll(SECTOR_ERASE_FIRST_POLL_TICKS);

        if config::CONFIG.trace_flash {
            debug!("m25p80: erase sector {} started", sector.get());
        }
        Ok(())
    }

    /// Erase the whole device to `0xFF`.
    ///
    /// Refused with `BUSY` while an erase or a write is active.
    pub fn erase_bulk(&self) -> Result<(), ErrorCode> {
        if self.state.erase_in_progress.get() || self.state.write_in_progress.get() {
            return Err(ErrorCode::BUSY);
        }

        wait_until(self.yielder, || self.bus.try_acquire());
        if self.state.erase_in_progress.get() {
            self.bus.release();
            return Err(ErrorCode::BUSY);
        }
        self.state.erase_in_progress.set(true);

        self.enable_write();
        self.short_command(Opcodes::BE);
        self.arm_poll(BULK_ERASE_FIRST_POLL_TICKS);

        if config::CONFIG.trace_flash {
            debug!("m25p80: bulk erase started");
        }
        Ok(())
    }

    /// Timer slot expiry while a page programs or a sector erases.
    ///
    /// Runs in tick context with the bus already held by the operation, so
    /// it only clocks short CPU commands.
    pub(super) fn poll_device_status(&self) {
        let erasing = self.state.erase_in_progress.get();
        let page = match self.write_state.get() {
            WriteState::Programming { page } => Some(page),
            _ => None,
        };
        if !erasing && page.is_none() {
            return;
        }

        if self.read_status_register() & STATUS_WIP != 0 {
            self.arm_poll(if erasing {
                ERASE_POLL_TICKS
            } else {
                WRITE_POLL_TICKS
            });
            return;
        }

        self.short_command(Opcodes::WRDI);
        self.state.erase_in_progress.set(false);
        self.state.write_in_progress.set(false);
        self.write_state.set(WriteState::Idle);
        self.bus.release();

        if erasing {
            if config::CONFIG.trace_flash {
                debug!("m25p80: erase done");
            }
            self.client.map(|client| client.erase_complete());
        } else if let Some(page) = page {
            if config::CONFIG.trace_flash {
                debug!("m25p80: write page {} done", page.get());
            }
            self.client.map(|client| client.write_complete(page.get()));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::m25p80::{PAGE_SIZE, SECTOR_SIZE};
    use crate::test::sim;
    use core::cell::Cell;
    use kernel::hil::flash::{Client, HasClient};
    use kernel::ErrorCode;

    struct Erases {
        count: Cell<usize>,
    }

    impl Client for Erases {
        fn read_complete(&self, _: usize, _: &'static mut [u8], _: Result<(), ErrorCode>) {}
        fn write_complete(&self, _: usize) {}
        fn erase_complete(&self) {
            self.count.set(self.count.get() + 1);
        }
    }

    fn erases() -> &'static Erases {
        sim::leak(Erases {
            count: Cell::new(0),
        })
    }

    #[test]
    fn repeated_sector_erase_is_busy_until_done() {
        let bed = sim::bed();
        let erases = erases();
        bed.flash.set_client(erases);

        assert_eq!(bed.flash.erase_sector(14), Ok(()));
        assert_eq!(bed.flash.erase_sector(14), Err(ErrorCode::BUSY));

        bed.run(699);
        assert!(bed.flash.erase_in_progress());
        assert_eq!(bed.flash.erase_sector(14), Err(ErrorCode::BUSY));
        assert_eq!(erases.count.get(), 0);

        bed.run(1);
        assert!(!bed.flash.erase_in_progress());
        assert_eq!(erases.count.get(), 1);
        assert!(!bed.bus.is_held());

        assert_eq!(bed.flash.erase_sector(14), Ok(()));
        bed.settle();
        assert_eq!(erases.count.get(), 2);
    }

    #[test]
    fn sector_erase_addresses_the_whole_sector() {
        let bed = sim::bed();
        bed.nor.load_page(255, &[0x00; PAGE_SIZE]);
        bed.nor.load_page(256, &[0x00; PAGE_SIZE]);
        bed.nor.load_page(511, &[0x00; PAGE_SIZE]);
        bed.nor.load_page(512, &[0x00; PAGE_SIZE]);

        bed.flash.erase_sector(1).unwrap();
        bed.settle();

        assert!(bed.nor.page(255).iter().all(|&b| b == 0x00));
        assert!(bed.nor.page(256).iter().all(|&b| b == 0xFF));
        assert!(bed.nor.page(511).iter().all(|&b| b == 0xFF));
        assert!(bed.nor.page(512).iter().all(|&b| b == 0x00));
        assert_eq!(bed.nor.last_erase_address(), Some(SECTOR_SIZE as u32));
    }

    #[test]
    fn bulk_erase_refused_while_writing() {
        let bed = sim::bed();
        bed.flash.write_page(0, &[0u8; PAGE_SIZE]).unwrap();
        assert_eq!(bed.flash.erase_bulk(), Err(ErrorCode::BUSY));
        bed.settle();

        bed.nor.load_page(4095, &[0u8; PAGE_SIZE]);
        bed.flash.erase_bulk().unwrap();
        assert_eq!(bed.flash.erase_sector(3), Err(ErrorCode::BUSY));
        bed.settle();
        assert!(bed.nor.page(0).iter().all(|&b| b == 0xFF));
        assert!(bed.nor.page(4095).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn erase_waits_behind_a_programming_write() {
        let bed = sim::bed();
        let erases = erases();
        bed.flash.set_client(erases);
        bed.flash.write_page(20, &[0x42; PAGE_SIZE]).unwrap();
        bed.flash.erase_sector(0).unwrap();
        assert!(!bed.flash.write_in_progress());
        bed.settle();
        assert_eq!(erases.count.get(), 1);
        assert!(bed.nor.page(20).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rejects_unknown_sector() {
        let bed = sim::bed();
        assert_eq!(bed.flash.erase_sector(16), Err(ErrorCode::INVAL));
        assert!(!bed.flash.erase_in_progress());
    }
}
