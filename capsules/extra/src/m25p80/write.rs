// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Page programming.
//!
//! ```text
//! Idle --write_page--> Streaming --tx channel done--> Draining
//!      --bus idle--> Programming --status poll, WIP clear--> Idle
//! ```
//!
//! The caller's data is copied into the staging buffer before anything is
//! leased, so the caller may reuse its buffer as soon as `write_page`
//! returns. The bus stays leased until the status poll sees the device idle.

use kernel::config;
use kernel::debug;
use kernel::hil::dma::{DmaController, DmaPeripheral, Transfer};
use kernel::hil::gpio::Output;
use kernel::hil::spi::SpiPort;
use kernel::sched::wait_until;
use kernel::ErrorCode;

use super::{M25p80, Opcodes, PageIndex, WriteState, PAGE_SIZE, TX_CHANNEL, WRITE_POLL_TICKS};

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> M25p80<'a, P, D, CS> {
    /// Program `data` into `page`.
    ///
    /// Returns once the page is streaming out; `write_complete` follows when
    /// the device finished programming. Waits, yielding, for the staging
    /// buffer, a pending read, the bus and the transmit channel. Refused with
    /// `BUSY` if an erase is active once the staging buffer is ours.
    ///
    /// Bits can only be cleared by programming, so the page should have been
    /// erased first.
    pub fn write_page(&self, page: usize, data: &[u8]) -> Result<(), ErrorCode> {
        if data.len() < PAGE_SIZE {
            return Err(ErrorCode::SIZE);
        }
        let page = PageIndex::new(page)?;

        wait_until(self.yielder, || !self.staging_in_use.get());
        self.staging_in_use.set(true);
        self.staging
            .map(|staging| staging[..PAGE_SIZE].copy_from_slice(&data[..PAGE_SIZE]));

        if self.state.erase_in_progress.get() {
            self.staging_in_use.set(false);
            if config::CONFIG.trace_flash {
                debug!("m25p80: write page {} refused, erase active", page.get());
            }
            return Err(ErrorCode::BUSY);
        }

        wait_until(self.yielder, || {
            !self.state.read_in_progress.get() && self.bus.try_acquire()
        });
        wait_until(self.yielder, || self.dma.try_acquire(TX_CHANNEL));

        self.state.write_in_progress.set(true);
        self.write_state.set(WriteState::Streaming { page });

        self.enable_write();
        self.chip_select.clear();
        self.address_command(Opcodes::PP, page.address());

        let Some(staging) = self.staging.take() else {
            self.abort_write();
            return Err(ErrorCode::RESERVE);
        };
        let program = Transfer::MemoryToPeripheral {
            source: staging,
            len: PAGE_SIZE,
            increment: true,
            peripheral: DmaPeripheral::Ssp0Tx,
        };
        if let Err((e, staging)) = self.dma.controller().start(TX_CHANNEL, program) {
            self.staging.replace(staging);
            self.abort_write();
            return Err(e);
        }

        self.bus.port().set_dma_requests(true, false);
        if config::CONFIG.trace_flash {
            debug!("m25p80: write page {} started", page.get());
        }
        Ok(())
    }

    /// Undo a write that failed to start.
    fn abort_write(&self) {
        self.chip_select.set();
        self.short_command(Opcodes::WRDI);
        self.dma.release(TX_CHANNEL);
        self.bus.release();
        self.write_state.set(WriteState::Idle);
        self.state.write_in_progress.set(false);
        self.staging_in_use.set(false);
    }

    /// Transmit channel finished. Returns `true` if a write owned it.
    pub(super) fn write_tx_done(&self) -> bool {
        let WriteState::Streaming { page } = self.write_state.get() else {
            return false;
        };
        if let Some(staging) = self.dma.controller().stop(TX_CHANNEL) {
            self.staging.replace(staging);
        }
        self.staging_in_use.set(false);
        self.dma.release(TX_CHANNEL);
        self.write_state.set(WriteState::Draining { page });
        self.bus.port().enable_idle_interrupt();
        true
    }

    /// Bus idle after the page went out. Deasserting chip select starts the
    /// program cycle, which is then polled from the timer slot.
    pub(super) fn write_drained(&self) -> bool {
        let WriteState::Draining { page } = self.write_state.get() else {
            return false;
        };
        let port = self.bus.port();
        while port.is_busy() {}
        self.chip_select.set();
        port.disable_idle_interrupt();
        port.set_dma_requests(false, false);
        port.flush_rx();
        self.write_state.set(WriteState::Programming { page });
        self.arm_poll(WRITE_POLL_TICKS);
        true
    }
}
