// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Page reads.
//!
//! ```text
//! Idle --read_page--> Transferring --rx channel done--> Draining --bus idle--> Idle
//! ```
//!
//! The transmit channel clocks the same dummy byte out 256 times to generate
//! the bus clock while the receive channel captures the page. Both channels
//! are armed before the port's DMA requests are enabled, so neither can miss
//! a byte.

use kernel::config;
use kernel::debug;
use kernel::hil::dma::{DmaController, DmaPeripheral, Transfer};
use kernel::hil::gpio::Output;
use kernel::hil::spi::SpiPort;
use kernel::sched::wait_until;
use kernel::ErrorCode;

use super::{
    M25p80, Opcodes, PageIndex, ReadOwner, ReadState, ERASED_BYTE, PAGE_SIZE, RX_CHANNEL,
    TX_CHANNEL,
};

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> M25p80<'a, P, D, CS> {
    /// Start reading `page` into `buffer`.
    ///
    /// Returns once the transfer is running; the buffer comes back through
    /// the client's `read_complete`. Refused with `BUSY` while a write or an
    /// erase is active, in the erase case with `buffer` filled with `0xFF`.
    /// Waits, yielding, for an earlier read and for the bus and channels.
    pub fn read_page(
        &self,
        page: usize,
        buffer: &'static mut [u8],
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        if buffer.len() < PAGE_SIZE {
            return Err((ErrorCode::SIZE, buffer));
        }
        match PageIndex::new(page) {
            Ok(page) => self.start_read(page, buffer, ReadOwner::Client),
            Err(e) => Err((e, buffer)),
        }
    }

    /// Read `page` into `buffer`, yielding to the scheduler until it lands.
    ///
    /// Same refusals as [`M25p80::read_page`].
    pub fn read_page_blocking(&self, page: usize, buffer: &mut [u8]) -> Result<(), ErrorCode> {
        if buffer.len() < PAGE_SIZE {
            return Err(ErrorCode::SIZE);
        }
        let page = PageIndex::new(page)?;
        let destination = &mut buffer[..PAGE_SIZE];

        loop {
            wait_until(self.yielder, || self.blocking_buffer.is_some());
            let scratch = self.blocking_buffer.take().ok_or(ErrorCode::RESERVE)?;
            self.blocking_result.set(None);
            if let Err((e, scratch)) = self.start_read(page, scratch, ReadOwner::Blocking) {
                if self.state.erase_in_progress.get() {
                    destination.fill(ERASED_BYTE);
                }
                self.blocking_buffer.replace(scratch);
                return Err(e);
            }

            wait_until(self.yielder, || self.blocking_buffer.is_some());
            match self.blocking_result.get() {
                Some((done, result)) if done == page => {
                    self.blocking_buffer
                        .map(|scratch| destination.copy_from_slice(&scratch[..PAGE_SIZE]));
                    return result;
                }
                // A read issued from inside our wait reused the buffer.
                _ => continue,
            }
        }
    }

    fn start_read(
        &self,
        page: PageIndex,
        buffer: &'static mut [u8],
        owner: ReadOwner,
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        // One read at a time, re-checking the refusals after every yield.
        loop {
            if self.state.erase_in_progress.get() {
                buffer[..PAGE_SIZE].fill(ERASED_BYTE);
                self.trace_refusal(page, "erase");
                return Err((ErrorCode::BUSY, buffer));
            }
            if self.state.write_in_progress.get() {
                self.trace_refusal(page, "write");
                return Err((ErrorCode::BUSY, buffer));
            }
            if !self.state.read_in_progress.get() {
                break;
            }
            self.yielder.yield_once();
        }
        self.state.read_in_progress.set(true);

        wait_until(self.yielder, || self.bus.try_acquire());
        wait_until(self.yielder, || self.dma.try_acquire(TX_CHANNEL));
        wait_until(self.yielder, || self.dma.try_acquire(RX_CHANNEL));

        let port = self.bus.port();
        port.flush_rx();
        self.chip_select.clear();
        self.address_command(Opcodes::READ, page.address());

        let Some(dummy) = self.dummy.take() else {
            self.abort_read();
            return Err((ErrorCode::RESERVE, buffer));
        };
        dummy[0] = 0;
        let controller = self.dma.controller();
        let clock_out = Transfer::MemoryToPeripheral {
            source: dummy,
            len: PAGE_SIZE,
            increment: false,
            peripheral: DmaPeripheral::Ssp0Tx,
        };
        if let Err((e, dummy)) = controller.start(TX_CHANNEL, clock_out) {
            self.dummy.replace(dummy);
            self.abort_read();
            return Err((e, buffer));
        }
        let capture = Transfer::PeripheralToMemory {
            destination: buffer,
            len: PAGE_SIZE,
            peripheral: DmaPeripheral::Ssp0Rx,
        };
        if let Err((e, buffer)) = controller.start(RX_CHANNEL, capture) {
            if let Some(dummy) = controller.stop(TX_CHANNEL) {
                self.dummy.replace(dummy);
            }
            self.abort_read();
            return Err((e, buffer));
        }

        self.read_owner.set(owner);
        self.read_failed.set(false);
        self.read_state.set(ReadState::Transferring { page });
        port.set_dma_requests(true, true);
        if config::CONFIG.trace_flash {
            debug!("m25p80: read page {} started", page.get());
        }
        Ok(())
    }

    /// Undo a read that failed to start.
    fn abort_read(&self) {
        self.chip_select.set();
        self.bus.port().flush_rx();
        self.dma.release(RX_CHANNEL);
        self.dma.release(TX_CHANNEL);
        self.bus.release();
        self.state.read_in_progress.set(false);
    }

    fn trace_refusal(&self, page: PageIndex, reason: &str) {
        if config::CONFIG.trace_flash {
            debug!("m25p80: read page {} refused, {} active", page.get(), reason);
        }
    }

    /// Transmit channel finished clocking. Returns `true` if a read owned it.
    pub(super) fn read_tx_done(&self) -> bool {
        if !matches!(self.read_state.get(), ReadState::Transferring { .. }) || self.dummy.is_some()
        {
            return false;
        }
        if let Some(dummy) = self.dma.controller().stop(TX_CHANNEL) {
            self.dummy.replace(dummy);
        }
        self.dma.release(TX_CHANNEL);
        true
    }

    /// Receive channel finished capturing. The port may still be shifting
    /// the last byte, so the read ends on the following idle interrupt.
    pub(super) fn read_rx_done(&self, failed: bool) -> bool {
        let ReadState::Transferring { page } = self.read_state.get() else {
            return false;
        };
        if let Some(buffer) = self.dma.controller().stop(RX_CHANNEL) {
            self.read_buffer.replace(buffer);
        }
        self.dma.release(RX_CHANNEL);
        self.read_failed.set(failed);
        self.read_state.set(ReadState::Draining { page });
        self.bus.port().enable_idle_interrupt();
        true
    }

    /// Bus idle after a read. Returns `true` if a read was draining.
    pub(super) fn read_drained(&self) -> bool {
        let ReadState::Draining { page } = self.read_state.get() else {
            return false;
        };
        let port = self.bus.port();
        while port.is_busy() {}
        self.chip_select.set();
        port.disable_idle_interrupt();
        port.set_dma_requests(false, false);
        port.flush_rx();

        self.read_state.set(ReadState::Idle);
        self.state.read_in_progress.set(false);
        self.bus.release();

        let result = if self.read_failed.get() {
            Err(ErrorCode::FAIL)
        } else {
            Ok(())
        };
        if config::CONFIG.trace_flash {
            debug!("m25p80: read page {} done {:?}", page.get(), result);
        }
        if let Some(buffer) = self.read_buffer.take() {
            match self.read_owner.get() {
                ReadOwner::Blocking => {
                    self.blocking_result.set(Some((page, result)));
                    self.blocking_buffer.replace(buffer);
                }
                ReadOwner::Client => {
                    self.client
                        .map(move |client| client.read_complete(page.get(), buffer, result));
                }
            }
        }
        true
    }
}
