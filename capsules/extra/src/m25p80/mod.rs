// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Asynchronous driver for the M25P80 serial NOR flash.
//!
//! The device is 1 MiB: 16 sectors of 256 pages of 256 bytes. Pages are read
//! and programmed individually, sectors (or the whole chip) are erased.
//!
//! The chip sits on an SPI port it shares with other devices, and moves page
//! data with two DMA channels it shares too. Every operation leases the bus
//! first and then the channels it needs, always in that order, and returns as
//! soon as the transfer is running:
//!
//! - A read streams the page in with DMA. Completion of the receive channel
//!   enables the port's idle interrupt, and that interrupt ends the read.
//! - A write copies the caller's data into an internal staging buffer,
//!   streams it out with DMA, and then polls the device's write-in-progress
//!   bit from a timer slot.
//! - An erase is issued with CPU-clocked commands and polled from the same
//!   timer slot, starting after the typical datasheet duration.
//!
//! Writes and erases keep the bus until the device reports it is idle again,
//! so no other command can reach the chip in the meantime.
//!
//! Reads, writes and erases exclude each other. A read while an erase runs
//! is refused and its buffer filled with `0xFF`; a write while an erase runs
//! is refused right away rather than stalling for seconds; a write waits for
//! a pending read to finish.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let flash = static_init!(
//!     M25p80<'static, lpc17xx::ssp::Ssp, lpc17xx::gpdma::Gpdma, lpc17xx::gpio::GpioPin>,
//!     M25p80::new(
//!         bus,
//!         dma_arbiter,
//!         timers,
//!         scheduler,
//!         &peripherals.flash_cs,
//!         &mut STAGING_BUFFER,
//!         &mut DUMMY_BUFFER,
//!         &mut BLOCKING_BUFFER,
//!     )
//! );
//! flash.register()?;
//! debug!("flash id {:02x?}", flash.read_identification()?);
//! ```

use core::cell::Cell;

use capsules_core::timer_table::TimerTable;
use capsules_core::virtualizers::bus_arbiter::BusArbiter;
use capsules_core::virtualizers::dma_arbiter::DmaArbiter;
use kernel::hil;
use kernel::hil::dma::{DmaClient, DmaController};
use kernel::hil::gpio::Output;
use kernel::hil::spi::{BusIdleClient, SpiPort};
use kernel::hil::time::{TimerClient, TimerSlots};
use kernel::sched::Yield;
use kernel::utilities::cells::{OptionalCell, TakeCell};
use kernel::ErrorCode;

mod erase;
mod read;
mod write;

pub const PAGE_SIZE: usize = 256;
pub const PAGES_PER_SECTOR: usize = 256;
pub const SECTOR_COUNT: usize = 16;
pub const PAGE_COUNT: usize = PAGES_PER_SECTOR * SECTOR_COUNT;
pub const SECTOR_SIZE: usize = PAGE_SIZE * PAGES_PER_SECTOR;

/// Value of every byte of an erased page.
pub const ERASED_BYTE: u8 = 0xFF;

/// DMA channel that feeds the port's transmit FIFO.
pub const TX_CHANNEL: usize = 0;
/// DMA channel that drains the port's receive FIFO.
pub const RX_CHANNEL: usize = 1;

/// Ticks between status polls while a page is being programmed.
const WRITE_POLL_TICKS: u32 = 2;
/// Ticks between status polls once an erase outlasted its first delay.
const ERASE_POLL_TICKS: u32 = 100;
/// First poll after a sector erase, the datasheet's typical 600 ms.
const SECTOR_ERASE_FIRST_POLL_TICKS: u32 = 600;
/// First poll after a bulk erase, the datasheet's typical 8 s.
const BULK_ERASE_FIRST_POLL_TICKS: u32 = 8000;

const STATUS_WIP: u8 = 1 << 0;
const STATUS_WEL: u8 = 1 << 1;

#[allow(dead_code)]
#[derive(Clone, Copy)]
enum Opcodes {
    WREN = 0x06,      // Write Enable
    WRDI = 0x04,      // Write Disable
    RDID = 0x9F,      // Read Identification
    RDSR = 0x05,      // Read Status Register
    WRSR = 0x01,      // Write Status Register
    READ = 0x03,      // Read Data Bytes
    FAST_READ = 0x0B, // Read Data Bytes at Higher Speed
    PP = 0x02,        // Page Program
    SE = 0xD8,        // Sector Erase
    BE = 0xC7,        // Bulk Erase
}

/// A page number known to be on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageIndex(u16);

impl PageIndex {
    pub fn new(page: usize) -> Result<PageIndex, ErrorCode> {
        if page < PAGE_COUNT {
            Ok(PageIndex(page as u16))
        } else {
            Err(ErrorCode::INVAL)
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn sector(self) -> SectorIndex {
        SectorIndex((self.get() / PAGES_PER_SECTOR) as u8)
    }

    /// Byte address of the first byte of the page.
    pub fn address(self) -> u32 {
        (self.get() * PAGE_SIZE) as u32
    }
}

/// A sector number known to be on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SectorIndex(u8);

impl SectorIndex {
    pub fn new(sector: usize) -> Result<SectorIndex, ErrorCode> {
        if sector < SECTOR_COUNT {
            Ok(SectorIndex(sector as u8))
        } else {
            Err(ErrorCode::INVAL)
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn first_page(self) -> PageIndex {
        PageIndex((self.get() * PAGES_PER_SECTOR) as u16)
    }

    /// Byte address of the first byte of the sector.
    pub fn address(self) -> u32 {
        (self.get() * SECTOR_SIZE) as u32
    }
}

/// The three operation flags of one chip.
///
/// Write and erase are never set together.
#[derive(Default)]
struct OperationState {
    read_in_progress: Cell<bool>,
    write_in_progress: Cell<bool>,
    erase_in_progress: Cell<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ReadState {
    Idle,
    /// Both channels armed, page streaming in.
    Transferring { page: PageIndex },
    /// Receive channel done, waiting for the port to go idle.
    Draining { page: PageIndex },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum WriteState {
    Idle,
    /// Staging buffer streaming out on the transmit channel.
    Streaming { page: PageIndex },
    /// Transmit channel done, waiting for the port to go idle.
    Draining { page: PageIndex },
    /// Chip select released, device programming, status polled by timer.
    Programming { page: PageIndex },
}

/// Who gets the buffer of the read in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ReadOwner {
    Client,
    Blocking,
}

pub struct M25p80<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> {
    bus: &'a BusArbiter<'a, P>,
    dma: &'a DmaArbiter<'a, D>,
    timers: &'a TimerTable<'a>,
    yielder: &'a dyn Yield,
    chip_select: &'a CS,
    client: OptionalCell<&'a dyn hil::flash::Client>,
    state: OperationState,
    read_state: Cell<ReadState>,
    write_state: Cell<WriteState>,
    read_owner: Cell<ReadOwner>,
    read_failed: Cell<bool>,
    /// Page buffer handed back by the receive channel, until the read ends.
    read_buffer: TakeCell<'static, [u8]>,
    /// One byte clocked out repeatedly while reading.
    dummy: TakeCell<'static, [u8]>,
    staging: TakeCell<'static, [u8]>,
    staging_in_use: Cell<bool>,
    /// Target of blocking reads, copied out to the caller.
    blocking_buffer: TakeCell<'static, [u8]>,
    /// Page and result of the last blocking read that landed.
    blocking_result: Cell<Option<(PageIndex, Result<(), ErrorCode>)>>,
    poll_slot: OptionalCell<usize>,
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> M25p80<'a, P, D, CS> {
    pub fn new(
        bus: &'a BusArbiter<'a, P>,
        dma: &'a DmaArbiter<'a, D>,
        timers: &'a TimerTable<'a>,
        yielder: &'a dyn Yield,
        chip_select: &'a CS,
        staging: &'static mut [u8],
        dummy: &'static mut [u8],
        blocking_buffer: &'static mut [u8],
    ) -> M25p80<'a, P, D, CS> {
        chip_select.set();
        M25p80 {
            bus,
            dma,
            timers,
            yielder,
            chip_select,
            client: OptionalCell::empty(),
            state: OperationState::default(),
            read_state: Cell::new(ReadState::Idle),
            write_state: Cell::new(WriteState::Idle),
            read_owner: Cell::new(ReadOwner::Client),
            read_failed: Cell::new(false),
            read_buffer: TakeCell::empty(),
            dummy: TakeCell::new(dummy),
            staging: TakeCell::new(staging),
            staging_in_use: Cell::new(false),
            blocking_buffer: TakeCell::new(blocking_buffer),
            blocking_result: Cell::new(None),
            poll_slot: OptionalCell::empty(),
        }
    }

    /// Hook the driver into the DMA interrupt, the bus idle interrupt and a
    /// timer slot for status polling.
    ///
    /// Fails with `SIZE` if the staging or blocking buffer is shorter than a
    /// page, or the dummy buffer is empty.
    pub fn register(&'a self) -> Result<(), ErrorCode> {
        let page_sized =
            |cell: &TakeCell<'static, [u8]>| cell.map_or(false, |b| b.len() >= PAGE_SIZE);
        if !page_sized(&self.staging)
            || !page_sized(&self.blocking_buffer)
            || self.dummy.map_or(true, |dummy| dummy.is_empty())
        {
            return Err(ErrorCode::SIZE);
        }
        self.dma.register(TX_CHANNEL, self)?;
        self.dma.register(RX_CHANNEL, self)?;
        self.bus.add_idle_client(self)?;
        let slot = self.timers.add(self, 0)?;
        self.poll_slot.set(slot);
        Ok(())
    }

    pub fn read_in_progress(&self) -> bool {
        self.state.read_in_progress.get()
    }

    pub fn write_in_progress(&self) -> bool {
        self.state.write_in_progress.get()
    }

    pub fn erase_in_progress(&self) -> bool {
        self.state.erase_in_progress.get()
    }

    /// No operation in flight, and no `write_page` holding the staging
    /// buffer while it waits for the bus.
    pub fn is_idle(&self) -> bool {
        !self.read_in_progress()
            && !self.write_in_progress()
            && !self.erase_in_progress()
            && !self.staging_in_use.get()
    }

    /// Read the JEDEC manufacturer, memory type and capacity bytes.
    ///
    /// Does not wait for the bus.
    pub fn read_identification(&self) -> Result<[u8; 3], ErrorCode> {
        if !self.bus.try_acquire() {
            return Err(ErrorCode::BUSY);
        }
        let port = self.bus.port();
        let mut id = [0; 3];
        self.chip_select.clear();
        port.transfer(Opcodes::RDID as u8);
        for byte in id.iter_mut() {
            *byte = port.transfer(0);
        }
        self.chip_select.set();
        self.bus.release();
        Ok(id)
    }

    /// Read the device status register.
    ///
    /// Does not wait for the bus.
    pub fn read_status(&self) -> Result<u8, ErrorCode> {
        if !self.bus.try_acquire() {
            return Err(ErrorCode::BUSY);
        }
        let status = self.read_status_register();
        self.bus.release();
        Ok(status)
    }

    /// Clock a complete one-byte command frame. The bus must be held.
    fn short_command(&self, opcode: Opcodes) {
        let port = self.bus.port();
        self.chip_select.clear();
        port.transfer(opcode as u8);
        self.chip_select.set();
        port.flush_rx();
    }

    /// Clock an opcode and a 24-bit address, leaving chip select asserted.
    fn address_command(&self, opcode: Opcodes, address: u32) {
        let port = self.bus.port();
        port.transfer(opcode as u8);
        port.transfer((address >> 16) as u8);
        port.transfer((address >> 8) as u8);
        port.transfer((address >> 0) as u8);
        port.flush_rx();
    }

    /// The bus must be held.
    fn read_status_register(&self) -> u8 {
        let port = self.bus.port();
        port.flush_rx();
        self.chip_select.clear();
        port.transfer(Opcodes::RDSR as u8);
        let status = port.transfer(0);
        self.chip_select.set();
        status
    }

    /// Send write-enable and spin until the latch reads back as set. The bus
    /// must be held.
    fn enable_write(&self) {
        self.short_command(Opcodes::WREN);
        while self.read_status_register() & STATUS_WEL == 0 {}
    }

    fn arm_poll(&self, ticks: u32) {
        self.poll_slot.map(|slot| self.timers.arm(slot, ticks));
    }
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> DmaClient
    for M25p80<'a, P, D, CS>
{
    fn transfer_done(&self, channel: usize) -> bool {
        match channel {
            TX_CHANNEL => self.read_tx_done() || self.write_tx_done(),
            RX_CHANNEL => self.read_rx_done(false),
            _ => false,
        }
    }

    fn transfer_error(&self, channel: usize) -> bool {
        // There is no abort path; a failed channel ends its stage like a
        // completed one and a failed read reports FAIL.
        match channel {
            TX_CHANNEL => self.read_tx_done() || self.write_tx_done(),
            RX_CHANNEL => self.read_rx_done(true),
            _ => false,
        }
    }
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> BusIdleClient
    for M25p80<'a, P, D, CS>
{
    fn bus_idle(&self) -> bool {
        self.read_drained() || self.write_drained()
    }
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> TimerClient
    for M25p80<'a, P, D, CS>
{
    fn fired(&self, slot: usize) {
        if self.poll_slot.get() == Some(slot) {
            self.poll_device_status();
        }
    }
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> hil::flash::HasClient<'a>
    for M25p80<'a, P, D, CS>
{
    fn set_client(&self, client: &'a dyn hil::flash::Client) {
        self.client.set(client);
    }
}

impl<'a, P: SpiPort + 'a, D: DmaController + 'a, CS: Output + 'a> hil::flash::PagedFlash
    for M25p80<'a, P, D, CS>
{
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn page_count(&self) -> usize {
        PAGE_COUNT
    }

    fn pages_per_sector(&self) -> usize {
        PAGES_PER_SECTOR
    }

    fn read_page(
        &self,
        page: usize,
        buffer: &'static mut [u8],
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        M25p80::read_page(self, page, buffer)
    }

    fn read_page_blocking(&self, page: usize, buffer: &mut [u8]) -> Result<(), ErrorCode> {
        M25p80::read_page_blocking(self, page, buffer)
    }

    fn write_page(&self, page: usize, data: &[u8]) -> Result<(), ErrorCode> {
        M25p80::write_page(self, page, data)
    }

    fn erase_sector(&self, sector: usize) -> Result<(), ErrorCode> {
        M25p80::erase_sector(self, sector)
    }

    fn erase_bulk(&self) -> Result<(), ErrorCode> {
        M25p80::erase_bulk(self)
    }

    fn is_idle(&self) -> bool {
        M25p80::is_idle(self)
    }

    fn read_in_progress(&self) -> bool {
        M25p80::read_in_progress(self)
    }

    fn write_in_progress(&self) -> bool {
        M25p80::write_in_progress(self)
    }

    fn erase_in_progress(&self) -> bool {
        M25p80::erase_in_progress(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{M25p80, PageIndex, SectorIndex, PAGE_COUNT, PAGE_SIZE, RX_CHANNEL, TX_CHANNEL};
    use crate::test::sim;
    use kernel::ErrorCode;

    #[test]
    fn register_checks_buffer_lengths() {
        let bed = sim::bed();
        let short = |staging: usize, dummy: usize, blocking: usize| {
            let flash = sim::leak(M25p80::new(
                bed.bus,
                bed.dma_arbiter,
                bed.timers,
                bed.sched,
                bed.cs,
                sim::buffer(staging),
                sim::buffer(dummy),
                sim::buffer(blocking),
            ));
            flash.register()
        };
        assert_eq!(short(PAGE_SIZE - 1, 1, PAGE_SIZE), Err(ErrorCode::SIZE));
        assert_eq!(short(PAGE_SIZE, 0, PAGE_SIZE), Err(ErrorCode::SIZE));
        assert_eq!(short(PAGE_SIZE, 1, 16), Err(ErrorCode::SIZE));
    }

    #[test]
    fn page_and_sector_addressing() {
        let page = PageIndex::new(3823).unwrap();
        assert_eq!(page.sector().get(), 14);
        assert_eq!(page.address(), 3823 * 256);
        assert_eq!(PageIndex::new(PAGE_COUNT), Err(ErrorCode::INVAL));

        let sector = SectorIndex::new(15).unwrap();
        assert_eq!(sector.first_page().get(), 3840);
        assert_eq!(sector.address(), 0x0F_0000);
        assert_eq!(SectorIndex::new(16), Err(ErrorCode::INVAL));
    }

    #[test]
    fn reads_jedec_identification() {
        let bed = sim::bed();
        assert_eq!(bed.flash.read_identification(), Ok([0x20, 0x20, 0x14]));
        assert!(!bed.bus.is_held());
    }

    #[test]
    fn identification_does_not_wait_for_a_held_bus() {
        let bed = sim::bed();
        assert!(bed.bus.try_acquire());
        assert_eq!(bed.flash.read_identification(), Err(ErrorCode::BUSY));
        assert_eq!(bed.flash.read_status(), Err(ErrorCode::BUSY));
        bed.bus.release();
        assert_eq!(bed.flash.read_status(), Ok(0));
    }

    #[test]
    fn leases_are_returned_after_each_operation() {
        let bed = sim::bed();
        let data = [0x5Au8; 256];
        bed.flash.write_page(7, &data).unwrap();
        bed.settle();
        let mut back = [0u8; 256];
        bed.flash.read_page_blocking(7, &mut back).unwrap();
        bed.flash.erase_sector(0).unwrap();
        bed.settle();

        assert!(!bed.bus.is_held());
        assert!(!bed.dma_arbiter.is_leased(TX_CHANNEL));
        assert!(!bed.dma_arbiter.is_leased(RX_CHANNEL));
        assert!(!bed.port.idle_interrupt_enabled());
        assert!(bed.cs_released());
    }
}
