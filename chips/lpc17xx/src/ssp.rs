// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Synchronous Serial Port (SSP), an ARM PL022, in SPI master mode.
//!
//! Only the FIFO level operations are provided; frame sequencing and chip
//! select belong to the device drivers. The "idle" interrupt is the transmit
//! FIFO half-empty interrupt: once a DMA stream has stopped feeding the FIFO
//! it fires as the FIFO drains.
//!
//! Reference: LPC17xx User Manual (UM10360), chapter 18.

use kernel::hil::spi::{BusIdleClient, SpiPort};
use kernel::utilities::cells::OptionalCell;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite, WriteOnly};
use kernel::utilities::StaticRef;

register_structs! {
    pub SspRegisters {
        /// Control register 0: frame format and serial clock rate
        (0x000 => cr0: ReadWrite<u32, CR0::Register>),
        /// Control register 1: enable and master/slave
        (0x004 => cr1: ReadWrite<u32, CR1::Register>),
        /// Data register, transmit FIFO on write, receive FIFO on read
        (0x008 => dr: ReadWrite<u32, DR::Register>),
        /// Status register
        (0x00C => sr: ReadOnly<u32, SR::Register>),
        /// Clock prescale register
        (0x010 => cpsr: ReadWrite<u32, CPSR::Register>),
        /// Interrupt mask set and clear register
        (0x014 => imsc: ReadWrite<u32, INT::Register>),
        /// Raw interrupt status register
        (0x018 => ris: ReadOnly<u32, INT::Register>),
        /// Masked interrupt status register
        (0x01C => mis: ReadOnly<u32, INT::Register>),
        /// Interrupt clear register
        (0x020 => icr: WriteOnly<u32, INT::Register>),
        /// DMA control register
        (0x024 => dmacr: ReadWrite<u32, DMACR::Register>),
        (0x028 => @END),
    }
}

register_bitfields![u32,
    CR0 [
        /// Data size select
        DSS OFFSET(0) NUMBITS(4) [
            Bits8 = 0b0111
        ],
        /// Frame format
        FRF OFFSET(4) NUMBITS(2) [
            SPI = 0b00,
            TI = 0b01,
            Microwire = 0b10
        ],
        CPOL OFFSET(6) NUMBITS(1) [],
        CPHA OFFSET(7) NUMBITS(1) [],
        /// Serial clock rate
        SCR OFFSET(8) NUMBITS(8) []
    ],
    CR1 [
        /// Loop back mode
        LBM OFFSET(0) NUMBITS(1) [],
        /// SSP enable
        SSE OFFSET(1) NUMBITS(1) [],
        /// Slave mode
        MS OFFSET(2) NUMBITS(1) [],
        /// Slave output disable
        SOD OFFSET(3) NUMBITS(1) []
    ],
    DR [
        DATA OFFSET(0) NUMBITS(16) []
    ],
    SR [
        /// Transmit FIFO empty
        TFE OFFSET(0) NUMBITS(1) [],
        /// Transmit FIFO not full
        TNF OFFSET(1) NUMBITS(1) [],
        /// Receive FIFO not empty
        RNE OFFSET(2) NUMBITS(1) [],
        /// Receive FIFO full
        RFF OFFSET(3) NUMBITS(1) [],
        /// Busy sending or receiving a frame
        BSY OFFSET(4) NUMBITS(1) []
    ],
    CPSR [
        /// Even prescale divisor, 2 to 254
        CPSDVSR OFFSET(0) NUMBITS(8) []
    ],
    INT [
        /// Receive overrun
        ROR OFFSET(0) NUMBITS(1) [],
        /// Receive timeout
        RT OFFSET(1) NUMBITS(1) [],
        /// Receive FIFO at least half full
        RX OFFSET(2) NUMBITS(1) [],
        /// Transmit FIFO at least half empty
        TX OFFSET(3) NUMBITS(1) []
    ],
    DMACR [
        RXDMAE OFFSET(0) NUMBITS(1) [],
        TXDMAE OFFSET(1) NUMBITS(1) []
    ]
];

pub const SSP0_BASE: StaticRef<SspRegisters> =
    unsafe { StaticRef::new(0x4008_8000 as *const SspRegisters) };
pub const SSP1_BASE: StaticRef<SspRegisters> =
    unsafe { StaticRef::new(0x4003_0000 as *const SspRegisters) };

/// Smallest valid even prescaler that keeps the bus at or below `bus_hz`.
fn prescaler(pclk_hz: u32, bus_hz: u32) -> u32 {
    let divisor = pclk_hz.div_ceil(bus_hz.max(1));
    let even = divisor + (divisor & 1);
    even.clamp(2, 254)
}

pub struct Ssp<'a> {
    registers: StaticRef<SspRegisters>,
    idle_client: OptionalCell<&'a dyn BusIdleClient>,
}

impl<'a> Ssp<'a> {
    pub const fn new(registers: StaticRef<SspRegisters>) -> Ssp<'a> {
        Ssp {
            registers,
            idle_client: OptionalCell::empty(),
        }
    }

    pub fn set_idle_client(&self, client: &'a dyn BusIdleClient) {
        self.idle_client.set(client);
    }

    /// Master, 8-bit frames, SPI mode 0, clocked at most at `bus_hz`.
    pub fn init(&self, pclk_hz: u32, bus_hz: u32) {
        self.registers.cr1.write(CR1::SSE::CLEAR);
        self.registers
            .cr0
            .write(CR0::DSS::Bits8 + CR0::FRF::SPI + CR0::SCR.val(0));
        self.registers
            .cpsr
            .write(CPSR::CPSDVSR.val(prescaler(pclk_hz, bus_hz)));
        self.registers.imsc.set(0);
        self.registers.dmacr.set(0);
        self.registers.icr.write(INT::ROR::SET + INT::RT::SET);
        self.registers.cr1.write(CR1::SSE::SET);
        self.flush_rx();
    }

    pub fn handle_interrupt(&self) {
        if self.registers.mis.is_set(INT::ROR) {
            self.registers.icr.write(INT::ROR::SET);
        }
        if self.registers.mis.is_set(INT::TX) {
            let claimed = self.idle_client.map_or(false, |client| client.bus_idle());
            if !claimed {
                self.disable_idle_interrupt();
            }
        }
    }
}

impl SpiPort for Ssp<'_> {
    fn write_byte(&self, byte: u8) {
        while !self.registers.sr.is_set(SR::TNF) {}
        self.registers.dr.write(DR::DATA.val(byte as u32));
    }

    fn read_byte(&self) -> Option<u8> {
        if self.registers.sr.is_set(SR::RNE) {
            Some(self.registers.dr.read(DR::DATA) as u8)
        } else {
            None
        }
    }

    fn is_busy(&self) -> bool {
        self.registers.sr.is_set(SR::BSY)
    }

    fn flush_rx(&self) {
        while self.registers.sr.is_set(SR::RNE) {
            let _ = self.registers.dr.get();
        }
    }

    fn set_dma_requests(&self, tx: bool, rx: bool) {
        self.registers
            .dmacr
            .write(DMACR::TXDMAE.val(tx as u32) + DMACR::RXDMAE.val(rx as u32));
    }

    fn enable_idle_interrupt(&self) {
        self.registers.imsc.modify(INT::TX::SET);
    }

    fn disable_idle_interrupt(&self) {
        self.registers.imsc.modify(INT::TX::CLEAR);
    }
}
