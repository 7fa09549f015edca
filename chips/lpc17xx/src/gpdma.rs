// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! General Purpose DMA controller (GPDMA), 8 channels.
//!
//! Each channel runs one single-block byte transfer between a memory buffer
//! and an SSP data register. The buffer is held by the driver until the
//! channel is stopped, so the hardware never writes to memory the caller
//! owns again.
//!
//! Reference: LPC17xx User Manual (UM10360), chapter 31.

use kernel::hil::dma::{DmaController, DmaPeripheral, Transfer};
use kernel::utilities::cells::TakeCell;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite, WriteOnly};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

pub const NUM_CHANNELS: usize = 8;

/// Largest transfer one channel can do without linked lists.
pub const MAX_TRANSFER_SIZE: usize = 4095;

register_structs! {
    pub ChannelRegisters {
        (0x00 => srcaddr: ReadWrite<u32>),
        (0x04 => destaddr: ReadWrite<u32>),
        (0x08 => lli: ReadWrite<u32>),
        (0x0C => control: ReadWrite<u32, CONTROL::Register>),
        (0x10 => config: ReadWrite<u32, CHANNEL_CONFIG::Register>),
        (0x14 => _reserved),
        (0x20 => @END),
    }
}

register_structs! {
    pub GpdmaRegisters {
        (0x000 => intstat: ReadOnly<u32>),
        /// Terminal count interrupt status, one bit per channel
        (0x004 => inttcstat: ReadOnly<u32>),
        (0x008 => inttcclear: WriteOnly<u32>),
        /// Error interrupt status, one bit per channel
        (0x00C => interrstat: ReadOnly<u32>),
        (0x010 => interrclr: WriteOnly<u32>),
        (0x014 => rawinttcstat: ReadOnly<u32>),
        (0x018 => rawinterrstat: ReadOnly<u32>),
        (0x01C => enbldchns: ReadOnly<u32>),
        (0x020 => softbreq: ReadWrite<u32>),
        (0x024 => softsreq: ReadWrite<u32>),
        (0x028 => softlbreq: ReadWrite<u32>),
        (0x02C => softlsreq: ReadWrite<u32>),
        (0x030 => config: ReadWrite<u32, CONFIG::Register>),
        (0x034 => sync: ReadWrite<u32>),
        (0x038 => _reserved),
        (0x100 => channels: [ChannelRegisters; NUM_CHANNELS]),
        (0x200 => @END),
    }
}

register_bitfields![u32,
    CONFIG [
        /// Controller enable
        E OFFSET(0) NUMBITS(1) [],
        /// Big-endian master
        M OFFSET(1) NUMBITS(1) []
    ],
    CONTROL [
        TRANSFER_SIZE OFFSET(0) NUMBITS(12) [],
        SBSIZE OFFSET(12) NUMBITS(3) [],
        DBSIZE OFFSET(15) NUMBITS(3) [],
        SWIDTH OFFSET(18) NUMBITS(3) [
            Byte = 0,
            HalfWord = 1,
            Word = 2
        ],
        DWIDTH OFFSET(21) NUMBITS(3) [
            Byte = 0,
            HalfWord = 1,
            Word = 2
        ],
        /// Source increment
        SI OFFSET(26) NUMBITS(1) [],
        /// Destination increment
        DI OFFSET(27) NUMBITS(1) [],
        PROT OFFSET(28) NUMBITS(3) [],
        /// Terminal count interrupt enable
        I OFFSET(31) NUMBITS(1) []
    ],
    CHANNEL_CONFIG [
        E OFFSET(0) NUMBITS(1) [],
        SRC_PERIPHERAL OFFSET(1) NUMBITS(5) [],
        DEST_PERIPHERAL OFFSET(6) NUMBITS(5) [],
        TRANSFER_TYPE OFFSET(11) NUMBITS(3) [
            MemoryToMemory = 0,
            MemoryToPeripheral = 1,
            PeripheralToMemory = 2,
            PeripheralToPeripheral = 3
        ],
        /// Error interrupt unmask
        IE OFFSET(14) NUMBITS(1) [],
        /// Terminal count interrupt unmask
        ITC OFFSET(15) NUMBITS(1) [],
        L OFFSET(16) NUMBITS(1) [],
        /// FIFO has data
        A OFFSET(17) NUMBITS(1) [],
        H OFFSET(18) NUMBITS(1) []
    ]
];

pub const GPDMA_BASE: StaticRef<GpdmaRegisters> =
    unsafe { StaticRef::new(0x5000_4000 as *const GpdmaRegisters) };

const SSP0_DR: u32 = 0x4008_8008;
const SSP1_DR: u32 = 0x4003_0008;

/// DMA request line and data register of a peripheral.
fn peripheral(peripheral: DmaPeripheral) -> (u32, u32) {
    match peripheral {
        DmaPeripheral::Ssp0Tx => (0, SSP0_DR),
        DmaPeripheral::Ssp0Rx => (1, SSP0_DR),
        DmaPeripheral::Ssp1Tx => (2, SSP1_DR),
        DmaPeripheral::Ssp1Rx => (3, SSP1_DR),
    }
}

/// Channel control word for a byte-wide transfer of `len` bytes.
fn control(len: usize, source_increment: bool, destination_increment: bool) -> u32 {
    (CONTROL::TRANSFER_SIZE.val(len as u32)
        + CONTROL::SWIDTH::Byte
        + CONTROL::DWIDTH::Byte
        + CONTROL::SI.val(source_increment as u32)
        + CONTROL::DI.val(destination_increment as u32)
        + CONTROL::I::SET)
        .value
}

pub struct Gpdma {
    registers: StaticRef<GpdmaRegisters>,
    buffers: [TakeCell<'static, [u8]>; NUM_CHANNELS],
}

impl Gpdma {
    pub const fn new(registers: StaticRef<GpdmaRegisters>) -> Gpdma {
        Gpdma {
            registers,
            buffers: [const { TakeCell::empty() }; NUM_CHANNELS],
        }
    }

    /// Power-on state: controller enabled little-endian, no pending flags.
    pub fn init(&self) {
        self.registers.inttcclear.set(0xFF);
        self.registers.interrclr.set(0xFF);
        self.registers.config.write(CONFIG::E::SET);
        while !self.registers.config.is_set(CONFIG::E) {}
    }

    fn channel_enabled(&self, channel: usize) -> bool {
        self.registers.enbldchns.get() & (1 << channel) != 0
    }
}

impl DmaController for Gpdma {
    fn channel_count(&self) -> usize {
        NUM_CHANNELS
    }

    fn start(
        &self,
        channel: usize,
        transfer: Transfer,
    ) -> Result<(), (ErrorCode, &'static mut [u8])> {
        if channel >= NUM_CHANNELS {
            return Err((ErrorCode::INVAL, transfer.into_buffer()));
        }
        if self.channel_enabled(channel) || self.buffers[channel].is_some() {
            return Err((ErrorCode::BUSY, transfer.into_buffer()));
        }
        let len = transfer.len();
        if len == 0 || len > MAX_TRANSFER_SIZE || !transfer.fits_buffer() {
            return Err((ErrorCode::SIZE, transfer.into_buffer()));
        }

        let registers = &self.registers.channels[channel];
        let (buffer, source_address, destination_address, control_word, config) = match transfer {
            Transfer::MemoryToPeripheral {
                source,
                increment,
                peripheral: target,
                ..
            } => {
                let (line, data_register) = peripheral(target);
                let address = source.as_ptr() as u32;
                (
                    source,
                    address,
                    data_register,
                    control(len, increment, false),
                    CHANNEL_CONFIG::DEST_PERIPHERAL.val(line)
                        + CHANNEL_CONFIG::TRANSFER_TYPE::MemoryToPeripheral,
                )
            }
            Transfer::PeripheralToMemory {
                destination,
                peripheral: target,
                ..
            } => {
                let (line, data_register) = peripheral(target);
                let address = destination.as_ptr() as u32;
                (
                    destination,
                    data_register,
                    address,
                    control(len, false, true),
                    CHANNEL_CONFIG::SRC_PERIPHERAL.val(line)
                        + CHANNEL_CONFIG::TRANSFER_TYPE::PeripheralToMemory,
                )
            }
        };

        self.registers.inttcclear.set(1 << channel);
        self.registers.interrclr.set(1 << channel);
        registers.srcaddr.set(source_address);
        registers.destaddr.set(destination_address);
        registers.lli.set(0);
        registers.control.set(control_word);
        self.buffers[channel].replace(buffer);
        registers.config.write(
            config + CHANNEL_CONFIG::IE::SET + CHANNEL_CONFIG::ITC::SET + CHANNEL_CONFIG::E::SET,
        );
        Ok(())
    }

    fn stop(&self, channel: usize) -> Option<&'static mut [u8]> {
        if channel >= NUM_CHANNELS {
            return None;
        }
        self.registers.channels[channel]
            .config
            .modify(CHANNEL_CONFIG::E::CLEAR);
        self.buffers[channel].take()
    }

    fn pending_complete(&self) -> u32 {
        self.registers.inttcstat.get()
    }

    fn pending_error(&self) -> u32 {
        self.registers.interrstat.get()
    }

    fn clear_complete(&self, channel: usize) {
        self.registers.inttcclear.set(1 << channel);
    }

    fn clear_error(&self, channel: usize) {
        self.registers.interrclr.set(1 << channel);
    }
}

#[cfg(test)]
mod tests {
    use super::{control, peripheral, CONTROL};
    use kernel::hil::dma::DmaPeripheral;
    use kernel::utilities::registers::LocalRegisterCopy;

    #[test]
    fn read_clocking_control_word() {
        let word: LocalRegisterCopy<u32, CONTROL::Register> =
            LocalRegisterCopy::new(control(256, false, false));
        assert_eq!(word.read(CONTROL::TRANSFER_SIZE), 256);
        assert!(!word.is_set(CONTROL::SI));
        assert!(!word.is_set(CONTROL::DI));
        assert!(word.is_set(CONTROL::I));
        assert_eq!(word.read(CONTROL::SWIDTH), 0);
        assert_eq!(word.read(CONTROL::DWIDTH), 0);
    }

    #[test]
    fn capture_increments_destination_only() {
        let word = control(256, false, true);
        assert_eq!(word, 256 | (1 << 27) | (1 << 31));
        assert_eq!(control(16, true, false), 16 | (1 << 26) | (1 << 31));
    }

    #[test]
    fn ssp0_request_lines() {
        assert_eq!(peripheral(DmaPeripheral::Ssp0Tx), (0, 0x4008_8008));
        assert_eq!(peripheral(DmaPeripheral::Ssp0Rx), (1, 0x4008_8008));
        assert_eq!(peripheral(DmaPeripheral::Ssp1Rx).0, 3);
    }
}
