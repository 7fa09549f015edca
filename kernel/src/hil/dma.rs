// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface for a multi-channel DMA controller.
//!
//! A transfer takes ownership of its memory buffer. Once the channel signals
//! completion (or an error), the owner gets the buffer back with
//! [`DmaController::stop`].

use crate::ErrorCode;

/// Peripheral request lines a channel can be paced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaPeripheral {
    Ssp0Tx,
    Ssp0Rx,
    Ssp1Tx,
    Ssp1Rx,
}

/// One single-block transfer between memory and a peripheral data register.
pub enum Transfer {
    /// Send `len` bytes of `source`. With `increment` unset the first byte is
    /// sent `len` times, which is how bus clock is generated for a read.
    MemoryToPeripheral {
        source: &'static mut [u8],
        len: usize,
        increment: bool,
        peripheral: DmaPeripheral,
    },
    /// Capture `len` bytes from the peripheral into `destination`.
    PeripheralToMemory {
        destination: &'static mut [u8],
        len: usize,
        peripheral: DmaPeripheral,
    },
}

impl Transfer {
    pub fn len(&self) -> usize {
        match self {
            Transfer::MemoryToPeripheral { len, .. } => *len,
            Transfer::PeripheralToMemory { len, .. } => *len,
        }
    }

    /// Whether the memory buffer covers every byte the transfer touches. A
    /// non-incrementing source only needs its first byte.
    pub fn fits_buffer(&self) -> bool {
        match self {
            Transfer::MemoryToPeripheral {
                source,
                len,
                increment: false,
                ..
            } => *len == 0 || !source.is_empty(),
            Transfer::MemoryToPeripheral { source, len, .. } => source.len() >= *len,
            Transfer::PeripheralToMemory {
                destination, len, ..
            } => destination.len() >= *len,
        }
    }

    /// Give the memory buffer back, e.g. after the controller refused it.
    pub fn into_buffer(self) -> &'static mut [u8] {
        match self {
            Transfer::MemoryToPeripheral { source, .. } => source,
            Transfer::PeripheralToMemory { destination, .. } => destination,
        }
    }
}

pub trait DmaController {
    fn channel_count(&self) -> usize;

    /// Program `channel` with `transfer` and enable it.
    fn start(
        &self,
        channel: usize,
        transfer: Transfer,
    ) -> Result<(), (ErrorCode, &'static mut [u8])>;

    /// Disable `channel` and return the buffer of its last transfer.
    fn stop(&self, channel: usize) -> Option<&'static mut [u8]>;

    /// Bit mask of channels with a pending transfer-complete interrupt.
    fn pending_complete(&self) -> u32;

    /// Bit mask of channels with a pending error interrupt.
    fn pending_error(&self) -> u32;

    fn clear_complete(&self, channel: usize);

    fn clear_error(&self, channel: usize);
}

/// A subsystem sharing the DMA interrupt.
///
/// Both callbacks return `true` if the interrupt belonged to this client.
pub trait DmaClient {
    fn transfer_done(&self, channel: usize) -> bool;
    fn transfer_error(&self, channel: usize) -> bool;
}

#[cfg(test)]
mod tests {
    use super::{DmaPeripheral, Transfer};
    use std::boxed::Box;

    fn leak(len: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; len].into_boxed_slice())
    }

    #[test]
    fn constant_source_needs_one_byte() {
        let clock_out = Transfer::MemoryToPeripheral {
            source: leak(1),
            len: 256,
            increment: false,
            peripheral: DmaPeripheral::Ssp0Tx,
        };
        assert!(clock_out.fits_buffer());

        let empty = Transfer::MemoryToPeripheral {
            source: leak(0),
            len: 256,
            increment: false,
            peripheral: DmaPeripheral::Ssp0Tx,
        };
        assert!(!empty.fits_buffer());
    }

    #[test]
    fn incrementing_transfers_need_len_bytes() {
        let program = Transfer::MemoryToPeripheral {
            source: leak(255),
            len: 256,
            increment: true,
            peripheral: DmaPeripheral::Ssp0Tx,
        };
        assert!(!program.fits_buffer());

        let capture = Transfer::PeripheralToMemory {
            destination: leak(256),
            len: 256,
            peripheral: DmaPeripheral::Ssp0Rx,
        };
        assert!(capture.fits_buffer());
        assert_eq!(capture.into_buffer().len(), 256);
    }
}
