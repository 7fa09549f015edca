// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interface for a byte-oriented SPI controller port shared by several
//! devices.
//!
//! The port exposes its FIFOs directly: short command sequences are clocked
//! byte by byte by the CPU, while bulk data is moved by DMA once the port's
//! DMA request lines are enabled. The end of a DMA stream is signalled by the
//! port's "idle" interrupt, which fires while the transmit FIFO has room and
//! must be disabled by whoever handles it.

/// A synchronous serial controller port.
pub trait SpiPort {
    /// Push one byte into the transmit FIFO, waiting for room if it is full.
    fn write_byte(&self, byte: u8);

    /// Pop one byte from the receive FIFO.
    fn read_byte(&self) -> Option<u8>;

    /// Whether the port is still shifting data.
    fn is_busy(&self) -> bool;

    /// Discard everything in the receive FIFO.
    fn flush_rx(&self);

    /// Route transmit and receive FIFO requests to the DMA controller.
    fn set_dma_requests(&self, tx: bool, rx: bool);

    fn enable_idle_interrupt(&self);

    fn disable_idle_interrupt(&self);

    /// Clock `byte` out and return the byte clocked in at the same time.
    fn transfer(&self, byte: u8) -> u8 {
        self.write_byte(byte);
        while self.is_busy() {}
        let mut last = 0;
        while let Some(b) = self.read_byte() {
            last = b;
        }
        last
    }
}

/// A driver that wants to hear about the port's idle interrupt.
pub trait BusIdleClient {
    /// Called from the port's idle interrupt. Returns `true` if this client
    /// was waiting for it and handled it.
    fn bus_idle(&self) -> bool;
}
