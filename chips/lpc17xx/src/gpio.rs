// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Fast GPIO outputs (FIO), five 32-pin ports.
//!
//! Reference: LPC17xx User Manual (UM10360), chapter 9.

use kernel::hil::gpio;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadWrite, WriteOnly};
use kernel::utilities::StaticRef;

pub const NUM_PORTS: usize = 5;

register_structs! {
    pub GpioPortRegisters {
        (0x00 => fiodir: ReadWrite<u32>),
        (0x04 => _reserved),
        (0x10 => fiomask: ReadWrite<u32>),
        (0x14 => fiopin: ReadWrite<u32>),
        (0x18 => fioset: WriteOnly<u32>),
        (0x1C => fioclr: WriteOnly<u32>),
        (0x20 => @END),
    }
}

register_structs! {
    pub GpioRegisters {
        (0x000 => ports: [GpioPortRegisters; NUM_PORTS]),
        (0x0A0 => @END),
    }
}

pub const GPIO_BASE: StaticRef<GpioRegisters> =
    unsafe { StaticRef::new(0x2009_C000 as *const GpioRegisters) };

pub struct GpioPin {
    registers: StaticRef<GpioRegisters>,
    port: usize,
    mask: u32,
}

impl GpioPin {
    /// Pin `P<port>.<pin>`, e.g. the flash chip select on P1.31.
    pub const fn new(registers: StaticRef<GpioRegisters>, port: usize, pin: u32) -> GpioPin {
        assert!(port < NUM_PORTS && pin < 32);
        GpioPin {
            registers,
            port,
            mask: 1 << pin,
        }
    }

    fn port(&self) -> &GpioPortRegisters {
        &self.registers.ports[self.port]
    }

    pub fn make_output(&self) {
        let port = self.port();
        port.fiomask.set(port.fiomask.get() & !self.mask);
        port.fiodir.set(port.fiodir.get() | self.mask);
    }
}

impl gpio::Output for GpioPin {
    fn set(&self) {
        self.port().fioset.set(self.mask);
    }

    fn clear(&self) {
        self.port().fioclr.set(self.mask);
    }

    fn is_set(&self) -> bool {
        self.port().fiopin.get() & self.mask != 0
    }
}
