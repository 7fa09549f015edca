// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Repetitive Interrupt Timer (RIT).
//!
//! A 32-bit counter compared against RICOMPVAL; on a match it raises its
//! interrupt and, with RITENCLR set, restarts from zero. Used as the periodic
//! tick source of the timer table.
//!
//! Reference: LPC17xx User Manual (UM10360), chapter 22.

use kernel::hil::time::{TickClient, Ticker};
use kernel::utilities::cells::OptionalCell;
use kernel::utilities::registers::interfaces::{ReadWriteable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    pub RitRegisters {
        (0x0 => ricompval: ReadWrite<u32>),
        (0x4 => rimask: ReadWrite<u32>),
        (0x8 => rictrl: ReadWrite<u32, RICTRL::Register>),
        (0xC => ricounter: ReadWrite<u32>),
        (0x10 => @END),
    }
}

register_bitfields![u32,
    RICTRL [
        /// Interrupt flag, write 1 to clear
        RITINT OFFSET(0) NUMBITS(1) [],
        /// Clear the counter on a compare match
        RITENCLR OFFSET(1) NUMBITS(1) [],
        /// Halt while the debugger halts the core
        RITENBR OFFSET(2) NUMBITS(1) [],
        /// Timer enable
        RITEN OFFSET(3) NUMBITS(1) []
    ]
];

pub const RIT_BASE: StaticRef<RitRegisters> =
    unsafe { StaticRef::new(0x400B_0000 as *const RitRegisters) };

/// Compare value giving one match every `period_us` at `pclk_hz`.
fn compare_value(pclk_hz: u32, period_us: u32) -> u32 {
    let ticks = pclk_hz as u64 * period_us as u64 / 1_000_000;
    ticks.clamp(1, u32::MAX as u64) as u32
}

pub struct Rit<'a> {
    registers: StaticRef<RitRegisters>,
    pclk_hz: u32,
    client: OptionalCell<&'a dyn TickClient>,
}

impl<'a> Rit<'a> {
    pub const fn new(registers: StaticRef<RitRegisters>, pclk_hz: u32) -> Rit<'a> {
        Rit {
            registers,
            pclk_hz,
            client: OptionalCell::empty(),
        }
    }

    pub fn handle_interrupt(&self) {
        self.registers.rictrl.modify(RICTRL::RITINT::SET);
        self.client.map(|client| client.tick());
    }
}

impl<'a> Ticker<'a> for Rit<'a> {
    fn set_client(&self, client: &'a dyn TickClient) {
        self.client.set(client);
    }

    fn start(&self, period_us: u32) {
        self.registers.rictrl.write(RICTRL::RITEN::CLEAR);
        self.registers
            .ricompval
            .set(compare_value(self.pclk_hz, period_us));
        self.registers.rimask.set(0);
        self.registers.ricounter.set(0);
        self.registers
            .rictrl
            .write(RICTRL::RITINT::SET + RICTRL::RITENCLR::SET + RICTRL::RITEN::SET);
    }

    fn stop(&self) {
        self.registers.rictrl.modify(RICTRL::RITEN::CLEAR);
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_value, RICTRL};
    use kernel::utilities::registers::LocalRegisterCopy;

    #[test]
    fn one_millisecond_at_common_clocks() {
        assert_eq!(compare_value(96_000_000 / 4, 1000), 24_000);
        assert_eq!(compare_value(96_000_000, 1000), 96_000);
        assert_eq!(compare_value(96_000_000 / 8, 1000), 12_000);
        assert_eq!(compare_value(1, 1), 1);
    }

    #[test]
    fn running_control_value() {
        let ctrl: LocalRegisterCopy<u32, RICTRL::Register> = LocalRegisterCopy::new(
            (RICTRL::RITINT::SET + RICTRL::RITENCLR::SET + RICTRL::RITEN::SET).value,
        );
        assert_eq!(ctrl.get(), 0b1011);
        assert!(!ctrl.is_set(RICTRL::RITENBR));
    }
}
