// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Share one SPI port between several device drivers.
//!
//! Access is a lease: [`BusArbiter::try_acquire`] never waits, it either
//! grants the bus or reports that someone else holds it. The arbiter does not
//! record who the holder is, and [`BusArbiter::release`] always frees the
//! bus. Drivers must release on every path that acquired.
//!
//! The arbiter also owns the port's idle interrupt, which several drivers use
//! to learn that a DMA stream has drained. The interrupt is offered to each
//! registered [`BusIdleClient`] in turn until one claims it.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let bus = static_init!(BusArbiter<'static, Ssp>, BusArbiter::new(&peripherals.ssp0));
//! peripherals.ssp0.set_idle_client(bus);
//! bus.add_idle_client(flash)?;
//! ```

use core::cell::Cell;

use kernel::config;
use kernel::debug;
use kernel::hil::spi::{BusIdleClient, SpiPort};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

/// Maximum number of drivers listening for the idle interrupt.
pub const MAX_IDLE_CLIENTS: usize = 4;

pub struct BusArbiter<'a, P: SpiPort> {
    port: &'a P,
    held: Cell<bool>,
    idle_clients: [OptionalCell<&'a dyn BusIdleClient>; MAX_IDLE_CLIENTS],
    idle_client_count: Cell<usize>,
}

impl<'a, P: SpiPort> BusArbiter<'a, P> {
    pub fn new(port: &'a P) -> BusArbiter<'a, P> {
        BusArbiter {
            port,
            held: Cell::new(false),
            idle_clients: [const { OptionalCell::empty() }; MAX_IDLE_CLIENTS],
            idle_client_count: Cell::new(0),
        }
    }

    /// Take the bus if it is free.
    pub fn try_acquire(&self) -> bool {
        if self.held.get() {
            false
        } else {
            self.held.set(true);
            true
        }
    }

    /// Free the bus. Releasing a free bus is harmless.
    pub fn release(&self) {
        self.held.set(false);
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }

    /// The underlying port, for the current lease holder.
    pub fn port(&self) -> &'a P {
        self.port
    }

    pub fn add_idle_client(&self, client: &'a dyn BusIdleClient) -> Result<(), ErrorCode> {
        let count = self.idle_client_count.get();
        if count >= MAX_IDLE_CLIENTS {
            return Err(ErrorCode::NOMEM);
        }
        self.idle_clients[count].set(client);
        self.idle_client_count.set(count + 1);
        Ok(())
    }

    /// Body of the port's idle interrupt.
    ///
    /// If no client claims it the interrupt is masked, as it would otherwise
    /// keep firing while the transmit FIFO is empty.
    pub fn handle_idle_interrupt(&self) {
        let handled = self
            .idle_clients
            .iter()
            .take(self.idle_client_count.get())
            .any(|slot| slot.map_or(false, |client| client.bus_idle()));
        if !handled {
            if config::CONFIG.trace_bus {
                debug!("bus: unclaimed idle interrupt");
            }
            self.port.disable_idle_interrupt();
        }
    }
}

/// The arbiter is the port's own idle client and fans the interrupt out.
impl<P: SpiPort> BusIdleClient for BusArbiter<'_, P> {
    fn bus_idle(&self) -> bool {
        self.handle_idle_interrupt();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::BusArbiter;
    use core::cell::Cell;
    use kernel::hil::spi::{BusIdleClient, SpiPort};
    use kernel::ErrorCode;

    struct FakePort {
        idle_enabled: Cell<bool>,
    }

    impl SpiPort for FakePort {
        fn write_byte(&self, _byte: u8) {}
        fn read_byte(&self) -> Option<u8> {
            None
        }
        fn is_busy(&self) -> bool {
            false
        }
        fn flush_rx(&self) {}
        fn set_dma_requests(&self, _tx: bool, _rx: bool) {}
        fn enable_idle_interrupt(&self) {
            self.idle_enabled.set(true);
        }
        fn disable_idle_interrupt(&self) {
            self.idle_enabled.set(false);
        }
    }

    struct Listener {
        claims: bool,
        calls: Cell<usize>,
    }

    impl BusIdleClient for Listener {
        fn bus_idle(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.claims
        }
    }

    fn port() -> FakePort {
        FakePort {
            idle_enabled: Cell::new(true),
        }
    }

    #[test]
    fn lease_is_exclusive_until_released() {
        let port = port();
        let bus = BusArbiter::new(&port);
        assert!(bus.try_acquire());
        assert!(bus.is_held());
        assert!(!bus.try_acquire());
        bus.release();
        assert!(bus.try_acquire());
    }

    #[test]
    fn double_release_leaves_bus_free() {
        let port = port();
        let bus = BusArbiter::new(&port);
        assert!(bus.try_acquire());
        bus.release();
        bus.release();
        assert!(!bus.is_held());
        assert!(bus.try_acquire());
        assert!(!bus.try_acquire());
    }

    #[test]
    fn idle_interrupt_stops_at_first_claim() {
        let port = port();
        let bus = BusArbiter::new(&port);
        let first = Listener {
            claims: false,
            calls: Cell::new(0),
        };
        let second = Listener {
            claims: true,
            calls: Cell::new(0),
        };
        let third = Listener {
            claims: true,
            calls: Cell::new(0),
        };
        bus.add_idle_client(&first).unwrap();
        bus.add_idle_client(&second).unwrap();
        bus.add_idle_client(&third).unwrap();

        bus.handle_idle_interrupt();
        assert_eq!(first.calls.get(), 1);
        assert_eq!(second.calls.get(), 1);
        assert_eq!(third.calls.get(), 0);
        assert!(port.idle_enabled.get());
    }

    #[test]
    fn unclaimed_idle_interrupt_is_masked() {
        let port = port();
        let bus = BusArbiter::new(&port);
        let idle = Listener {
            claims: false,
            calls: Cell::new(0),
        };
        bus.add_idle_client(&idle).unwrap();
        bus.handle_idle_interrupt();
        assert_eq!(idle.calls.get(), 1);
        assert!(!port.idle_enabled.get());
    }

    #[test]
    fn arbiter_claims_the_port_interrupt() {
        let port = port();
        let bus = BusArbiter::new(&port);
        let idle = Listener {
            claims: true,
            calls: Cell::new(0),
        };
        bus.add_idle_client(&idle).unwrap();
        let as_client: &dyn BusIdleClient = &bus;
        assert!(as_client.bus_idle());
        assert_eq!(idle.calls.get(), 1);
        assert!(port.idle_enabled.get());
    }

    #[test]
    fn idle_client_table_is_bounded() {
        let port = port();
        let bus = BusArbiter::new(&port);
        let idle = Listener {
            claims: false,
            calls: Cell::new(0),
        };
        for _ in 0..super::MAX_IDLE_CLIENTS {
            bus.add_idle_client(&idle).unwrap();
        }
        assert_eq!(bus.add_idle_client(&idle), Err(ErrorCode::NOMEM));
    }
}
