// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Share the channels of one DMA controller between subsystems.
//!
//! Each channel is leased with the same non-blocking discipline as the bus
//! (see [`super::bus_arbiter`]). Independently of the lease, every channel
//! keeps an ordered list of [`DmaClient`]s. When the controller interrupts,
//! each pending channel's clients are asked in registration order whether
//! the event was theirs; the first that says yes ends the walk. The hardware
//! flag is cleared whether or not anybody claimed it.

use core::cell::Cell;

use kernel::config;
use kernel::debug;
use kernel::hil::dma::{DmaClient, DmaController};
use kernel::utilities::cells::OptionalCell;
use kernel::ErrorCode;

/// Number of channels the arbiter can manage.
pub const MAX_CHANNELS: usize = 8;

/// Number of clients that can share one channel's interrupt.
pub const MAX_CLIENTS_PER_CHANNEL: usize = 4;

struct Channel<'a> {
    leased: Cell<bool>,
    clients: [OptionalCell<&'a dyn DmaClient>; MAX_CLIENTS_PER_CHANNEL],
    client_count: Cell<usize>,
}

impl<'a> Channel<'a> {
    const fn new() -> Channel<'a> {
        Channel {
            leased: Cell::new(false),
            clients: [const { OptionalCell::empty() }; MAX_CLIENTS_PER_CHANNEL],
            client_count: Cell::new(0),
        }
    }

    fn clients(&self) -> impl Iterator<Item = &'a dyn DmaClient> + '_ {
        self.clients
            .iter()
            .take(self.client_count.get())
            .filter_map(|slot| slot.get())
    }
}

pub struct DmaArbiter<'a, D: DmaController> {
    dma: &'a D,
    channels: [Channel<'a>; MAX_CHANNELS],
}

impl<'a, D: DmaController> DmaArbiter<'a, D> {
    pub fn new(dma: &'a D) -> DmaArbiter<'a, D> {
        DmaArbiter {
            dma,
            channels: [const { Channel::new() }; MAX_CHANNELS],
        }
    }

    /// Channels that exist on both the controller and the arbiter.
    pub fn channel_count(&self) -> usize {
        core::cmp::min(MAX_CHANNELS, self.dma.channel_count())
    }

    fn channel(&self, channel: usize) -> Option<&Channel<'a>> {
        if channel < self.channel_count() {
            self.channels.get(channel)
        } else {
            None
        }
    }

    /// The controller, for the current lease holder.
    pub fn controller(&self) -> &'a D {
        self.dma
    }

    /// Lease `channel` if it exists and is free.
    pub fn try_acquire(&self, channel: usize) -> bool {
        self.channel(channel).map_or(false, |ch| {
            if ch.leased.get() {
                false
            } else {
                ch.leased.set(true);
                true
            }
        })
    }

    /// Return `channel`. Releasing a free or unknown channel does nothing.
    pub fn release(&self, channel: usize) {
        if let Some(ch) = self.channel(channel) {
            ch.leased.set(false);
        }
    }

    pub fn is_leased(&self, channel: usize) -> bool {
        self.channel(channel).map_or(false, |ch| ch.leased.get())
    }

    /// Append `client` to the interrupt list of `channel`.
    pub fn register(&self, channel: usize, client: &'a dyn DmaClient) -> Result<(), ErrorCode> {
        let ch = self.channel(channel).ok_or(ErrorCode::INVAL)?;
        let count = ch.client_count.get();
        if count >= MAX_CLIENTS_PER_CHANNEL {
            return Err(ErrorCode::NOMEM);
        }
        ch.clients[count].set(client);
        ch.client_count.set(count + 1);
        Ok(())
    }

    /// Offer a transfer-complete event on `channel` to its clients.
    pub fn dispatch_complete(&self, channel: usize) {
        let Some(ch) = self.channel(channel) else {
            return;
        };
        let handled = ch.clients().any(|client| client.transfer_done(channel));
        if !handled && config::CONFIG.trace_dma {
            debug!("dma: unclaimed completion on channel {}", channel);
        }
        self.dma.clear_complete(channel);
    }

    /// Offer an error event on `channel` to its clients.
    pub fn dispatch_error(&self, channel: usize) {
        let Some(ch) = self.channel(channel) else {
            return;
        };
        let handled = ch.clients().any(|client| client.transfer_error(channel));
        if !handled && config::CONFIG.trace_dma {
            debug!("dma: unclaimed error on channel {}", channel);
        }
        self.dma.clear_error(channel);
    }

    /// Body of the DMA controller interrupt.
    pub fn handle_interrupt(&self) {
        let complete = self.dma.pending_complete();
        let error = self.dma.pending_error();
        for channel in 0..self.channel_count() {
            let bit = 1u32 << channel;
            if complete & bit != 0 {
                self.dispatch_complete(channel);
            }
            if error & bit != 0 {
                self.dispatch_error(channel);
            }
        }
    }
}
