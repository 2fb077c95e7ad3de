// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The hardware adapter boundary.
//!
//! Bus controllers differ a lot in how they are brought up, but the register transport only needs
//! a small set of capabilities from them: create a bus on two pins, bind a 7-bit device address at
//! a given clock, and run two kinds of transaction against that device. [`Controller`] covers the
//! binding half, and [`Device`] covers the transaction half. Everything protocol related (chunking,
//! byte order, write verification) lives above this boundary and is written once.
use core::fmt::Debug;
use core::time::Duration;

use crate::common::BusPins;

/// The ways a single bus transaction can fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// The transaction did not complete within its timeout.
    Timeout,

    /// The device did not acknowledge its address or a data byte.
    Nack,

    /// Any other failure (arbitration lost, bus stuck, driver error).
    BusFault,
}

/// Classify a controller error into a [`FaultKind`].
///
/// The provided implementation treats everything as [`FaultKind::BusFault`], which is the best
/// that can be done for error types that carry no detail.
pub trait Fault {
    fn fault_kind(&self) -> FaultKind {
        FaultKind::BusFault
    }
}

impl Fault for FaultKind {
    fn fault_kind(&self) -> FaultKind {
        *self
    }
}

/// A device binding: one 7-bit address on a bus at a fixed clock.
///
/// Both transactions block until they complete or `timeout` elapses.
pub trait Device {
    type Error: Fault + Debug;

    /// Write `bytes` to the device, followed by a stop condition.
    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), Self::Error>;

    /// Write `bytes`, then issue a repeated start and fill `buffer` from the device.
    ///
    /// Every byte of `buffer` is acknowledged except the last one, followed by a stop condition.
    fn transmit_receive(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<(), Self::Error>;
}

/// Creates and destroys bus and device bindings.
///
/// A [`BusSession`][crate::BusSession] is the only user of a controller, and it guarantees that at
/// most one device is bound at any time, and that a device is always unbound before the bus it
/// was bound on is destroyed.
pub trait Controller {
    /// A bus binding, claiming the underlying peripheral.
    type Bus;

    /// A device binding on a [`Bus`][Controller::Bus].
    type Device: Device<Error = Self::Error>;

    type Error: Fault + Debug;

    /// The largest number of bytes the controller moves in a single transaction.
    fn max_transfer_len(&self) -> usize;

    /// Whether the bus may be kept while the device is unbound and bound again at a new clock.
    ///
    /// When this is `false` (the default), changing the clock tears down the bus as well.
    fn keeps_bus_on_rebind(&self) -> bool {
        false
    }

    /// Claim the bus peripheral on the given pins.
    fn create_bus(&mut self, pins: BusPins) -> Result<Self::Bus, Self::Error>;

    /// Release the bus peripheral.
    fn destroy_bus(&mut self, bus: Self::Bus) -> Result<(), Self::Error>;

    /// Bind the device at `address` on `bus`, clocked at `clock_hz`.
    fn bind_device(
        &mut self,
        bus: &mut Self::Bus,
        address: u8,
        clock_hz: u32,
    ) -> Result<Self::Device, Self::Error>;

    /// Remove a device binding from `bus`.
    fn unbind_device(&mut self, bus: &mut Self::Bus, device: Self::Device)
        -> Result<(), Self::Error>;

    /// Change the clock of a bound device without unbinding it.
    ///
    /// Returns `Ok(false)` when the controller cannot do this, which is what the provided
    /// implementation does.
    fn retune(
        &mut self,
        _bus: &mut Self::Bus,
        _device: &mut Self::Device,
        _clock_hz: u32,
    ) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
