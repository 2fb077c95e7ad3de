// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A [`Controller`] for any [`embedded-hal`][embedded-hal] blocking I²C bus.
//!
//! `embedded-hal` buses come already configured (pins and clock are set up by whatever created
//! them, like the kernel for [`linux-embedded-hal`][linux-embedded-hal]), so creating a bus here
//! just claims the `embedded-hal` bus, and binding a device just records the address. The clock
//! can't be changed through `embedded-hal`, so it is recorded and otherwise ignored, and there is
//! no per-transaction timeout beyond whatever the underlying driver enforces.
//!
//! `embedded-hal` 0.2 errors are opaque, so bus errors are reported as
//! [`FaultKind::BusFault`] unless the controller is given a [`Classifier`] for them.
//! [`linux_fault_kind`] classifies the errors from `linux-embedded-hal`.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//! [linux-embedded-hal]: https://docs.rs/linux-embedded-hal
#[cfg(feature = "std")]
extern crate std;

use core::fmt;
use core::time::Duration;

use embedded_hal::blocking::i2c;

use crate::common::BusPins;
use crate::controller::{Controller, Device, Fault, FaultKind};
use crate::transport::STAGING_LEN;

/// The transfer limit used by [`HalController::new`].
pub const DEFAULT_MAX_TRANSFER_LEN: usize = STAGING_LEN;

/// Sorts an `embedded-hal` error into a [`FaultKind`].
pub type Classifier<E> = fn(&E) -> FaultKind;

fn unclassified<E>(_err: &E) -> FaultKind {
    FaultKind::BusFault
}

/// Classify the errors from a [`linux_embedded_hal::I2cdev`] by their errno.
///
/// The Linux I²C core reports a missing acknowledgement as `ENXIO` or `EREMOTEIO`, and an
/// expired transfer as `ETIMEDOUT`. Anything else is a bus fault.
#[cfg(all(feature = "std", any(feature = "linux-embedded-hal", test)))]
pub fn linux_fault_kind(err: &linux_embedded_hal::i2cdev::linux::LinuxI2CError) -> FaultKind {
    use linux_embedded_hal::i2cdev::linux::LinuxI2CError;

    const ENXIO: i32 = 6;
    const ETIMEDOUT: i32 = 110;
    const EREMOTEIO: i32 = 121;

    let errno = match err {
        LinuxI2CError::Nix(errno) => Some(*errno as i32),
        LinuxI2CError::Io(err) => err.raw_os_error(),
    };
    match errno {
        Some(ETIMEDOUT) => FaultKind::Timeout,
        Some(ENXIO) | Some(EREMOTEIO) => FaultKind::Nack,
        _ => FaultKind::BusFault,
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError<E> {
    /// The `embedded-hal` bus is already claimed by a bus binding.
    BusClaimed,

    /// A device is already bound on this bus.
    DeviceBound,

    /// The `embedded-hal` implementation reported an error.
    I2c { kind: FaultKind, source: E },
}

impl<E> Fault for HalError<E> {
    fn fault_kind(&self) -> FaultKind {
        match self {
            HalError::I2c { kind, .. } => *kind,
            HalError::BusClaimed | HalError::DeviceBound => FaultKind::BusFault,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for HalError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::BusClaimed => write!(f, "I2C bus is already claimed"),
            HalError::DeviceBound => write!(f, "a device is already bound on this bus"),
            HalError::I2c { kind, source } => write!(f, "I2C Error ({:?}): {:?}", kind, source),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for HalError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HalError::I2c { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Adapts an `embedded-hal` I²C bus to [`Controller`].
#[derive(Debug)]
pub struct HalController<I2C, E> {
    i2c: Option<I2C>,
    max_transfer_len: usize,
    classify: Classifier<E>,
}

/// The claimed `embedded-hal` bus, while no device holds it.
#[derive(Debug)]
pub struct HalBus<I2C> {
    i2c: Option<I2C>,
}

/// A device address bound on an `embedded-hal` bus.
#[derive(Debug)]
pub struct HalDevice<I2C, E> {
    i2c: I2C,
    address: u8,
    clock_hz: u32,
    classify: Classifier<E>,
}

impl<I2C, E> HalDevice<I2C, E> {
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The clock this device was bound at (which `embedded-hal` has no way of applying).
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }
}

impl<I2C, E> HalController<I2C, E>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self::with_max_transfer_len(i2c, DEFAULT_MAX_TRANSFER_LEN)
    }

    /// Use a different transfer limit, for drivers with smaller buffers.
    pub fn with_max_transfer_len(i2c: I2C, max_transfer_len: usize) -> Self {
        Self {
            i2c: Some(i2c),
            max_transfer_len,
            classify: unclassified::<E>,
        }
    }

    /// Classify bus errors with `classify` instead of reporting them all as bus faults.
    pub fn with_classifier(self, classify: Classifier<E>) -> Self {
        Self { classify, ..self }
    }
}

impl<I2C, E> HalController<I2C, E> {
    /// Return the `embedded-hal` bus, if it isn't claimed by a bus binding.
    pub fn release(self) -> Option<I2C> {
        self.i2c
    }
}

impl<I2C, E> Controller for HalController<I2C, E>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: fmt::Debug,
{
    type Bus = HalBus<I2C>;
    type Device = HalDevice<I2C, E>;
    type Error = HalError<E>;

    fn max_transfer_len(&self) -> usize {
        self.max_transfer_len
    }

    fn keeps_bus_on_rebind(&self) -> bool {
        // There's nothing to reconfigure on the bus side.
        true
    }

    fn create_bus(&mut self, _pins: BusPins) -> Result<Self::Bus, Self::Error> {
        let i2c = self.i2c.take().ok_or(HalError::BusClaimed)?;
        Ok(HalBus { i2c: Some(i2c) })
    }

    fn destroy_bus(&mut self, bus: Self::Bus) -> Result<(), Self::Error> {
        // A bus with a bound device can't be destroyed through a session, but be careful anyway.
        let i2c = bus.i2c.ok_or(HalError::DeviceBound)?;
        self.i2c = Some(i2c);
        Ok(())
    }

    fn bind_device(
        &mut self,
        bus: &mut Self::Bus,
        address: u8,
        clock_hz: u32,
    ) -> Result<Self::Device, Self::Error> {
        let i2c = bus.i2c.take().ok_or(HalError::DeviceBound)?;
        Ok(HalDevice {
            i2c,
            address,
            clock_hz,
            classify: self.classify,
        })
    }

    fn unbind_device(
        &mut self,
        bus: &mut Self::Bus,
        device: Self::Device,
    ) -> Result<(), Self::Error> {
        bus.i2c = Some(device.i2c);
        Ok(())
    }
}

impl<I2C, E> Device for HalDevice<I2C, E>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: fmt::Debug,
{
    type Error = HalError<E>;

    fn transmit(&mut self, bytes: &[u8], _timeout: Duration) -> Result<(), Self::Error> {
        let classify = self.classify;
        self.i2c
            .write(self.address, bytes)
            .map_err(|source| HalError::I2c {
                kind: classify(&source),
                source,
            })
    }

    fn transmit_receive(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<(), Self::Error> {
        let classify = self.classify;
        self.i2c
            .write_read(self.address, bytes, buffer)
            .map_err(|source| HalError::I2c {
                kind: classify(&source),
                source,
            })
    }
}
