// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Ownership of the bus and device bindings.
//!
//! A [`BusSession`] is either closed, or open with exactly one device bound at one clock. Changing
//! the clock is a transition through the closed state (`Open(old) → Closed → Open(new)`), as most
//! controllers cannot change the clock of a live device binding. If any step of a transition
//! fails, the session ends up closed, never half-bound.
use core::fmt;
use core::mem;
use core::time::Duration;

use crate::common::{BusPins, DEFAULT_ADDRESS, DEFAULT_TIMEOUT, FAST_MODE_PLUS_HZ};
use crate::controller::Controller;
use crate::error::{ConfigError, Error};
use crate::util::{lifecycle, WORD_SIZE};

/// How burst reads are issued on the bus.
///
/// Both strategies produce the same words in the same order, they only differ in the number of
/// transactions used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadStrategy {
    /// One combined address-then-read transaction per chunk.
    Burst,

    /// One combined address-then-read transaction per word.
    ///
    /// Useful with transaction-oriented drivers that handle short receives better than long ones.
    WordByWord,
}

impl Default for ReadStrategy {
    fn default() -> Self {
        Self::Burst
    }
}

/// Everything about a session that stays the same across clock changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// The pins the bus is created on.
    pub pins: BusPins,

    /// The 7-bit I²C address of the camera.
    pub address: u8,

    /// The timeout for each individual transaction.
    pub timeout: Duration,

    pub strategy: ReadStrategy,
}

impl SessionConfig {
    /// A configuration using the default address (0x33), a 200ms timeout, and burst reads.
    pub fn new(pins: BusPins) -> Self {
        Self {
            pins,
            address: DEFAULT_ADDRESS,
            timeout: DEFAULT_TIMEOUT,
            strategy: ReadStrategy::default(),
        }
    }

    pub fn address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy(mut self, strategy: ReadStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// The bus and device bindings for an open session.
struct OpenBinding<B, D> {
    bus: B,
    device: D,
    clock_hz: u32,
}

enum Binding<B, D> {
    Closed,
    Open(OpenBinding<B, D>),
}

/// Exclusive owner of a bus controller and the camera's device binding on it.
///
/// Sessions are not meant to be shared; all register access for one camera should come from a
/// single owner (or be serialized by the caller).
pub struct BusSession<C: Controller> {
    controller: C,
    config: SessionConfig,
    binding: Binding<C::Bus, C::Device>,
}

impl<C: Controller> BusSession<C> {
    /// Create a closed session. Nothing is claimed until [`bind`][BusSession::bind] is called.
    pub fn new(controller: C, config: SessionConfig) -> Self {
        Self {
            controller,
            config,
            binding: Binding::Closed,
        }
    }

    /// Create a session and bind the camera at `clock_hz`.
    pub fn open(
        controller: C,
        config: SessionConfig,
        clock_hz: u32,
    ) -> Result<Self, Error<C::Error>> {
        let mut session = Self::new(controller, config);
        session.bind(clock_hz)?;
        Ok(session)
    }

    /// Create the bus and bind the camera at `clock_hz`.
    ///
    /// Fails with [`ConfigError::AlreadyOpen`] if a device is already bound.
    pub fn bind(&mut self, clock_hz: u32) -> Result<(), Error<C::Error>> {
        if self.is_open() {
            return Err(ConfigError::AlreadyOpen.into());
        }
        self.attach(None, clock_hz)
    }

    /// Release the current binding and bind again at `clock_hz`.
    ///
    /// An unsupported clock is rejected before anything is released, leaving the current binding
    /// in place. Otherwise the device binding is always released, and the bus is also destroyed
    /// and recreated unless the controller can keep it across device rebinds. If releasing or
    /// binding fails the session is closed, and must be [bound][BusSession::bind] again before
    /// any further use.
    pub fn reconfigure(&mut self, clock_hz: u32) -> Result<(), Error<C::Error>> {
        if !self.is_open() {
            return Err(ConfigError::Closed.into());
        }
        self.check_config(clock_hz)?;
        let keep_bus = self.controller.keeps_bus_on_rebind();
        let bus = self.detach(keep_bus)?;
        self.attach(bus, clock_hz)
    }

    /// Release the device and bus bindings.
    ///
    /// Closing a closed session does nothing. The session is closed afterwards even if the
    /// controller reports an error releasing the bindings.
    pub fn close(&mut self) -> Result<(), Error<C::Error>> {
        self.detach(false).map(|_| ())
    }

    /// Close the session and return the controller.
    pub fn free(mut self) -> Result<C, Error<C::Error>> {
        self.close()?;
        Ok(self.controller)
    }

    /// Change the clock of the bound device in place, if the controller supports it.
    ///
    /// Most controllers do not, in which case (or if the session is closed) this does nothing.
    /// Use [`reconfigure`][BusSession::reconfigure] to reliably change the clock.
    pub fn set_clock_hint(&mut self, clock_hz: u32) -> Result<(), Error<C::Error>> {
        let open = match &mut self.binding {
            Binding::Open(open) => open,
            Binding::Closed => return Ok(()),
        };
        if !is_supported_clock(clock_hz) {
            return Err(ConfigError::UnsupportedClock(clock_hz).into());
        }
        let retuned = self
            .controller
            .retune(&mut open.bus, &mut open.device, clock_hz)
            .map_err(ConfigError::Controller)?;
        if retuned {
            lifecycle!(
                "retuned {:#04X} from {} Hz to {} Hz",
                self.config.address,
                open.clock_hz,
                clock_hz
            );
            open.clock_hz = clock_hz;
        }
        Ok(())
    }

    /// Whether a device is currently bound.
    pub fn is_open(&self) -> bool {
        matches!(self.binding, Binding::Open(_))
    }

    /// The clock of the bound device, or `None` if the session is closed.
    pub fn clock_hz(&self) -> Option<u32> {
        match &self.binding {
            Binding::Open(open) => Some(open.clock_hz),
            Binding::Closed => None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Mutable access to the controller.
    ///
    /// Bindings must only be created and released through the session.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// The bound device, for use by the register transport.
    pub(crate) fn device(&mut self) -> Result<&mut C::Device, ConfigError<C::Error>> {
        match &mut self.binding {
            Binding::Open(open) => Ok(&mut open.device),
            Binding::Closed => Err(ConfigError::Closed),
        }
    }

    fn check_config(&self, clock_hz: u32) -> Result<(), ConfigError<C::Error>> {
        let max_transfer_len = self.controller.max_transfer_len();
        if !(0x01..=0x7F).contains(&self.config.address) {
            Err(ConfigError::InvalidAddress(self.config.address))
        } else if !is_supported_clock(clock_hz) {
            Err(ConfigError::UnsupportedClock(clock_hz))
        } else if max_transfer_len < 2 * WORD_SIZE {
            // A register write is one address word and one data word.
            Err(ConfigError::TransferLimit(max_transfer_len))
        } else {
            Ok(())
        }
    }

    /// Bind the device, creating a bus first if one isn't given.
    ///
    /// Any bus (given or created) is destroyed again if binding fails.
    fn attach(&mut self, bus: Option<C::Bus>, clock_hz: u32) -> Result<(), Error<C::Error>> {
        if let Err(err) = self.check_config(clock_hz) {
            if let Some(bus) = bus {
                // The configuration error is the one to report.
                let _ = self.controller.destroy_bus(bus);
            }
            return Err(err.into());
        }
        let mut bus = match bus {
            Some(bus) => bus,
            None => self
                .controller
                .create_bus(self.config.pins)
                .map_err(ConfigError::Controller)?,
        };
        match self
            .controller
            .bind_device(&mut bus, self.config.address, clock_hz)
        {
            Ok(device) => {
                lifecycle!("bound {:#04X} at {} Hz", self.config.address, clock_hz);
                self.binding = Binding::Open(OpenBinding {
                    bus,
                    device,
                    clock_hz,
                });
                Ok(())
            }
            Err(err) => {
                // The bind error is the one to report.
                let _ = self.controller.destroy_bus(bus);
                Err(ConfigError::Controller(err).into())
            }
        }
    }

    /// Unbind the device, and either destroy the bus or hand it back.
    ///
    /// The session is closed afterwards no matter what.
    fn detach(&mut self, keep_bus: bool) -> Result<Option<C::Bus>, Error<C::Error>> {
        let OpenBinding {
            mut bus, device, ..
        } = match mem::replace(&mut self.binding, Binding::Closed) {
            Binding::Open(open) => open,
            Binding::Closed => return Ok(None),
        };
        lifecycle!("releasing {:#04X}", self.config.address);
        if let Err(err) = self.controller.unbind_device(&mut bus, device) {
            // The unbind error is the one to report.
            let _ = self.controller.destroy_bus(bus);
            return Err(ConfigError::Controller(err).into());
        }
        if keep_bus {
            Ok(Some(bus))
        } else {
            self.controller
                .destroy_bus(bus)
                .map_err(ConfigError::Controller)?;
            Ok(None)
        }
    }
}

impl<C: Controller> fmt::Debug for BusSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSession")
            .field("config", &self.config)
            .field("clock_hz", &self.clock_hz())
            .finish()
    }
}

fn is_supported_clock(clock_hz: u32) -> bool {
    (1..=FAST_MODE_PLUS_HZ).contains(&clock_hz)
}

#[cfg(test)]
mod test {
    use core::time::Duration;

    use super::{is_supported_clock, ReadStrategy, SessionConfig};
    use crate::common::{BusPins, DEFAULT_ADDRESS, DEFAULT_TIMEOUT, FAST_MODE_HZ};

    #[test]
    fn config_defaults() {
        let config = SessionConfig::new(BusPins::new(47, 10));
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.strategy, ReadStrategy::Burst);
    }

    #[test]
    fn config_builder() {
        let config = SessionConfig::new(BusPins::new(21, 22))
            .address(0x30)
            .timeout(Duration::from_millis(50))
            .strategy(ReadStrategy::WordByWord);
        assert_eq!(config.pins, BusPins { sda: 21, scl: 22 });
        assert_eq!(config.address, 0x30);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.strategy, ReadStrategy::WordByWord);
    }

    #[test]
    fn clock_range() {
        assert!(!is_supported_clock(0));
        assert!(is_supported_clock(1));
        assert!(is_supported_clock(FAST_MODE_HZ));
        assert!(is_supported_clock(1_000_000));
        assert!(!is_supported_clock(1_000_001));
    }
}
