// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::Address;
use crate::controller::FaultKind;

/// Problems creating, changing, or using a bus or device binding.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError<E> {
    /// The controller refused to create or release a binding.
    Controller(E),

    /// The session has no device bound.
    Closed,

    /// The session already has a device bound.
    AlreadyOpen,

    /// The device address is not a usable 7-bit address.
    InvalidAddress(u8),

    /// The requested clock is outside of what the cameras support.
    UnsupportedClock(u32),

    /// The controller's maximum transfer length cannot hold a single register write.
    TransferLimit(usize),
}

impl<E: fmt::Debug> fmt::Display for ConfigError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Controller(err) => write!(f, "controller error: {:?}", err),
            ConfigError::Closed => write!(f, "session is closed"),
            ConfigError::AlreadyOpen => write!(f, "session already has a bound device"),
            ConfigError::InvalidAddress(address) => {
                write!(f, "invalid device address {:#04X}", address)
            }
            ConfigError::UnsupportedClock(clock) => write!(f, "unsupported clock {} Hz", clock),
            ConfigError::TransferLimit(limit) => {
                write!(f, "maximum transfer length of {} bytes is too short", limit)
            }
        }
    }
}

/// Which half of a verified register write failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WritePhase {
    /// The write transaction itself.
    Transmit,

    /// The read-back of the register that was just written.
    Verify,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Errors binding or reconfiguring the bus.
    Config(ConfigError<E>),

    /// A read transaction did not complete.
    ///
    /// `address` is the first register of the transaction that failed.
    Transport {
        kind: FaultKind,
        address: Address,
        source: E,
    },

    /// A register write (or the read confirming it) did not complete.
    Write {
        phase: WritePhase,
        address: Address,
        kind: FaultKind,
        source: E,
    },

    /// The write went through, but the register did not keep the value.
    ///
    /// This usually means some of the bits written are read-only or reserved.
    VerifyMismatch {
        address: Address,
        expected: u16,
        actual: u16,
    },

    /// The caller broke a precondition of the operation.
    InvalidRequest(&'static str),
}

impl<E> Error<E> {
    /// The integer status for this error in the calibration library's I²C contract.
    pub fn status(&self) -> Status {
        match self {
            Error::Write { .. } | Error::VerifyMismatch { .. } => Status::WriteError,
            _ => Status::NackError,
        }
    }

    /// The failure classification, for errors caused by a bus transaction.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::Transport { kind, .. } | Error::Write { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl<E> From<ConfigError<E>> for Error<E> {
    fn from(config_err: ConfigError<E>) -> Self {
        Self::Config(config_err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "Configuration Error: {}", err),
            Error::Transport {
                kind,
                address,
                source,
            } => write!(
                f,
                "Transport Error ({:?}) reading from {}: {:?}",
                kind, address, source
            ),
            Error::Write {
                phase: WritePhase::Transmit,
                address,
                kind,
                source,
            } => write!(
                f,
                "Write Error ({:?}) writing to {}: {:?}",
                kind, address, source
            ),
            Error::Write {
                phase: WritePhase::Verify,
                address,
                kind,
                source,
            } => write!(
                f,
                "Write Error ({:?}) verifying {}: {:?}",
                kind, address, source
            ),
            Error::VerifyMismatch {
                address,
                expected,
                actual,
            } => write!(
                f,
                "Verification Error at {}: wrote {:#06X}, read back {:#06X}",
                address, expected, actual
            ),
            Error::InvalidRequest(msg) => write!(f, "Invalid Request: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for ConfigError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Controller(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Transport { source, .. } | Error::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Status codes returned through the calibration library's I²C contract.
///
/// The calibration library only ever compares these against zero, but the values match the
/// (negated) error defines the library uses itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    NackError = -1,
    WriteError = -2,
}

impl<E> From<Result<(), Error<E>>> for Status {
    fn from(result: Result<(), Error<E>>) -> Self {
        match result {
            Ok(()) => Status::Ok,
            Err(err) => err.status(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, Error, Status, WritePhase};
    use crate::common::Address;
    use crate::controller::FaultKind;

    #[test]
    fn status_values() {
        assert_eq!(i32::from(Status::Ok), 0);
        assert_eq!(i32::from(Status::NackError), -1);
        assert_eq!(i32::from(Status::WriteError), -2);
        assert_eq!(Status::try_from(-2).unwrap(), Status::WriteError);
        assert!(Status::try_from(3).is_err());
    }

    #[test]
    fn write_failures_map_to_write_status() {
        let write: Error<FaultKind> = Error::Write {
            phase: WritePhase::Verify,
            address: Address::new(0x800D),
            kind: FaultKind::Nack,
            source: FaultKind::Nack,
        };
        assert_eq!(write.status(), Status::WriteError);
        let mismatch: Error<FaultKind> = Error::VerifyMismatch {
            address: Address::new(0x800D),
            expected: 0x1901,
            actual: 0x1801,
        };
        assert_eq!(mismatch.status(), Status::WriteError);
    }

    #[test]
    fn other_failures_map_to_nack_status() {
        let transport: Error<FaultKind> = Error::Transport {
            kind: FaultKind::Timeout,
            address: Address::new(0x2400),
            source: FaultKind::Timeout,
        };
        assert_eq!(transport.status(), Status::NackError);
        assert_eq!(transport.fault_kind(), Some(FaultKind::Timeout));
        let closed: Error<FaultKind> = ConfigError::Closed.into();
        assert_eq!(closed.status(), Status::NackError);
        assert_eq!(closed.fault_kind(), None);
        assert_eq!(Status::from(Ok::<(), Error<FaultKind>>(())), Status::Ok);
    }
}
