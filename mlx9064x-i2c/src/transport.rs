// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register access on top of a [`BusSession`].
//!
//! Reads cover a contiguous run of registers. The two address bytes are sent most significant
//! byte first, followed by a repeated start and a read phase returning two bytes per register,
//! again most significant byte first. Controllers have a limit on how much they can move in a
//! single transaction, so long reads are split into chunks of whole words, each one a complete
//! transaction starting at the address where the previous chunk stopped.
//!
//! Writes are a single four byte transaction (address, then value), and are always followed by a
//! read of the same register to make sure the camera kept the value.

use crate::common::Address;
use crate::controller::{Controller, Device, Fault};
use crate::error::{Error, WritePhase};
use crate::session::{BusSession, ReadStrategy};
use crate::util::{words_from_be_bytes, WORD_SIZE};

/// The size of the stack buffer chunks are read into.
///
/// This caps the chunk size for controllers with very large (or no) transfer limits.
pub const STAGING_LEN: usize = 256;

/// The register-level operations the calibration and frame code is built on.
pub trait RegisterTransport {
    type Error;

    /// Bind the camera at `clock_hz`.
    fn bind(&mut self, clock_hz: u32) -> Result<(), Self::Error>;

    /// Whether the camera is currently bound.
    fn is_open(&self) -> bool;

    /// Fill `out` with the registers starting at `start`.
    ///
    /// `out[i]` is the value of register `start + i`. If this fails the contents of `out` are
    /// unspecified, and must not be used.
    fn read_words(&mut self, start: Address, out: &mut [u16]) -> Result<(), Self::Error>;

    /// Write one register, then read it back to check that the value was kept.
    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Self::Error>;

    /// Reset the camera with an I²C general call.
    ///
    /// Implementations that can't issue a general call may do nothing, so this can't fail.
    fn general_reset(&mut self);

    /// Release the binding and bind again at `clock_hz`.
    fn reconfigure(&mut self, clock_hz: u32) -> Result<(), Self::Error>;

    /// Change the clock in place where possible, otherwise do nothing.
    fn set_clock_hint(&mut self, clock_hz: u32) -> Result<(), Self::Error>;
}

impl<C: Controller> BusSession<C> {
    /// The number of words read in each bus transaction.
    pub fn chunk_words(&self) -> usize {
        let max_bytes = self.controller().max_transfer_len().min(STAGING_LEN);
        (max_bytes / WORD_SIZE).max(1)
    }

    /// Fill `out` with the registers starting at `start`.
    ///
    /// If any transaction fails, the error carries the address the failing transaction started
    /// at, and the contents of `out` must be treated as garbage. There are no retries at this
    /// level.
    pub fn read_words(&mut self, start: Address, out: &mut [u16]) -> Result<(), Error<C::Error>> {
        if out.is_empty() {
            return Err(Error::InvalidRequest("at least one word must be read"));
        }
        let timeout = self.config().timeout;
        let strategy = self.config().strategy;
        let chunk_words = self.chunk_words();
        let device = self.device()?;
        match strategy {
            ReadStrategy::Burst => read_burst(device, start, out, chunk_words, timeout),
            ReadStrategy::WordByWord => read_word_by_word(device, start, out, timeout),
        }
    }

    /// Write `value` to the register at `address`, then confirm the camera kept it.
    ///
    /// A bus failure during either the write or the confirming read is an [`Error::Write`]. If
    /// both transactions work but the value read back is different, the error is
    /// [`Error::VerifyMismatch`] instead.
    pub fn write_word(&mut self, address: Address, value: u16) -> Result<(), Error<C::Error>> {
        let timeout = self.config().timeout;
        let device = self.device()?;
        let [address_high, address_low] = address.as_bytes();
        let [value_high, value_low] = value.to_be_bytes();
        let frame = [address_high, address_low, value_high, value_low];
        device
            .transmit(&frame, timeout)
            .map_err(|source| Error::Write {
                phase: WritePhase::Transmit,
                address,
                kind: source.fault_kind(),
                source,
            })?;
        let mut readback = [0u16; 1];
        match self.read_words(address, &mut readback) {
            Ok(()) => (),
            Err(Error::Transport { kind, source, .. }) => {
                return Err(Error::Write {
                    phase: WritePhase::Verify,
                    address,
                    kind,
                    source,
                });
            }
            Err(err) => return Err(err),
        }
        if readback[0] == value {
            Ok(())
        } else {
            Err(Error::VerifyMismatch {
                address,
                expected: value,
                actual: readback[0],
            })
        }
    }

    /// The general call reset is not supported on the controllers this crate targets, so this
    /// does nothing and touches no part of the bus.
    pub fn general_reset(&mut self) {}
}

impl<C: Controller> RegisterTransport for BusSession<C> {
    type Error = Error<C::Error>;

    fn bind(&mut self, clock_hz: u32) -> Result<(), Self::Error> {
        BusSession::bind(self, clock_hz)
    }

    fn is_open(&self) -> bool {
        BusSession::is_open(self)
    }

    fn read_words(&mut self, start: Address, out: &mut [u16]) -> Result<(), Self::Error> {
        BusSession::read_words(self, start, out)
    }

    fn write_word(&mut self, address: Address, value: u16) -> Result<(), Self::Error> {
        BusSession::write_word(self, address, value)
    }

    fn general_reset(&mut self) {
        BusSession::general_reset(self)
    }

    fn reconfigure(&mut self, clock_hz: u32) -> Result<(), Self::Error> {
        BusSession::reconfigure(self, clock_hz)
    }

    fn set_clock_hint(&mut self, clock_hz: u32) -> Result<(), Self::Error> {
        BusSession::set_clock_hint(self, clock_hz)
    }
}

fn read_burst<D: Device>(
    device: &mut D,
    start: Address,
    out: &mut [u16],
    chunk_words: usize,
    timeout: core::time::Duration,
) -> Result<(), Error<D::Error>> {
    let mut staging = [0u8; STAGING_LEN];
    for (index, words) in out.chunks_mut(chunk_words).enumerate() {
        let address = start.offset(index * chunk_words);
        let bytes = &mut staging[..(words.len() * WORD_SIZE)];
        device
            .transmit_receive(&address.as_bytes(), bytes, timeout)
            .map_err(|source| transport_error(address, source))?;
        words_from_be_bytes(bytes, words);
    }
    Ok(())
}

fn read_word_by_word<D: Device>(
    device: &mut D,
    start: Address,
    out: &mut [u16],
    timeout: core::time::Duration,
) -> Result<(), Error<D::Error>> {
    for (index, word) in out.iter_mut().enumerate() {
        let address = start.offset(index);
        let mut bytes = [0u8; WORD_SIZE];
        device
            .transmit_receive(&address.as_bytes(), &mut bytes, timeout)
            .map_err(|source| transport_error(address, source))?;
        *word = u16::from_be_bytes(bytes);
    }
    Ok(())
}

fn transport_error<E: Fault>(address: Address, source: E) -> Error<E> {
    Error::Transport {
        kind: source.fault_kind(),
        address,
        source,
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use core::time::Duration;
    use std::vec::Vec;

    use super::{read_burst, read_word_by_word};
    use crate::common::Address;
    use crate::controller::{Device, FaultKind};
    use crate::error::Error;

    /// A device that serves `address as u16` for every register, and records each transaction.
    #[derive(Default)]
    struct EchoDevice {
        transactions: Vec<(Address, usize)>,
        fail_at: Option<usize>,
    }

    impl Device for EchoDevice {
        type Error = FaultKind;

        fn transmit(&mut self, _bytes: &[u8], _timeout: Duration) -> Result<(), FaultKind> {
            Ok(())
        }

        fn transmit_receive(
            &mut self,
            bytes: &[u8],
            buffer: &mut [u8],
            _timeout: Duration,
        ) -> Result<(), FaultKind> {
            let address = u16::from_be_bytes([bytes[0], bytes[1]]);
            if self.fail_at == Some(self.transactions.len()) {
                return Err(FaultKind::Nack);
            }
            self.transactions.push((address.into(), buffer.len()));
            for (index, pair) in buffer.chunks_exact_mut(2).enumerate() {
                pair.copy_from_slice(&address.wrapping_add(index as u16).to_be_bytes());
            }
            Ok(())
        }
    }

    #[test]
    fn burst_chunks_are_whole_words() {
        let mut device = EchoDevice::default();
        let mut out = [0u16; 10];
        read_burst(&mut device, Address::new(0x2400), &mut out, 4, Duration::ZERO).unwrap();
        assert_eq!(
            device.transactions,
            [
                (Address::new(0x2400), 8),
                (Address::new(0x2404), 8),
                (Address::new(0x2408), 4),
            ]
        );
        for (index, word) in out.iter().enumerate() {
            assert_eq!(*word, 0x2400 + index as u16);
        }
    }

    #[test]
    fn word_by_word_is_one_transaction_per_word() {
        let mut device = EchoDevice::default();
        let mut out = [0u16; 3];
        read_word_by_word(&mut device, Address::new(0x0400), &mut out, Duration::ZERO).unwrap();
        assert_eq!(device.transactions.len(), 3);
        assert!(device.transactions.iter().all(|(_, len)| *len == 2));
        assert_eq!(out, [0x0400, 0x0401, 0x0402]);
    }

    #[test]
    fn failing_chunk_address_is_reported() {
        let mut device = EchoDevice {
            fail_at: Some(2),
            ..EchoDevice::default()
        };
        let mut out = [0u16; 12];
        let err = read_burst(&mut device, Address::new(0x0400), &mut out, 5, Duration::ZERO)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                kind: FaultKind::Nack,
                address: Address::new(0x040A),
                source: FaultKind::Nack,
            }
        );
        assert_eq!(device.transactions.len(), 2);
    }
}
