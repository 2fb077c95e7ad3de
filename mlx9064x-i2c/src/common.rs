// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Addresses, pins, and the handful of constants shared by every layer of the transport.
//!
//! The MLX9064\* cameras expose a flat 16-bit address space where each address holds one 16-bit
//! word. Everything on the wire is big-endian: the two address bytes go out most significant byte
//! first, and each word comes back the same way.
use core::fmt;
use core::time::Duration;

/// The default 7-bit I²C address for these cameras.
pub const DEFAULT_ADDRESS: u8 = 0x33;

/// The default timeout applied to each individual bus transaction.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Standard-mode I²C clock (100 kHz).
pub const STANDARD_MODE_HZ: u32 = 100_000;

/// Fast-mode I²C clock (400 kHz).
pub const FAST_MODE_HZ: u32 = 400_000;

/// Fast-mode Plus I²C clock (1 MHz), the fastest clock these cameras accept.
pub const FAST_MODE_PLUS_HZ: u32 = 1_000_000;

/// The first address of the calibration EEPROM.
pub const EEPROM_START: Address = Address::new(0x2400);

/// The number of words dumped from the EEPROM when loading calibration data.
pub const EEPROM_WORDS: usize = 832;

/// The first address of the RAM holding the pixel and auxiliary data.
pub const FRAME_START: Address = Address::new(0x0400);

/// The number of words in one raw frame buffer (pixels, auxiliary data, and two trailing words
/// the calibration library fills in with control and status information).
pub const FRAME_WORDS: usize = 834;

/// Marker newtype for addresses accessible over I<sup>2</sup>C.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u16);

impl Address {
    /// Wrap the given address in an `Address`.
    ///
    /// This function is intended to be used in const contexts, in other cases the
    /// [`From`][core::convert::From] implementations are probably easier to use.
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    /// The address as it is sent on the wire, most significant byte first.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// The address `words` words after this one.
    ///
    /// The address space is not range checked, so this wraps around at `0xFFFF`.
    pub fn offset(&self, words: usize) -> Self {
        // Truncation is the wrapping behaviour we want.
        Self(self.0.wrapping_add(words as u16))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#06X})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self::new(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0 as usize
    }
}

/// The two GPIO pins a bus controller is created on.
///
/// Pin numbers are opaque to this crate, they are handed to the [`Controller`] as-is.
///
/// [`Controller`]: crate::controller::Controller
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusPins {
    pub sda: u8,
    pub scl: u8,
}

impl BusPins {
    pub const fn new(sda: u8, scl: u8) -> Self {
        Self { sda, scl }
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::format;

    use super::Address;

    #[test]
    fn address_bytes_are_big_endian() {
        assert_eq!(Address::new(0x2400).as_bytes(), [0x24, 0x00]);
        assert_eq!(Address::new(0x800D).as_bytes(), [0x80, 0x0D]);
    }

    #[test]
    fn address_offset_wraps() {
        assert_eq!(Address::new(0x0400).offset(834), Address::new(0x0742));
        assert_eq!(Address::new(0xFFFF).offset(2), Address::new(0x0001));
    }

    #[test]
    fn address_debug() {
        assert_eq!(format!("{:?}", Address::new(0x2400)), "Address(0x2400)");
        assert_eq!(format!("{}", Address::new(0x40)), "0x0040");
    }
}
