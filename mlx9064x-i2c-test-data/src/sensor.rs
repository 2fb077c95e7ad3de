// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::collections::BTreeMap;

use mlx9064x_i2c::{Address, DEFAULT_ADDRESS, EEPROM_START, EEPROM_WORDS, FRAME_START, FRAME_WORDS};

/// The status register, holding the subpage and "new data available" flags.
pub const STATUS_REGISTER: Address = Address::new(0x8000);

/// Control register 1, holding the refresh rate, resolution, and reading pattern.
pub const CONTROL_REGISTER: Address = Address::new(0x800D);

/// The I²C configuration register.
pub const I2C_CONFIG_REGISTER: Address = Address::new(0x800F);

// The lowest 6 bits are documented, but the 6th bit is only documented in earlier versions of the
// datasheet.
const STATUS_REGISTER_WRITE_MASK: u16 = 0x003F;

// Only the top three bits of control register 1 are reserved.
const CONTROL_REGISTER_WRITE_MASK: u16 = 0x1FFF;

// Only the last four bits of the I2C config register are documented.
const I2C_CONFIG_REGISTER_WRITE_MASK: u16 = 0x000F;

/// The power-on value of control register 1 (2Hz, 18-bit ADC, chess pattern).
const CONTROL_REGISTER_DEFAULT: u16 = 0x1901;

const ADDRESS_SPACE_WORDS: usize = 0x1_0000;

/// A camera's full 16-bit register space.
///
/// Every address can be read. Writes only change the bits set in that address's write mask, and
/// addresses without a mask silently ignore writes, the same way the camera ignores writes to
/// read-only locations.
#[derive(Clone, Debug)]
pub struct SimulatedSensor {
    i2c_address: u8,
    registers: Vec<u16>,
    write_masks: BTreeMap<u16, u16>,
}

impl SimulatedSensor {
    /// A sensor at `i2c_address` with every register zeroed, and only the documented control
    /// registers writable.
    pub fn new(i2c_address: u8) -> Self {
        let mut write_masks = BTreeMap::new();
        write_masks.insert(STATUS_REGISTER.into(), STATUS_REGISTER_WRITE_MASK);
        write_masks.insert(CONTROL_REGISTER.into(), CONTROL_REGISTER_WRITE_MASK);
        write_masks.insert(I2C_CONFIG_REGISTER.into(), I2C_CONFIG_REGISTER_WRITE_MASK);
        Self {
            i2c_address,
            registers: vec![0; ADDRESS_SPACE_WORDS],
            write_masks,
        }
    }

    /// An MLX90640 at the default address, with [`eeprom_image`] loaded and the first
    /// [`frame_image`] in RAM.
    pub fn mlx90640() -> Self {
        let mut sensor = Self::new(DEFAULT_ADDRESS);
        sensor.load(EEPROM_START, &eeprom_image());
        sensor.load(FRAME_START, &frame_image(0));
        sensor.load(CONTROL_REGISTER, &[CONTROL_REGISTER_DEFAULT]);
        sensor
    }

    pub fn i2c_address(&self) -> u8 {
        self.i2c_address
    }

    /// Overwrite registers directly, ignoring the write masks. Wraps at the top of the address
    /// space.
    pub fn load(&mut self, start: Address, words: &[u16]) {
        for (index, word) in words.iter().enumerate() {
            self.registers[usize::from(start.offset(index))] = *word;
        }
    }

    pub fn word(&self, address: Address) -> u16 {
        self.registers[usize::from(address)]
    }

    /// Copy out `count` registers starting at `start`.
    pub fn words(&self, start: Address, count: usize) -> Vec<u16> {
        (0..count).map(|index| self.word(start.offset(index))).collect()
    }

    /// Allow writes to the bits in `mask` at `address`. A mask of 0 makes the address read-only.
    pub fn set_write_mask(&mut self, address: Address, mask: u16) {
        if mask == 0 {
            self.write_masks.remove(&address.into());
        } else {
            self.write_masks.insert(address.into(), mask);
        }
    }

    pub fn write_mask(&self, address: Address) -> u16 {
        self.write_masks
            .get(&address.into())
            .copied()
            .unwrap_or_default()
    }

    /// Apply a bus write of one word, keeping the bits outside the write mask.
    pub(crate) fn write_word(&mut self, address: Address, value: u16) {
        let mask = self.write_mask(address);
        let register = &mut self.registers[usize::from(address)];
        *register = (*register & !mask) | (value & mask);
    }

    /// Serve a bus read, filling `buffer` with big-endian words starting at `start`.
    pub(crate) fn read_bytes(&self, start: Address, buffer: &mut [u8]) {
        for (index, pair) in buffer.chunks_exact_mut(2).enumerate() {
            pair.copy_from_slice(&self.word(start.offset(index)).to_be_bytes());
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::mlx90640()
    }
}

/// A deterministic stand-in for a calibration EEPROM dump.
///
/// The words are scrambled so that neighbouring words differ, which makes swapped bytes or shifted
/// chunks show up in comparisons.
pub fn eeprom_image() -> Vec<u16> {
    let mut image: Vec<u16> = (0..EEPROM_WORDS as u16)
        .map(|index| index.wrapping_mul(0x9E37) ^ 0x5A3C)
        .collect();
    // Mirror the documented configuration words so the image looks like a real dump.
    image[0x0C] = CONTROL_REGISTER_DEFAULT;
    image[0x0F] = 0xBE00 | u16::from(DEFAULT_ADDRESS);
    image
}

/// A deterministic frame's worth of RAM (pixels plus the trailing auxiliary words).
///
/// Different `frame` numbers give different images.
pub fn frame_image(frame: u16) -> Vec<u16> {
    let seed = frame.wrapping_mul(0x2F1B);
    (0..FRAME_WORDS as u16)
        .map(|index| seed.wrapping_add(index.wrapping_mul(0x0107)) ^ 0xA55A)
        .collect()
}

#[cfg(test)]
mod test {
    use mlx9064x_i2c::{Address, EEPROM_START, EEPROM_WORDS, FRAME_START, FRAME_WORDS};

    use super::{
        eeprom_image, frame_image, SimulatedSensor, CONTROL_REGISTER, I2C_CONFIG_REGISTER,
        STATUS_REGISTER,
    };

    #[test]
    fn images_are_loaded() {
        let sensor = SimulatedSensor::mlx90640();
        assert_eq!(sensor.words(EEPROM_START, EEPROM_WORDS), eeprom_image());
        assert_eq!(sensor.words(FRAME_START, FRAME_WORDS), frame_image(0));
        assert_ne!(frame_image(0), frame_image(1));
    }

    #[test]
    fn writes_follow_mask() {
        let mut sensor = SimulatedSensor::new(0x33);
        sensor.write_word(CONTROL_REGISTER, 0xFFFF);
        assert_eq!(sensor.word(CONTROL_REGISTER), 0x1FFF);
        sensor.write_word(STATUS_REGISTER, 0x0030);
        assert_eq!(sensor.word(STATUS_REGISTER), 0x0030);
        sensor.write_word(I2C_CONFIG_REGISTER, 0x00F1);
        assert_eq!(sensor.word(I2C_CONFIG_REGISTER), 0x0001);
    }

    #[test]
    fn unmasked_writes_are_ignored() {
        let mut sensor = SimulatedSensor::mlx90640();
        let before = sensor.word(EEPROM_START);
        sensor.write_word(EEPROM_START, !before);
        assert_eq!(sensor.word(EEPROM_START), before);
        sensor.set_write_mask(EEPROM_START, 0xFFFF);
        sensor.write_word(EEPROM_START, !before);
        assert_eq!(sensor.word(EEPROM_START), !before);
    }

    #[test]
    fn reads_are_big_endian() {
        let mut sensor = SimulatedSensor::new(0x33);
        sensor.load(Address::new(0xFFFF), &[0x1234, 0xABCD]);
        let mut buffer = [0u8; 4];
        sensor.read_bytes(Address::new(0xFFFF), &mut buffer);
        assert_eq!(buffer, [0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(sensor.word(Address::new(0x0000)), 0xABCD);
    }
}
