// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! A simulated MLX9064x camera and bus controller for testing `mlx9064x-i2c`.
mod fake_controller;
mod i2c_mock;
mod sensor;

pub use fake_controller::{
    Counters, FakeBus, FakeController, FakeDevice, FakeError, Operation, Step, Transaction,
    DEFAULT_FAKE_TRANSFER_LEN,
};
pub use i2c_mock::FakeI2c;
pub use sensor::{
    eeprom_image, frame_image, SimulatedSensor, CONTROL_REGISTER, I2C_CONFIG_REGISTER,
    STATUS_REGISTER,
};
