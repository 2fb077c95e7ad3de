// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::blocking::i2c;
use mlx9064x_i2c::DEFAULT_TIMEOUT;

use crate::fake_controller::{FakeController, FakeError, FakeState};

/// An `embedded-hal` I²C bus wired to the same simulated camera as a [`FakeController`].
///
/// Transactions show up in the controller's log, at whatever clock the bus was created with.
#[derive(Clone)]
pub struct FakeI2c {
    state: Rc<RefCell<FakeState>>,
    clock_hz: u32,
}

impl FakeI2c {
    pub fn new(controller: &FakeController, clock_hz: u32) -> Self {
        Self {
            state: controller.shared_state(),
            clock_hz,
        }
    }
}

impl i2c::Write for FakeI2c {
    type Error = FakeError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.state
            .borrow_mut()
            .transmit(address, self.clock_hz, bytes, DEFAULT_TIMEOUT)
    }
}

impl i2c::WriteRead for FakeI2c {
    type Error = FakeError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.state
            .borrow_mut()
            .transmit_receive(address, self.clock_hz, bytes, buffer, DEFAULT_TIMEOUT)
    }
}
