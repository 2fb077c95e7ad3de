// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The integer-status I²C contract the Melexis calibration library is written against.
//!
//! That library expects four primitives (`init`, `read`, `write`, and `general_reset`) returning
//! `0` on success and anything else on failure, plus a frequency setter that returns nothing.
//! [`StatusPort`] provides those on top of any [`RegisterTransport`], so the library (or a port of
//! it) can be pointed at a [`BusSession`][crate::BusSession] without knowing about sessions.
use crate::common::{Address, STANDARD_MODE_HZ};
use crate::error::{Error, Status};
use crate::transport::RegisterTransport;

/// Status-code adapter over a [`RegisterTransport`].
#[derive(Debug)]
pub struct StatusPort<T> {
    transport: T,
    init_clock_hz: u32,
}

impl<T, E> StatusPort<T>
where
    T: RegisterTransport<Error = Error<E>>,
{
    /// Wrap `transport`, binding at 100kHz when [`init`][StatusPort::init] is called.
    pub fn new(transport: T) -> Self {
        Self::with_init_clock(transport, STANDARD_MODE_HZ)
    }

    /// Wrap `transport`, binding at `init_clock_hz` when [`init`][StatusPort::init] is called.
    pub fn with_init_clock(transport: T, init_clock_hz: u32) -> Self {
        Self {
            transport,
            init_clock_hz,
        }
    }

    /// Bind the camera, if it isn't already.
    pub fn init(&mut self) -> i32 {
        if self.transport.is_open() {
            return Status::Ok.into();
        }
        Status::from(self.transport.bind(self.init_clock_hz)).into()
    }

    /// Read `count` registers starting at `address` into `out`.
    ///
    /// `out` must be exactly `count` words long.
    pub fn read(&mut self, address: u16, count: u16, out: &mut [u16]) -> i32 {
        let result = if usize::from(count) != out.len() {
            Err(Error::InvalidRequest("output buffer length differs from count"))
        } else {
            self.transport.read_words(Address::new(address), out)
        };
        Status::from(result).into()
    }

    /// Write (and verify) one register.
    pub fn write(&mut self, address: u16, value: u16) -> i32 {
        Status::from(self.transport.write_word(Address::new(address), value)).into()
    }

    /// Always succeeds.
    pub fn general_reset(&mut self) -> i32 {
        self.transport.general_reset();
        Status::Ok.into()
    }

    /// Pass a clock change on to the transport as a hint.
    ///
    /// The contract has no way of reporting failure here, so a rejected hint is dropped and the
    /// current clock stays in effect.
    pub fn freq_set(&mut self, clock_hz: u32) {
        let _ = self.transport.set_clock_hint(clock_hz);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
