//! A pure-Rust I²C register transport for the MLX90640 and MLX90641 thermal cameras.
//!
//! These cameras keep everything (calibration EEPROM, pixel RAM, and configuration registers) in
//! a single 16-bit address space of 16-bit big-endian words. Calibration needs hundreds of words
//! read in one go, while most bus controllers can only move a limited number of bytes per
//! transaction. This crate provides the register-level primitives that calibration and frame
//! decoding code is built on, handling the chunking, byte order, and write verification so that
//! code doesn't have to:
//!
//! * [`BusSession`] owns the bus controller and the camera's device binding, and handles moving
//!   between clock speeds.
//! * [`RegisterTransport`] (implemented by `BusSession`) reads runs of registers and writes single
//!   registers, always reading a written register back to make sure it kept its value.
//! * [`StatusPort`][compat::StatusPort] exposes those primitives with the integer status codes the
//!   Melexis calibration library expects.
//!
//! The hardware itself sits behind [`Controller`] and [`Device`]. An adapter for any
//! [`embedded-hal`][embedded-hal] I²C bus is provided in [`hal`].
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # Example
//! ```no_run
//! use mlx9064x_i2c::hal::HalController;
//! use mlx9064x_i2c::{BusPins, BusSession, SessionConfig};
//! use mlx9064x_i2c::{EEPROM_START, EEPROM_WORDS, FRAME_START, FRAME_WORDS};
//! use linux_embedded_hal::I2cdev;
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! // Pins are set up by the kernel on Linux, so they're ignored here.
//! let config = SessionConfig::new(BusPins::new(0, 0));
//! // The EEPROM is read at a conservative clock...
//! let mut session = BusSession::open(HalController::new(i2c_bus), config, 100_000)?;
//! let mut eeprom = [0u16; EEPROM_WORDS];
//! session.read_words(EEPROM_START, &mut eeprom)?;
//! // ...and frames at a faster one.
//! session.reconfigure(400_000)?;
//! let mut frame = [0u16; FRAME_WORDS];
//! session.read_words(FRAME_START, &mut frame)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Concurrency
//! Every operation blocks until its transactions complete or time out. A session is not meant to
//! be shared: all access to one camera should come from a single owner, or be serialized by the
//! caller. There are no retries at this level, retry policy belongs to the caller.

#![no_std]

pub mod common;
pub mod compat;
pub mod controller;
#[doc(hidden)]
pub mod error;
pub mod hal;
pub mod session;
pub mod transport;
mod util;

pub use common::*;
pub use controller::{Controller, Device, Fault, FaultKind};
#[doc(inline)]
pub use error::{ConfigError, Error, Status, WritePhase};
#[doc(inline)]
pub use session::{BusSession, ReadStrategy, SessionConfig};
pub use transport::RegisterTransport;
