// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use mlx9064x_i2c::{Address, BusPins, Controller, Device, Fault, FaultKind};

use crate::sensor::SimulatedSensor;

/// The transfer limit a [`FakeController`] starts with.
pub const DEFAULT_FAKE_TRANSFER_LEN: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FakeError {
    /// A bus transaction failed.
    Fault(FaultKind),

    /// SDA and SCL were given the same pin.
    InvalidPins(BusPins),

    /// The bus peripheral is already claimed.
    BusClaimed,

    /// A device is already bound at this address.
    AddressInUse(u8),

    /// The bus still has a device bound on it.
    DeviceStillBound,

    /// The handle was already released.
    StaleHandle,

    /// A transaction the camera can't handle, like a zero length or odd length read.
    IllegalOperation,

    /// A failure requested with [`FakeController::fail_next`].
    Injected(Step),
}

impl Fault for FakeError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            FakeError::Fault(kind) => *kind,
            _ => FaultKind::BusFault,
        }
    }
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FakeError::Fault(kind) => write!(f, "simulated {:?}", kind),
            FakeError::InvalidPins(pins) => write!(f, "invalid pins {:?}", pins),
            FakeError::BusClaimed => write!(f, "bus already claimed"),
            FakeError::AddressInUse(address) => write!(f, "{:#04X} already bound", address),
            FakeError::DeviceStillBound => write!(f, "bus still has a device bound"),
            FakeError::StaleHandle => write!(f, "handle was already released"),
            FakeError::IllegalOperation => write!(f, "illegal operation"),
            FakeError::Injected(step) => write!(f, "injected failure during {:?}", step),
        }
    }
}

impl std::error::Error for FakeError {}

/// Binding lifecycle steps that can be made to fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    CreateBus,
    DestroyBus,
    BindDevice,
    UnbindDevice,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// A plain write: address then data words.
    Write,

    /// A combined address-then-read.
    Read,
}

/// One bus transaction, as seen by the simulated camera.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub operation: Operation,

    /// The first register addressed.
    pub register: Address,

    /// The number of data words written or read.
    pub words: usize,

    /// The clock of the device binding the transaction went through.
    pub clock_hz: u32,

    pub timeout: Duration,

    /// The failure the transaction ended with, if any.
    pub fault: Option<FaultKind>,
}

/// Running totals of binding lifecycle calls.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub buses_created: usize,
    pub buses_destroyed: usize,
    pub devices_bound: usize,
    pub devices_unbound: usize,
}

impl Counters {
    /// Whether everything that was created has been released again.
    pub fn balanced(&self) -> bool {
        self.buses_created == self.buses_destroyed && self.devices_bound == self.devices_unbound
    }
}

#[derive(Debug)]
pub(crate) struct FakeState {
    sensor: SimulatedSensor,
    max_transfer_len: usize,
    keeps_bus: bool,
    live_clock: bool,
    next_handle: usize,
    bus: Option<usize>,
    devices: Vec<(usize, u8)>,
    transactions: Vec<Transaction>,
    transaction_count: usize,
    faults: BTreeMap<usize, FaultKind>,
    step_failures: Vec<Step>,
    bind_clocks: Vec<u32>,
    counters: Counters,
}

impl FakeState {
    fn new(sensor: SimulatedSensor) -> Self {
        Self {
            sensor,
            max_transfer_len: DEFAULT_FAKE_TRANSFER_LEN,
            keeps_bus: false,
            live_clock: false,
            next_handle: 0,
            bus: None,
            devices: Vec::new(),
            transactions: Vec::new(),
            transaction_count: 0,
            faults: BTreeMap::new(),
            step_failures: Vec::new(),
            bind_clocks: Vec::new(),
            counters: Counters::default(),
        }
    }

    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn take_step_failure(&mut self, step: Step) -> Result<(), FakeError> {
        match self.step_failures.iter().position(|s| *s == step) {
            Some(index) => {
                self.step_failures.remove(index);
                Err(FakeError::Injected(step))
            }
            None => Ok(()),
        }
    }

    fn check_device(&self, handle: usize) -> Result<(), FakeError> {
        if self.devices.iter().any(|(h, _)| *h == handle) {
            Ok(())
        } else {
            Err(FakeError::StaleHandle)
        }
    }

    /// Log a transaction, deciding whether it fails.
    ///
    /// Injected faults win, then a NACK if nothing answers at `i2c_address`.
    fn begin(
        &mut self,
        operation: Operation,
        i2c_address: u8,
        register: Address,
        words: usize,
        clock_hz: u32,
        timeout: Duration,
    ) -> Result<(), FakeError> {
        let index = self.transaction_count;
        self.transaction_count += 1;
        let fault = self.faults.remove(&index).or_else(|| {
            (i2c_address != self.sensor.i2c_address()).then(|| FaultKind::Nack)
        });
        self.transactions.push(Transaction {
            operation,
            register,
            words,
            clock_hz,
            timeout,
            fault,
        });
        match fault {
            Some(kind) => Err(FakeError::Fault(kind)),
            None => Ok(()),
        }
    }

    pub(crate) fn transmit(
        &mut self,
        i2c_address: u8,
        clock_hz: u32,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), FakeError> {
        // An address and at least one data word, all whole words.
        if bytes.len() < 4 || bytes.len() % 2 != 0 || bytes.len() > self.max_transfer_len {
            return Err(FakeError::IllegalOperation);
        }
        let register = Address::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        let payload = &bytes[2..];
        self.begin(
            Operation::Write,
            i2c_address,
            register,
            payload.len() / 2,
            clock_hz,
            timeout,
        )?;
        for (index, pair) in payload.chunks_exact(2).enumerate() {
            self.sensor
                .write_word(register.offset(index), u16::from_be_bytes([pair[0], pair[1]]));
        }
        Ok(())
    }

    pub(crate) fn transmit_receive(
        &mut self,
        i2c_address: u8,
        clock_hz: u32,
        bytes: &[u8],
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<(), FakeError> {
        // Only the register address is written, and the camera only hands out whole words. A
        // zero length read makes the camera reject the next transaction.
        if bytes.len() != 2
            || buffer.is_empty()
            || buffer.len() % 2 != 0
            || buffer.len() > self.max_transfer_len
        {
            return Err(FakeError::IllegalOperation);
        }
        let register = Address::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        self.begin(
            Operation::Read,
            i2c_address,
            register,
            buffer.len() / 2,
            clock_hz,
            timeout,
        )?;
        self.sensor.read_bytes(register, buffer);
        Ok(())
    }
}

/// A bus controller driving a [`SimulatedSensor`].
///
/// Clones share the same state, so a test can hand one clone to a
/// [`BusSession`][mlx9064x_i2c::BusSession] and keep another to inspect the transactions, inject
/// failures, or change the sensor's registers between operations.
#[derive(Clone, Debug)]
pub struct FakeController {
    state: Rc<RefCell<FakeState>>,
}

/// A claimed fake bus.
#[derive(Debug)]
pub struct FakeBus {
    handle: usize,
    pins: BusPins,
}

impl FakeBus {
    pub fn pins(&self) -> BusPins {
        self.pins
    }
}

/// A device bound on a fake bus.
pub struct FakeDevice {
    state: Rc<RefCell<FakeState>>,
    handle: usize,
    address: u8,
    clock_hz: u32,
}

impl fmt::Debug for FakeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeDevice")
            .field("handle", &self.handle)
            .field("address", &self.address)
            .field("clock_hz", &self.clock_hz)
            .finish()
    }
}

impl FakeController {
    pub fn new(sensor: SimulatedSensor) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new(sensor))),
        }
    }

    /// Limit each transaction to `max_transfer_len` bytes.
    pub fn with_max_transfer_len(self, max_transfer_len: usize) -> Self {
        self.state.borrow_mut().max_transfer_len = max_transfer_len;
        self
    }

    /// Keep the bus claimed while the device is rebound.
    pub fn keeps_bus(self, keeps_bus: bool) -> Self {
        self.state.borrow_mut().keeps_bus = keeps_bus;
        self
    }

    /// Allow the clock of a bound device to be changed in place.
    pub fn live_clock(self, live_clock: bool) -> Self {
        self.state.borrow_mut().live_clock = live_clock;
        self
    }

    pub fn sensor(&self) -> Ref<'_, SimulatedSensor> {
        Ref::map(self.state.borrow(), |state| &state.sensor)
    }

    pub fn sensor_mut(&self) -> RefMut<'_, SimulatedSensor> {
        RefMut::map(self.state.borrow_mut(), |state| &mut state.sensor)
    }

    /// Every transaction so far, oldest first.
    pub fn transactions(&self) -> Ref<'_, [Transaction]> {
        Ref::map(self.state.borrow(), |state| state.transactions.as_slice())
    }

    pub fn clear_transactions(&self) {
        self.state.borrow_mut().transactions.clear();
    }

    /// Fail the `n`th transaction from now (`0` being the next one) with `kind`.
    pub fn fail_nth_transaction(&self, n: usize, kind: FaultKind) {
        let mut state = self.state.borrow_mut();
        let index = state.transaction_count + n;
        state.faults.insert(index, kind);
    }

    /// Fail the next call of the given lifecycle step.
    pub fn fail_next(&self, step: Step) {
        self.state.borrow_mut().step_failures.push(step);
    }

    /// The clock requested by every device bind so far, oldest first.
    pub fn bind_clocks(&self) -> Vec<u32> {
        self.state.borrow().bind_clocks.clone()
    }

    pub fn counters(&self) -> Counters {
        self.state.borrow().counters
    }

    /// Whether the bus is currently claimed.
    pub fn bus_claimed(&self) -> bool {
        self.state.borrow().bus.is_some()
    }

    /// The number of devices currently bound.
    pub fn bound_devices(&self) -> usize {
        self.state.borrow().devices.len()
    }

    pub(crate) fn shared_state(&self) -> Rc<RefCell<FakeState>> {
        Rc::clone(&self.state)
    }
}

impl Controller for FakeController {
    type Bus = FakeBus;
    type Device = FakeDevice;
    type Error = FakeError;

    fn max_transfer_len(&self) -> usize {
        self.state.borrow().max_transfer_len
    }

    fn keeps_bus_on_rebind(&self) -> bool {
        self.state.borrow().keeps_bus
    }

    fn create_bus(&mut self, pins: BusPins) -> Result<Self::Bus, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.take_step_failure(Step::CreateBus)?;
        if pins.sda == pins.scl {
            return Err(FakeError::InvalidPins(pins));
        }
        if state.bus.is_some() {
            return Err(FakeError::BusClaimed);
        }
        let handle = state.handle();
        state.bus = Some(handle);
        state.counters.buses_created += 1;
        Ok(FakeBus { handle, pins })
    }

    fn destroy_bus(&mut self, bus: Self::Bus) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.bus != Some(bus.handle) {
            return Err(FakeError::StaleHandle);
        }
        if !state.devices.is_empty() {
            return Err(FakeError::DeviceStillBound);
        }
        // The bus is gone even when the driver complains about it.
        state.bus = None;
        state.counters.buses_destroyed += 1;
        state.take_step_failure(Step::DestroyBus)
    }

    fn bind_device(
        &mut self,
        bus: &mut Self::Bus,
        address: u8,
        clock_hz: u32,
    ) -> Result<Self::Device, Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.bus != Some(bus.handle) {
            return Err(FakeError::StaleHandle);
        }
        state.take_step_failure(Step::BindDevice)?;
        if state.devices.iter().any(|(_, bound)| *bound == address) {
            return Err(FakeError::AddressInUse(address));
        }
        let handle = state.handle();
        state.devices.push((handle, address));
        state.bind_clocks.push(clock_hz);
        state.counters.devices_bound += 1;
        Ok(FakeDevice {
            state: Rc::clone(&self.state),
            handle,
            address,
            clock_hz,
        })
    }

    fn unbind_device(
        &mut self,
        bus: &mut Self::Bus,
        device: Self::Device,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.bus != Some(bus.handle) {
            return Err(FakeError::StaleHandle);
        }
        let position = state
            .devices
            .iter()
            .position(|(handle, _)| *handle == device.handle)
            .ok_or(FakeError::StaleHandle)?;
        state.devices.remove(position);
        state.counters.devices_unbound += 1;
        state.take_step_failure(Step::UnbindDevice)
    }

    fn retune(
        &mut self,
        _bus: &mut Self::Bus,
        device: &mut Self::Device,
        clock_hz: u32,
    ) -> Result<bool, Self::Error> {
        let state = self.state.borrow();
        state.check_device(device.handle)?;
        if state.live_clock {
            device.clock_hz = clock_hz;
        }
        Ok(state.live_clock)
    }
}

impl Device for FakeDevice {
    type Error = FakeError;

    fn transmit(&mut self, bytes: &[u8], timeout: Duration) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.check_device(self.handle)?;
        state.transmit(self.address, self.clock_hz, bytes, timeout)
    }

    fn transmit_receive(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.check_device(self.handle)?;
        state.transmit_receive(self.address, self.clock_hz, bytes, buffer, timeout)
    }
}
