// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use mlx9064x_i2c::{
    BusPins, BusSession, ConfigError, Error, FaultKind, SessionConfig, Status, WritePhase,
    EEPROM_START, STANDARD_MODE_HZ,
};
use mlx9064x_i2c_test_data::{
    FakeController, FakeError, Operation, SimulatedSensor, CONTROL_REGISTER, STATUS_REGISTER,
};

const PINS: BusPins = BusPins::new(47, 10);

fn open(controller: &FakeController) -> BusSession<FakeController> {
    BusSession::open(controller.clone(), SessionConfig::new(PINS), STANDARD_MODE_HZ).unwrap()
}

#[test]
fn write_then_verify() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    session.write_word(CONTROL_REGISTER, 0x0981).unwrap();
    assert_eq!(controller.sensor().word(CONTROL_REGISTER), 0x0981);
    let transactions = controller.transactions();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].operation, Operation::Write);
    assert_eq!(transactions[0].register, CONTROL_REGISTER);
    assert_eq!(transactions[0].words, 1);
    assert_eq!(transactions[1].operation, Operation::Read);
    assert_eq!(transactions[1].register, CONTROL_REGISTER);
    assert_eq!(transactions[1].words, 1);
}

#[test]
fn write_then_read_back() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    session.write_word(STATUS_REGISTER, 0x0030).unwrap();
    let mut out = [0u16; 1];
    session.read_words(STATUS_REGISTER, &mut out).unwrap();
    assert_eq!(out, [0x0030]);
}

#[test]
fn ignored_write_is_a_mismatch() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let original = controller.sensor().word(EEPROM_START);
    let mut session = open(&controller);
    let err = session.write_word(EEPROM_START, !original).unwrap_err();
    assert_eq!(
        err,
        Error::VerifyMismatch {
            address: EEPROM_START,
            expected: !original,
            actual: original,
        }
    );
    assert_eq!(err.status(), Status::WriteError);
    assert_eq!(controller.sensor().word(EEPROM_START), original);
}

#[test]
fn reserved_bits_are_a_mismatch() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    let err = session.write_word(CONTROL_REGISTER, 0xFFFF).unwrap_err();
    assert_eq!(
        err,
        Error::VerifyMismatch {
            address: CONTROL_REGISTER,
            expected: 0xFFFF,
            actual: 0x1FFF,
        }
    );
}

#[test]
fn writable_after_mask_change() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    controller
        .sensor_mut()
        .set_write_mask(EEPROM_START, 0xFFFF);
    let mut session = open(&controller);
    session.write_word(EEPROM_START, 0xBEEF).unwrap();
    assert_eq!(controller.sensor().word(EEPROM_START), 0xBEEF);
}

#[test]
fn failed_transmit_skips_verify() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    controller.fail_nth_transaction(0, FaultKind::Nack);
    let err = session.write_word(CONTROL_REGISTER, 0x0981).unwrap_err();
    assert_eq!(
        err,
        Error::Write {
            phase: WritePhase::Transmit,
            address: CONTROL_REGISTER,
            kind: FaultKind::Nack,
            source: FakeError::Fault(FaultKind::Nack),
        }
    );
    assert_eq!(err.status(), Status::WriteError);
    assert_eq!(controller.transactions().len(), 1);
}

#[test]
fn failed_verify_read() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    controller.fail_nth_transaction(1, FaultKind::Timeout);
    let err = session.write_word(CONTROL_REGISTER, 0x0981).unwrap_err();
    assert_eq!(
        err,
        Error::Write {
            phase: WritePhase::Verify,
            address: CONTROL_REGISTER,
            kind: FaultKind::Timeout,
            source: FakeError::Fault(FaultKind::Timeout),
        }
    );
    assert_eq!(err.status(), Status::WriteError);
    // The write itself went through.
    assert_eq!(controller.sensor().word(CONTROL_REGISTER), 0x0981);
}

#[test]
fn closed_session_writes_nothing() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = BusSession::new(controller.clone(), SessionConfig::new(PINS));
    let err = session.write_word(CONTROL_REGISTER, 0x0981).unwrap_err();
    assert_eq!(err, Error::Config(ConfigError::Closed));
    assert!(controller.transactions().is_empty());
}

#[test]
fn general_reset_is_silent() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session = open(&controller);
    session.general_reset();
    assert!(controller.transactions().is_empty());
    session.close().unwrap();
    session.general_reset();
    assert!(controller.transactions().is_empty());
}
