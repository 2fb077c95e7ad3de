// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The calibration-then-frames flow an application runs against a camera.
use mlx9064x_i2c::{
    BusPins, BusSession, FaultKind, SessionConfig, EEPROM_START, EEPROM_WORDS, FAST_MODE_HZ,
    FRAME_START, FRAME_WORDS, STANDARD_MODE_HZ,
};
use mlx9064x_i2c_test_data::{
    eeprom_image, frame_image, FakeController, Operation, SimulatedSensor,
};

const PINS: BusPins = BusPins::new(47, 10);

fn chunks(words: usize, chunk_words: usize) -> usize {
    (words + chunk_words - 1) / chunk_words
}

#[test]
fn calibrate_then_stream_frames() {
    let controller = FakeController::new(SimulatedSensor::mlx90640()).with_max_transfer_len(64);
    let mut session =
        BusSession::open(controller.clone(), SessionConfig::new(PINS), STANDARD_MODE_HZ).unwrap();
    let chunk_words = session.chunk_words();

    let mut eeprom = vec![0u16; EEPROM_WORDS];
    session.read_words(EEPROM_START, &mut eeprom).unwrap();
    assert_eq!(eeprom, eeprom_image());

    session.reconfigure(FAST_MODE_HZ).unwrap();
    let mut frame = vec![0u16; FRAME_WORDS];
    for frame_number in 1..=3 {
        controller
            .sensor_mut()
            .load(FRAME_START, &frame_image(frame_number));
        session.read_words(FRAME_START, &mut frame).unwrap();
        assert_eq!(frame, frame_image(frame_number));
    }

    let eeprom_chunks = chunks(EEPROM_WORDS, chunk_words);
    let frame_chunks = chunks(FRAME_WORDS, chunk_words);
    let transactions = controller.transactions();
    assert_eq!(transactions.len(), eeprom_chunks + 3 * frame_chunks);
    assert!(transactions
        .iter()
        .all(|transaction| transaction.operation == Operation::Read));
    let (eeprom_reads, frame_reads) = transactions.split_at(eeprom_chunks);
    assert!(eeprom_reads
        .iter()
        .all(|transaction| transaction.clock_hz == STANDARD_MODE_HZ));
    assert!(frame_reads
        .iter()
        .all(|transaction| transaction.clock_hz == FAST_MODE_HZ));
    assert_eq!(controller.bind_clocks(), [STANDARD_MODE_HZ, FAST_MODE_HZ]);
}

#[test]
fn failed_frame_is_retried_by_caller() {
    let controller = FakeController::new(SimulatedSensor::mlx90640());
    let mut session =
        BusSession::open(controller.clone(), SessionConfig::new(PINS), FAST_MODE_HZ).unwrap();
    let mut frame = vec![0u16; FRAME_WORDS];
    controller.fail_nth_transaction(3, FaultKind::Timeout);
    assert!(session.read_words(FRAME_START, &mut frame).is_err());
    // The failed buffer is thrown away, and the next attempt reads the whole frame again.
    frame.iter_mut().for_each(|word| *word = 0);
    session.read_words(FRAME_START, &mut frame).unwrap();
    assert_eq!(frame, frame_image(0));
    assert_eq!(session.clock_hz(), Some(FAST_MODE_HZ));
}
