// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The word size of the camera in terms of 8-bit bytes.
pub(crate) const WORD_SIZE: usize = (u16::BITS / u8::BITS) as usize;

/// Emit a `log::debug!` record when the `log` feature is enabled, and nothing otherwise.
///
/// Only binding lifecycle changes go through this, errors are left for the caller to report.
macro_rules! lifecycle {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        ::log::debug!($($arg)+);
    };
}
pub(crate) use lifecycle;

/// A cursor over big-endian words in a byte slice, advancing as words are taken off the front.
pub(crate) trait WordCursor {
    fn bytes_left(&self) -> usize;
    fn next_word(&mut self) -> u16;
}

impl WordCursor for &[u8] {
    fn bytes_left(&self) -> usize {
        self.len()
    }

    fn next_word(&mut self) -> u16 {
        let (word, rest) = self.split_at(WORD_SIZE);
        *self = rest;
        u16::from_be_bytes([word[0], word[1]])
    }
}

/// Reassemble big-endian byte pairs into words, filling `words` from the front.
///
/// `bytes` must hold at least `2 * words.len()` bytes.
pub(crate) fn words_from_be_bytes(mut bytes: &[u8], words: &mut [u16]) {
    debug_assert!(bytes.bytes_left() >= words.len() * WORD_SIZE);
    for word in words.iter_mut() {
        *word = bytes.next_word();
    }
}

#[cfg(test)]
mod test {
    use super::{words_from_be_bytes, WordCursor};

    #[test]
    fn cursor_advances() {
        let mut cursor: &[u8] = &[0xBE, 0xEF, 0x01, 0x02, 0x03];
        assert_eq!(cursor.next_word(), 0xBEEF);
        assert_eq!(cursor.bytes_left(), 3);
        assert_eq!(cursor.next_word(), 0x0102);
        assert_eq!(cursor, [0x03]);
    }

    #[test]
    fn first_byte_is_high_byte() {
        let mut words = [0u16; 1];
        words_from_be_bytes(b"\x12\x34", &mut words);
        assert_eq!(words, [0x1234]);
    }

    #[test]
    fn extra_bytes_are_ignored() {
        let mut words = [0u16; 2];
        words_from_be_bytes(b"\x00\x01\xff\xfe\xaa", &mut words);
        assert_eq!(words, [0x0001, 0xfffe]);
    }
}
