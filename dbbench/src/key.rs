//! Fixed-width decimal keys.

use std::fmt;

/// Width of every encoded key in bytes.
pub const KEY_SIZE: usize = 16;

/// Number of distinct key indices that fit into [`KEY_SIZE`] digits.
pub const KEY_SPACE: u64 = 10_u64.pow(KEY_SIZE as u32);

/// A key index encoded as a zero-padded decimal string.
///
/// The fixed width makes the lexicographic order of encoded keys match the numeric order of
/// their indices, which sequential scans rely on.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Encodes `index`, which must be below [`KEY_SPACE`].
    pub fn new(index: u64) -> Self {
        debug_assert!(index < KEY_SPACE, "key index {index} out of range");

        let mut digits = [b'0'; KEY_SIZE];
        let mut rest = index;
        for digit in digits.iter_mut().rev() {
            *digit = b'0' + (rest % 10) as u8;
            rest /= 10;
        }
        Self(digits)
    }

    /// Decodes an encoded key back into its index.
    ///
    /// Returns `None` unless `bytes` are exactly [`KEY_SIZE`] decimal digits.
    pub fn parse(bytes: &[u8]) -> Option<u64> {
        if bytes.len() != KEY_SIZE {
            return None;
        }
        bytes.iter().try_fold(0_u64, |index, byte| {
            byte.is_ascii_digit()
                .then(|| index * 10 + u64::from(byte - b'0'))
        })
    }

    /// The encoded key as stored in the table.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only ever contains ASCII digits.
        for &digit in &self.0 {
            write!(f, "{}", digit as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_padded() {
        assert_eq!(Key::new(0).as_bytes(), b"0000000000000000");
        assert_eq!(Key::new(999).as_bytes(), b"0000000000000999");
        assert_eq!(Key::new(KEY_SPACE - 1).as_bytes(), b"9999999999999999");
    }

    #[test]
    fn matches_formatted_integer() {
        for index in [1, 42, 1_000, 123_456_789, 200_000] {
            assert_eq!(Key::new(index).to_string(), format!("{index:016}"));
        }
    }

    #[test]
    fn parse_roundtrip() {
        for index in [0, 7, 499, 65_536, 9_999_999_999] {
            assert_eq!(Key::parse(Key::new(index).as_bytes()), Some(index));
        }
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert_eq!(Key::parse(b"123"), None);
        assert_eq!(Key::parse(b"00000000000000000"), None);
        assert_eq!(Key::parse(b"00000000000000a1"), None);
    }

    #[test]
    fn byte_order_follows_numeric_order() {
        let indices = [0, 1, 9, 10, 99, 100, 12_345, 99_999];
        for pair in indices.windows(2) {
            let (a, b) = (Key::new(pair[0]), Key::new(pair[1]));
            assert!(a.as_bytes() < b.as_bytes(), "{a} < {b}");
            assert!(a < b);
        }
    }
}
