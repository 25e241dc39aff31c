/// The 64 digits used by our URL-safe base64 encoding of database keys, in
/// ascending order of value.
pub(crate) const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Maps a single base64 digit back to its value. Returns `None` for bytes
/// that are not valid digits.
pub(crate) fn base64_decode_digit(ascii: u8) -> Option<u8> {
    match ascii {
        b'A'..=b'Z' => Some(ascii - b'A'),
        b'a'..=b'z' => Some(ascii - b'a' + 26),
        b'0'..=b'9' => Some(ascii - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::{BASE64_DIGITS, base64_decode_digit};

    #[test]
    fn digits_roundtrip() {
        for (value, &digit) in BASE64_DIGITS.iter().enumerate() {
            assert_eq!(base64_decode_digit(digit), Some(value as u8));
        }
    }

    #[test]
    fn invalid_digits() {
        for b in [b'*', b'?', b'/', b'+', b' ', b'\n', 0, 255] {
            assert_eq!(base64_decode_digit(b), None);
        }
    }
}
