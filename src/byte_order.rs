//! Helpers for explicit network byte-order conversions.
//!
//! Besides the fixed-width `u32` helpers used by the wire header, this module
//! carries the adaptive length encoding used for fragment counts and indices:
//! the top two bits of the first byte give the number of bytes that follow
//! (zero to three), leaving 6, 14, 22 or 30 value bits.

use bytes::BufMut;
use thiserror::Error;

/// Largest value the adaptive length encoding can represent.
pub const MAX_ENCODED_LENGTH: u32 = (1 << 30) - 1;

/// Longest adaptive encoding, in bytes.
pub const MAX_LENGTH_BYTES: usize = 4;

/// Failures of the adaptive length encoding.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LengthError {
    /// The value needs more than 30 bits.
    #[error("cannot encode length {0}: limit is 2^30 - 1")]
    TooLarge(u64),
    /// The input ended before the encoded length did.
    #[error("length encoding truncated: needed {needed} bytes, found {available}")]
    Truncated { needed: usize, available: usize },
}

/// Serialise a `u32` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use groupwire::byte_order::write_network_u32;
///
/// assert_eq!(write_network_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use groupwire::byte_order::read_network_u32;
///
/// assert_eq!(read_network_u32([0x12, 0x34, 0x56, 0x78]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes(bytes)
}

/// Number of bytes [`encode_length`] writes for `value`.
///
/// # Errors
///
/// Returns [`LengthError::TooLarge`] above [`MAX_ENCODED_LENGTH`].
pub fn encoded_length_size(value: u64) -> Result<usize, LengthError> {
    match value {
        0..0x40 => Ok(1),
        0x40..0x4000 => Ok(2),
        0x4000..0x40_0000 => Ok(3),
        0x40_0000..0x4000_0000 => Ok(4),
        _ => Err(LengthError::TooLarge(value)),
    }
}

/// Append the adaptive encoding of `value` to `out`, returning the number of
/// bytes written.
///
/// # Errors
///
/// Returns [`LengthError::TooLarge`] above [`MAX_ENCODED_LENGTH`]; nothing is
/// written in that case.
///
/// # Examples
///
/// ```
/// use groupwire::byte_order::encode_length;
///
/// let mut out = Vec::new();
/// encode_length(300, &mut out).expect("300 fits");
/// assert_eq!(out, [0x41, 0x2c]);
/// ```
pub fn encode_length(value: u64, out: &mut impl BufMut) -> Result<usize, LengthError> {
    let size = encoded_length_size(value)?;
    let value = u32::try_from(value).map_err(|_| LengthError::TooLarge(value))?;
    let mut bytes = write_network_u32(value);
    let first = MAX_LENGTH_BYTES - size;
    bytes[first] |= u8::try_from(size - 1).unwrap_or(0) << 6;
    out.put_slice(&bytes[first..]);
    Ok(size)
}

/// Decode an adaptive length from the start of `input`, returning the value
/// and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`LengthError::Truncated`] when `input` is shorter than the
/// encoding announced by its first byte.
pub fn decode_length(input: &[u8]) -> Result<(u32, usize), LengthError> {
    let Some(&first) = input.first() else {
        return Err(LengthError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    let size = usize::from(first >> 6) + 1;
    if input.len() < size {
        return Err(LengthError::Truncated {
            needed: size,
            available: input.len(),
        });
    }
    let mut bytes = [0u8; MAX_LENGTH_BYTES];
    let start = MAX_LENGTH_BYTES - size;
    bytes[start..].copy_from_slice(&input[..size]);
    bytes[start] &= 0x3f;
    Ok((read_network_u32(bytes), size))
}

#[cfg(test)]
mod tests {
    //! Boundary checks for network-order helpers and adaptive lengths.

    use rstest::rstest;

    use super::{
        LengthError,
        MAX_ENCODED_LENGTH,
        decode_length,
        encode_length,
        read_network_u32,
        write_network_u32,
    };

    #[test]
    fn network_u32_round_trip() {
        assert_eq!(write_network_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
        assert_eq!(read_network_u32([0x12, 0x34, 0x56, 0x78]), 0x1234_5678);
    }

    #[rstest]
    #[case::zero(0, &[0x00])]
    #[case::one_byte_max(63, &[0x3f])]
    #[case::two_byte_min(64, &[0x40, 0x40])]
    #[case::two_byte_max(16_383, &[0x7f, 0xff])]
    #[case::three_byte_min(16_384, &[0x80, 0x40, 0x00])]
    #[case::three_byte_max(4_194_303, &[0xbf, 0xff, 0xff])]
    #[case::four_byte_min(4_194_304, &[0xc0, 0x40, 0x00, 0x00])]
    #[case::four_byte_max(u64::from(MAX_ENCODED_LENGTH), &[0xff, 0xff, 0xff, 0xff])]
    fn adaptive_length_boundaries(#[case] value: u64, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        let written = encode_length(value, &mut out).expect("value within range");
        assert_eq!(written, expected.len());
        assert_eq!(out, expected);

        let (decoded, consumed) = decode_length(&out).expect("complete encoding");
        assert_eq!(u64::from(decoded), value);
        assert_eq!(consumed, expected.len());
    }

    #[rstest]
    #[case(1 << 30)]
    #[case(u64::from(u32::MAX))]
    #[case(u64::MAX)]
    fn oversized_lengths_fail_without_writing(#[case] value: u64) {
        let mut out = Vec::new();
        assert_eq!(encode_length(value, &mut out), Err(LengthError::TooLarge(value)));
        assert!(out.is_empty());
    }

    #[test]
    fn truncated_input_is_reported() {
        assert_eq!(
            decode_length(&[0xc0, 0x01]),
            Err(LengthError::Truncated {
                needed: 4,
                available: 2
            })
        );
        assert_eq!(
            decode_length(&[]),
            Err(LengthError::Truncated {
                needed: 1,
                available: 0
            })
        );
    }
}
