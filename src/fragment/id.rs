//! Seven-bit sequence numbers that tie fragments of one message together.

use derive_more::{Display, Into};

use super::config::SEQUENCE_CAPACITY;

/// Sequence number of a fragmented message, in `0..128`.
///
/// The top bit of the on-wire byte distinguishes first fragments from
/// continuations, leaving seven bits for the number itself.
///
/// # Examples
///
/// ```
/// use groupwire::fragment::SequenceNumber;
///
/// let last = SequenceNumber::new(127).expect("seven bits");
/// assert_eq!(last.next().get(), 0);
/// assert!(SequenceNumber::new(128).is_none());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Into)]
#[display("{_0}")]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Wrap `value` if it fits in seven bits.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value < SEQUENCE_CAPACITY {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Take the low seven bits of an on-wire byte.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Self { Self(byte & (SEQUENCE_CAPACITY - 1)) }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// The following number, wrapping after 127.
    #[must_use]
    pub const fn next(self) -> Self { Self((self.0 + 1) % SEQUENCE_CAPACITY) }
}

impl From<SequenceNumber> for u32 {
    fn from(value: SequenceNumber) -> Self { Self::from(value.0) }
}
