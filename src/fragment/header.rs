//! Fragment sub-header that follows the six-byte wire header.
//!
//! First fragment: `[seq][count]`; continuation: `[seq | 0x80][index]`, with
//! count and index in the adaptive length encoding.

use bytes::BufMut;

use super::SequenceNumber;
use crate::{
    byte_order::{LengthError, MAX_LENGTH_BYTES, decode_length, encode_length, encoded_length_size},
    wire::HEADER_SIZE,
};

const CONTINUATION_FLAG: u8 = 0x80;

/// Largest fragment sub-header: sequence byte plus a four-byte length.
pub const MAX_SUB_HEADER_SIZE: usize = 1 + MAX_LENGTH_BYTES;

/// Worst-case bytes a fragment spends on headers.
pub const MAX_FRAGMENT_OVERHEAD: usize = HEADER_SIZE + MAX_SUB_HEADER_SIZE;

/// Decoded fragment sub-header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentSubHeader {
    /// Fragment 0, announcing how many fragments make up the message.
    First { seq: SequenceNumber, count: u32 },
    /// Fragment `index`, which is at least 1.
    Continuation { seq: SequenceNumber, index: u32 },
}

impl FragmentSubHeader {
    /// Sequence number shared by every fragment of the message.
    #[must_use]
    pub const fn seq(&self) -> SequenceNumber {
        match self {
            Self::First { seq, .. } | Self::Continuation { seq, .. } => *seq,
        }
    }

    /// Index of this fragment within its message.
    #[must_use]
    pub const fn index(&self) -> u32 {
        match self {
            Self::First { .. } => 0,
            Self::Continuation { index, .. } => *index,
        }
    }

    /// Number of bytes [`encode`](Self::encode) writes.
    ///
    /// # Errors
    ///
    /// Returns [`LengthError::TooLarge`] if the count or index does not fit.
    pub fn encoded_len(&self) -> Result<usize, LengthError> {
        Ok(1 + encoded_length_size(u64::from(self.number()))?)
    }

    /// Append the on-wire bytes to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`LengthError::TooLarge`] if the count or index does not fit;
    /// nothing is written in that case.
    pub fn encode(&self, out: &mut impl BufMut) -> Result<usize, LengthError> {
        encoded_length_size(u64::from(self.number()))?;
        let seq = self.seq().get();
        out.put_u8(match self {
            Self::First { .. } => seq,
            Self::Continuation { .. } => seq | CONTINUATION_FLAG,
        });
        Ok(1 + encode_length(u64::from(self.number()), out)?)
    }

    /// Parse a sub-header from the start of `input`, returning it with the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`LengthError::Truncated`] if `input` ends early.
    pub fn decode(input: &[u8]) -> Result<(Self, usize), LengthError> {
        let Some((&first, rest)) = input.split_first() else {
            return Err(LengthError::Truncated {
                needed: 1,
                available: 0,
            });
        };
        let seq = SequenceNumber::from_wire(first);
        let (number, used) = decode_length(rest)?;
        let header = if first & CONTINUATION_FLAG == 0 {
            Self::First { seq, count: number }
        } else {
            Self::Continuation { seq, index: number }
        };
        Ok((header, 1 + used))
    }

    const fn number(&self) -> u32 {
        match self {
            Self::First { count, .. } => *count,
            Self::Continuation { index, .. } => *index,
        }
    }
}
