//! Protocol violations detected during reassembly.
//!
//! Ordinary loss (duplicates, stale sequence numbers) is not an error and is
//! dropped quietly; these variants describe fragments that contradict what
//! the sender already announced.

use thiserror::Error;

use super::SequenceNumber;

/// A fragment rejected without disturbing other reassemblies.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReassemblyError {
    /// A first fragment announced zero fragments.
    #[error("sequence {seq} announced zero fragments")]
    ZeroFragmentCount { seq: SequenceNumber },
    /// A continuation fragment claimed index zero, which only the first
    /// fragment may hold.
    #[error("sequence {seq}: continuation fragment with index 0")]
    ZeroContinuationIndex { seq: SequenceNumber },
    /// A fragment index lies beyond the announced count.
    #[error("sequence {seq}: fragment {index} beyond announced count {count}")]
    IndexBeyondCount {
        seq: SequenceNumber,
        index: u32,
        count: u32,
    },
    /// A second first fragment disagreed with the announced count.
    #[error("sequence {seq}: count {found} contradicts announced {expected}")]
    CountMismatch {
        seq: SequenceNumber,
        expected: u32,
        found: u32,
    },
    /// The set this fragment belongs to was already delivered.
    #[error("sequence {seq} already completed")]
    AlreadyComplete { seq: SequenceNumber },
}
