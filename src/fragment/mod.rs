//! Transparent fragmentation and reassembly.
//!
//! Messages whose encoded body does not fit a transport's packet limit are
//! split into fragments that share a seven-bit [`SequenceNumber`]. The
//! receiving side collects fragments per transport and hands complete bodies
//! back to the inner codec. On transports that may lose packets a
//! [`SlidingWindow`] bounds how many partial messages are kept.

pub mod config;
pub mod error;
pub mod fragmenting;
pub mod header;
pub mod id;
pub mod reassembly;
pub mod window;

pub use config::{
    DEFAULT_WINDOW_SIZE,
    FragmentationConfig,
    MAX_WINDOW_SIZE,
    MIN_WINDOW_SIZE,
    SEQUENCE_CAPACITY,
    WindowSizeError,
};
pub use error::ReassemblyError;
pub use fragmenting::FragmentingCodec;
pub use header::{FragmentSubHeader, MAX_FRAGMENT_OVERHEAD, MAX_SUB_HEADER_SIZE};
pub use id::SequenceNumber;
pub use reassembly::{FragmentedMessage, Reassembled, Sequences};
pub use window::SlidingWindow;

#[cfg(test)]
mod tests;
