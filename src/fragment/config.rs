//! Settings for fragment reassembly.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

/// Number of distinct sequence numbers (7 bits).
pub const SEQUENCE_CAPACITY: u8 = 128;
/// Default number of sequence numbers kept open on lossy transports.
pub const DEFAULT_WINDOW_SIZE: u8 = 16;
/// Smallest accepted window.
pub const MIN_WINDOW_SIZE: u8 = 2;
/// Largest accepted window; must stay below [`SEQUENCE_CAPACITY`].
pub const MAX_WINDOW_SIZE: u8 = SEQUENCE_CAPACITY - 1;

const_assert!(DEFAULT_WINDOW_SIZE >= MIN_WINDOW_SIZE);
const_assert!(DEFAULT_WINDOW_SIZE <= MAX_WINDOW_SIZE);

/// Rejected fragmentation settings.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("window size {0} outside {MIN_WINDOW_SIZE}..={MAX_WINDOW_SIZE}")]
pub struct WindowSizeError(pub u8);

/// Settings that bound reassembly memory on lossy transports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFragmentationConfig")]
pub struct FragmentationConfig {
    window_size: u8,
}

#[derive(Deserialize)]
struct RawFragmentationConfig {
    #[serde(default = "default_window_size")]
    window_size: u8,
}

fn default_window_size() -> u8 { DEFAULT_WINDOW_SIZE }

impl TryFrom<RawFragmentationConfig> for FragmentationConfig {
    type Error = WindowSizeError;

    fn try_from(raw: RawFragmentationConfig) -> Result<Self, Self::Error> { Self::new(raw.window_size) }
}

impl FragmentationConfig {
    /// Configure a reassembly window of `window_size` sequence numbers.
    ///
    /// # Errors
    ///
    /// Returns [`WindowSizeError`] outside
    /// [`MIN_WINDOW_SIZE`]`..=`[`MAX_WINDOW_SIZE`].
    ///
    /// # Examples
    ///
    /// ```
    /// use groupwire::fragment::FragmentationConfig;
    ///
    /// assert!(FragmentationConfig::new(32).is_ok());
    /// assert!(FragmentationConfig::new(128).is_err());
    /// ```
    pub const fn new(window_size: u8) -> Result<Self, WindowSizeError> {
        if window_size < MIN_WINDOW_SIZE || window_size > MAX_WINDOW_SIZE {
            return Err(WindowSizeError(window_size));
        }
        Ok(Self { window_size })
    }

    /// Number of sequence numbers kept open.
    #[must_use]
    pub const fn window_size(&self) -> u8 { self.window_size }
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}
