//! Error types for Krait

use std::io;
use thiserror::Error;

use crate::platform::Mode;

/// Result type for Krait operations
pub type Result<T> = std::result::Result<T, KraitError>;

/// Errors that can occur in Krait operations
#[derive(Debug, Error)]
pub enum KraitError {
    /// Failed to reserve backing memory
    #[error("Failed to allocate region of {size} bytes: {source}")]
    AllocationFailed {
        size: u64,
        #[source]
        source: io::Error,
    },

    /// Failed to clone the region handle
    #[error("Failed to duplicate region handle: {0}")]
    DuplicationFailed(#[source] io::Error),

    /// Handle is dead, or its metadata does not describe a real allocation
    #[error("Region handle is invalid or already released")]
    InvalidHandle,

    /// Declared mode disagrees with the expected or platform-reported mode
    #[error("Region mode mismatch: expected {expected:?}, got {actual:?}")]
    ModeMismatch { expected: Mode, actual: Mode },

    /// Requested range exceeds the declared region size
    #[error("Range out of bounds: offset {offset} + length {len} exceeds region size {size}")]
    RangeOutOfBounds { offset: u64, len: u64, size: u64 },

    /// Failed to map the region into the address space
    #[error("Failed to map region: {0}")]
    MapFailed(#[source] io::Error),

    /// Failed to unmap a mapped range
    #[error("Failed to unmap region: {0}")]
    UnmapFailed(#[source] io::Error),

    /// Regions cannot be allocated directly in this mode
    #[error("Regions cannot be allocated directly in {0:?} mode")]
    UnsupportedMode(Mode),

    /// Zero-length region or mapping request
    #[error("Region and mapping sizes must be non-zero")]
    ZeroSize,
}
