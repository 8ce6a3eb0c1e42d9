//! Krait - Mode-checked shared memory regions for cross-process IPC
//!
//! This library lets one process allocate a block of shared memory, hand a
//! reference to it to another process by serializing its OS handle, and have
//! both sides map the block into their own address space, with the block's
//! read/write capability fixed at creation and re-validated on every
//! reconstruction.
//!
//! # Architecture
//!
//! - **Regions**: [`WritableRegion`] (single expected writer),
//!   [`UnsafeRegion`] (aliased writers by protocol), and [`ReadOnlyRegion`]
//!   (only ever produced by conversion or reconstruction, never allocated
//!   from scratch). Each is a move-only owner of one OS handle.
//! - **Mappings**: [`WritableMapping`] and [`ReadOnlyMapping`], views whose
//!   lifetime is independent of the region they came from. The read/write
//!   split is a compile-time property of the types.
//! - **Transfer**: a region becomes a [`WireHandle`] (descriptor plus
//!   serializable [`WireMetadata`]); the receiving side reconstructs it
//!   through the matching region type, which fails on any mode mismatch.
//!
//! Regions carry no synchronization: writes made through one mapping are
//! not ordered relative to reads through another until callers fence or use
//! atomics at the application layer.

pub mod error;
pub mod mapping;
pub mod platform;
pub mod region;
mod sys;
pub mod wire;

pub use error::{KraitError, Result};
pub use mapping::{ReadOnlyMapping, WritableMapping};
pub use platform::{Mode, PlatformRegion, RegionId};
pub use region::{MappedReadOnlyRegion, ReadOnlyRegion, UnsafeRegion, WritableRegion};
pub use wire::{WireHandle, WireMetadata};
