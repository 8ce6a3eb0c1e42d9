//! Mapped views into a region
//!
//! A mapping owns its address range: once constructed it keeps the
//! underlying pages alive independent of the region object it came from.
//! The read/write split is carried by two newtypes over one owned core, so
//! the compiler, not a runtime flag, rejects writes through a read-only
//! view.

use crate::error::{KraitError, Result};
use crate::platform::RegionId;
use crate::sys::{self, MapView};
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

/// The owned address range shared by both mapping types.
///
/// `len` is the requested length and the only span ever exposed as bytes;
/// `mapped_size` is the page-rounded span handed back by the OS and is what
/// gets unmapped on drop.
#[derive(Debug)]
pub(crate) struct RawMapping {
    base: NonNull<u8>,
    delta: usize,
    len: usize,
    mapped_size: usize,
    id: RegionId,
}

impl RawMapping {
    pub(crate) fn new(view: MapView, len: usize, id: RegionId) -> Self {
        Self {
            base: view.base,
            delta: view.delta,
            len,
            mapped_size: view.mapped_size,
            id,
        }
    }

    /// Start of the requested bytes, `delta` bytes past the mapping base
    #[inline]
    fn data(&self) -> *mut u8 {
        unsafe { self.base.as_ptr().add(self.delta) }
    }

    /// Unmap now, surfacing the failure the drop path can only log
    pub(crate) fn unmap_now(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        // SAFETY: ManuallyDrop suppresses the drop-path unmap, so the range
        // is unmapped exactly once
        unsafe { sys::unmap(this.base, this.mapped_size) }
            .map_err(|e| KraitError::UnmapFailed(e.into()))
    }
}

impl Drop for RawMapping {
    fn drop(&mut self) {
        // SAFETY: base and mapped_size came from sys::map and this is the
        // only place the range is ever unmapped
        if let Err(e) = unsafe { sys::unmap(self.base, self.mapped_size) } {
            log::warn!(
                "failed to unmap {} bytes at {:p}: {e}",
                self.mapped_size,
                self.base.as_ptr()
            );
        }
    }
}

/// Immutable view of a region's bytes
#[derive(Debug)]
pub struct ReadOnlyMapping {
    raw: RawMapping,
}

// SAFETY: the view is immutable and the range is exclusively owned, so
// concurrent reads from any number of threads are sound
unsafe impl Send for ReadOnlyMapping {}
unsafe impl Sync for ReadOnlyMapping {}

impl ReadOnlyMapping {
    pub(crate) fn new(raw: RawMapping) -> Self {
        Self { raw }
    }

    /// The mapped bytes, exactly the requested length
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the range is owned, mapped, and never exposed mutably
        unsafe { slice::from_raw_parts(self.raw.data(), self.raw.len) }
    }

    /// Requested length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// Page-rounded span actually mapped. Never readable beyond
    /// [`len`](Self::len); exposed for diagnostics only.
    #[inline]
    pub fn mapped_size(&self) -> usize {
        self.raw.mapped_size
    }

    /// Identifier of the region this view came from, for correlation only
    #[inline]
    pub fn region_id(&self) -> RegionId {
        self.raw.id
    }

    /// Unmap explicitly, surfacing any failure instead of logging it
    pub fn unmap(self) -> Result<()> {
        self.raw.unmap_now()
    }
}

impl Deref for ReadOnlyMapping {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Mutable view of a region's bytes
#[derive(Debug)]
pub struct WritableMapping {
    raw: RawMapping,
}

// SAFETY: mutation requires `&mut self`, so a shared reference only ever
// reads; the range is exclusively owned
unsafe impl Send for WritableMapping {}
unsafe impl Sync for WritableMapping {}

impl WritableMapping {
    pub(crate) fn new(raw: RawMapping) -> Self {
        Self { raw }
    }

    /// The mapped bytes, exactly the requested length
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the range is owned and mapped readable
        unsafe { slice::from_raw_parts(self.raw.data(), self.raw.len) }
    }

    /// The mapped bytes, writable
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the range is owned and mapped writable; &mut self gives
        // exclusive access to this view
        unsafe { slice::from_raw_parts_mut(self.raw.data(), self.raw.len) }
    }

    /// Requested length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// Page-rounded span actually mapped. Never accessible beyond
    /// [`len`](Self::len); exposed for diagnostics only.
    #[inline]
    pub fn mapped_size(&self) -> usize {
        self.raw.mapped_size
    }

    /// Identifier of the region this view came from, for correlation only
    #[inline]
    pub fn region_id(&self) -> RegionId {
        self.raw.id
    }

    /// Unmap explicitly, surfacing any failure instead of logging it
    pub fn unmap(self) -> Result<()> {
        self.raw.unmap_now()
    }
}

impl Deref for WritableMapping {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for WritableMapping {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}
