//! Capability-typed region variants
//!
//! Each variant owns one [`PlatformRegion`] of the matching mode and
//! constrains which mapping type it can produce, so a value typed
//! [`ReadOnlyRegion`] can never hand out writable memory.

use crate::error::{KraitError, Result};
use crate::mapping::{ReadOnlyMapping, WritableMapping};
use crate::platform::{Mode, PlatformRegion, RegionId};
use crate::wire::WireHandle;

/// Region whose mappings are always read-only.
///
/// There is no way to allocate one directly from arbitrary data: it is
/// produced by [`WritableRegion::convert_to_read_only`], by [`Self::create`]
/// (which hands the producer exactly one writable mapping to fill), or by
/// reconstructing a transferred read-only handle.
#[derive(Debug)]
pub struct ReadOnlyRegion {
    platform: PlatformRegion,
}

impl ReadOnlyRegion {
    /// Allocate a region and return it read-only, paired with one writable
    /// mapping of the whole span for the producer. May block in the kernel.
    pub fn create(size: u64) -> Result<MappedReadOnlyRegion> {
        let writable = WritableRegion::create(size)?;
        let mapping = writable.map()?;
        let region = writable.convert_to_read_only()?;
        Ok(MappedReadOnlyRegion { region, mapping })
    }

    pub(crate) fn from_platform(platform: PlatformRegion) -> Result<Self> {
        if platform.mode() != Mode::ReadOnly {
            return Err(KraitError::ModeMismatch {
                expected: Mode::ReadOnly,
                actual: platform.mode(),
            });
        }
        Ok(Self { platform })
    }

    /// Map the whole region. May block in the kernel.
    pub fn map(&self) -> Result<ReadOnlyMapping> {
        self.map_at(0, self.platform.size())
    }

    /// Map `len` bytes at `offset`. May block in the kernel.
    pub fn map_at(&self, offset: u64, len: u64) -> Result<ReadOnlyMapping> {
        Ok(ReadOnlyMapping::new(self.platform.map_at(offset, len, false)?))
    }

    /// Same-mode duplicate, for handing a second reference to another process
    pub fn duplicate(&self) -> Result<Self> {
        Ok(Self {
            platform: self.platform.duplicate()?,
        })
    }

    /// Consume the region into its transferable representation
    pub fn into_wire_handle(self) -> WireHandle {
        self.platform.into_wire()
    }

    /// Reconstruct from a received handle, failing on any mode mismatch
    pub fn from_wire_handle(wire: WireHandle) -> Result<Self> {
        Ok(Self {
            platform: PlatformRegion::from_wire(wire, Mode::ReadOnly)?,
        })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.platform.size()
    }

    #[inline]
    pub fn id(&self) -> RegionId {
        self.platform.id()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.platform.mode()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.platform.is_valid()
    }
}

/// A freshly allocated read-only region together with the producer's one
/// writable view of it
#[derive(Debug)]
pub struct MappedReadOnlyRegion {
    pub region: ReadOnlyRegion,
    pub mapping: WritableMapping,
}

/// Region with a single expected writer.
///
/// Creation hands out the only writable capability; the type does not stop
/// a caller from creating aliasing `Unsafe` regions over the same backing,
/// which is exactly the hazard [`Mode::Unsafe`] exists to name.
#[derive(Debug)]
pub struct WritableRegion {
    platform: PlatformRegion,
}

impl WritableRegion {
    /// Allocate a fresh writable region of `size` bytes. May block in the
    /// kernel.
    pub fn create(size: u64) -> Result<Self> {
        Ok(Self {
            platform: PlatformRegion::create(size, Mode::Writable)?,
        })
    }

    pub(crate) fn from_platform(platform: PlatformRegion) -> Result<Self> {
        if platform.mode() != Mode::Writable {
            return Err(KraitError::ModeMismatch {
                expected: Mode::Writable,
                actual: platform.mode(),
            });
        }
        Ok(Self { platform })
    }

    /// Map the whole region. May block in the kernel.
    pub fn map(&self) -> Result<WritableMapping> {
        self.map_at(0, self.platform.size())
    }

    /// Map `len` bytes at `offset`. May block in the kernel.
    pub fn map_at(&self, offset: u64, len: u64) -> Result<WritableMapping> {
        Ok(WritableMapping::new(self.platform.map_at(offset, len, true)?))
    }

    /// Same-mode duplicate, for handing a second reference to another process
    pub fn duplicate(&self) -> Result<Self> {
        Ok(Self {
            platform: self.platform.duplicate()?,
        })
    }

    /// Demote to read-only, consuming the writable capability.
    ///
    /// Existing writable mappings and duplicates keep their access; the
    /// returned region and everything derived from it is read-only.
    pub fn convert_to_read_only(self) -> Result<ReadOnlyRegion> {
        ReadOnlyRegion::from_platform(self.platform.convert_to_read_only()?)
    }

    /// Relabel as `Unsafe`, giving up the single-writer expectation
    pub fn convert_to_unsafe(self) -> Result<UnsafeRegion> {
        UnsafeRegion::from_platform(self.platform.convert_to_unsafe()?)
    }

    /// Consume the region into its transferable representation
    pub fn into_wire_handle(self) -> WireHandle {
        self.platform.into_wire()
    }

    /// Reconstruct from a received handle, failing on any mode mismatch
    pub fn from_wire_handle(wire: WireHandle) -> Result<Self> {
        Ok(Self {
            platform: PlatformRegion::from_wire(wire, Mode::Writable)?,
        })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.platform.size()
    }

    #[inline]
    pub fn id(&self) -> RegionId {
        self.platform.id()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.platform.mode()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.platform.is_valid()
    }
}

/// Writable region with no uniqueness guarantee.
///
/// Every duplicate can map and write concurrently; producer/consumer
/// protocols that permit multiple writers use this variant and bring their
/// own synchronization.
#[derive(Debug)]
pub struct UnsafeRegion {
    platform: PlatformRegion,
}

impl UnsafeRegion {
    /// Allocate a fresh unsafe-writable region of `size` bytes. May block
    /// in the kernel.
    pub fn create(size: u64) -> Result<Self> {
        Ok(Self {
            platform: PlatformRegion::create(size, Mode::Unsafe)?,
        })
    }

    pub(crate) fn from_platform(platform: PlatformRegion) -> Result<Self> {
        if platform.mode() != Mode::Unsafe {
            return Err(KraitError::ModeMismatch {
                expected: Mode::Unsafe,
                actual: platform.mode(),
            });
        }
        Ok(Self { platform })
    }

    /// Map the whole region. May block in the kernel.
    pub fn map(&self) -> Result<WritableMapping> {
        self.map_at(0, self.platform.size())
    }

    /// Map `len` bytes at `offset`. May block in the kernel.
    pub fn map_at(&self, offset: u64, len: u64) -> Result<WritableMapping> {
        Ok(WritableMapping::new(self.platform.map_at(offset, len, true)?))
    }

    /// Same-mode duplicate, for handing a second reference to another process
    pub fn duplicate(&self) -> Result<Self> {
        Ok(Self {
            platform: self.platform.duplicate()?,
        })
    }

    /// Consume the region into its transferable representation
    pub fn into_wire_handle(self) -> WireHandle {
        self.platform.into_wire()
    }

    /// Reconstruct from a received handle, failing on any mode mismatch
    pub fn from_wire_handle(wire: WireHandle) -> Result<Self> {
        Ok(Self {
            platform: PlatformRegion::from_wire(wire, Mode::Unsafe)?,
        })
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.platform.size()
    }

    #[inline]
    pub fn id(&self) -> RegionId {
        self.platform.id()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.platform.mode()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.platform.is_valid()
    }
}
