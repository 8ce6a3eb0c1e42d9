//! Platform region: the owned OS resource beneath every region variant

use crate::error::{KraitError, Result};
use crate::mapping::RawMapping;
use crate::sys::{self, HandleAccess};
use crate::wire::{WireHandle, WireMetadata};
use rustix::fd::{AsFd, OwnedFd};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability class of a region, fixed at creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Mappings are read-only; the handle cannot be upgraded to writable
    ReadOnly,
    /// Writable, with the expectation of a single writing owner
    Writable,
    /// Writable with no uniqueness guarantee; aliasing is the caller's protocol
    Unsafe,
}

/// Stable correlation key shared by all duplicates and transfers of a region.
///
/// Identifier equality means "same backing memory". Handle equality is
/// meaningless across processes and is never used for comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId([u8; 16]);

impl RegionId {
    #[cfg(test)]
    pub(crate) const NIL: RegionId = RegionId([0; 16]);

    /// Draw a fresh identifier from kernel entropy. Never nil.
    pub(crate) fn generate() -> rustix::io::Result<Self> {
        loop {
            let bytes = sys::random_id()?;
            if bytes != [0; 16] {
                return Ok(Self(bytes));
            }
        }
    }

    /// All-zero identifiers never name a real allocation
    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({self})")
    }
}

/// The foundational owned resource: one OS handle plus its declared
/// capability mode, byte size, and identifier.
///
/// Move-only. Dropping the region releases the handle; mappings created
/// from it stay valid through their own hold on the mapped pages.
#[derive(Debug)]
pub struct PlatformRegion {
    fd: OwnedFd,
    size: u64,
    mode: Mode,
    id: RegionId,
}

impl PlatformRegion {
    /// Allocate a fresh region of `size` bytes in `mode`.
    ///
    /// `Mode::ReadOnly` is rejected here: a region nobody could ever write
    /// would be useless, so read-only regions only arise by converting a
    /// writable region or by reconstructing a transferred read-only handle.
    /// May block in the kernel.
    pub fn create(size: u64, mode: Mode) -> Result<Self> {
        if size == 0 {
            return Err(KraitError::ZeroSize);
        }
        if mode == Mode::ReadOnly {
            return Err(KraitError::UnsupportedMode(mode));
        }

        let id = RegionId::generate().map_err(|e| KraitError::AllocationFailed {
            size,
            source: e.into(),
        })?;
        let fd = sys::allocate(size).map_err(|e| KraitError::AllocationFailed {
            size,
            source: e.into(),
        })?;

        Ok(Self { fd, size, mode, id })
    }

    /// Duplicate the handle.
    ///
    /// The duplicate shares identifier, mode, and size and refers to the
    /// same backing memory; both copies are released independently. May
    /// block in the kernel.
    pub fn duplicate(&self) -> Result<Self> {
        let fd = sys::duplicate(self.fd.as_fd())
            .map_err(|e| KraitError::DuplicationFailed(e.into()))?;
        Ok(Self {
            fd,
            size: self.size,
            mode: self.mode,
            id: self.id,
        })
    }

    /// Reconstruct a region from a received wire handle.
    ///
    /// This is the mode-safety gate. The declared mode must equal
    /// `expected_mode`, and the handle itself must corroborate the
    /// declaration: a read-only descriptor for `ReadOnly`, a writable one
    /// otherwise, with a backing allocation at least as large as declared.
    /// Every mismatch fails construction; there is no fallback path.
    pub fn from_wire(wire: WireHandle, expected_mode: Mode) -> Result<Self> {
        let (fd, meta) = wire.into_parts();

        if meta.mode != expected_mode {
            return Err(KraitError::ModeMismatch {
                expected: expected_mode,
                actual: meta.mode,
            });
        }
        if meta.id.is_nil() || meta.size == 0 {
            return Err(KraitError::InvalidHandle);
        }
        if !sys::is_live(fd.as_fd()) {
            return Err(KraitError::InvalidHandle);
        }

        let access = sys::handle_access(fd.as_fd()).map_err(|_| KraitError::InvalidHandle)?;
        let corresponds = match meta.mode {
            Mode::ReadOnly => access == HandleAccess::ReadOnly,
            Mode::Writable | Mode::Unsafe => access == HandleAccess::ReadWrite,
        };
        if !corresponds {
            let actual = match access {
                HandleAccess::ReadOnly => Mode::ReadOnly,
                HandleAccess::ReadWrite => Mode::Writable,
            };
            return Err(KraitError::ModeMismatch {
                expected: expected_mode,
                actual,
            });
        }

        match sys::backing_size(fd.as_fd()) {
            Ok(actual) if actual >= meta.size => {}
            _ => return Err(KraitError::InvalidHandle),
        }

        Ok(Self {
            fd,
            size: meta.size,
            mode: meta.mode,
            id: meta.id,
        })
    }

    /// Consume the region into its transferable representation
    pub fn into_wire(self) -> WireHandle {
        let meta = WireMetadata {
            size: self.size,
            mode: self.mode,
            id: self.id,
        };
        WireHandle::from_parts(self.fd, meta)
    }

    /// Swap the writable handle for a read-only reopen of the same backing.
    ///
    /// Only `Writable` regions convert; identifier and size carry over.
    /// Writable duplicates handed out earlier keep their access, which is
    /// exactly the hazard `Mode::Unsafe` exists to name.
    pub fn convert_to_read_only(self) -> Result<Self> {
        if self.mode != Mode::Writable {
            return Err(KraitError::ModeMismatch {
                expected: Mode::Writable,
                actual: self.mode,
            });
        }
        let fd = sys::reopen_read_only(self.fd.as_fd())
            .map_err(|e| KraitError::DuplicationFailed(e.into()))?;
        Ok(Self {
            fd,
            size: self.size,
            mode: Mode::ReadOnly,
            id: self.id,
        })
    }

    /// Relabel a `Writable` region as `Unsafe`.
    ///
    /// The handle is unchanged; only the declared capability moves to the
    /// aliasing-permitted class.
    pub fn convert_to_unsafe(self) -> Result<Self> {
        if self.mode != Mode::Writable {
            return Err(KraitError::ModeMismatch {
                expected: Mode::Writable,
                actual: self.mode,
            });
        }
        Ok(Self {
            mode: Mode::Unsafe,
            ..self
        })
    }

    /// Map `len` bytes at `offset` into the address space.
    ///
    /// Bounds are checked here against the declared size, never left to the
    /// OS. The typed wrappers in [`region`](crate::region) decide what access
    /// the resulting view exposes. May block in the kernel.
    pub(crate) fn map_at(&self, offset: u64, len: u64, writable: bool) -> Result<RawMapping> {
        if len == 0 {
            return Err(KraitError::ZeroSize);
        }
        let out_of_bounds = KraitError::RangeOutOfBounds {
            offset,
            len,
            size: self.size,
        };
        match offset.checked_add(len) {
            Some(end) if end <= self.size => {}
            _ => return Err(out_of_bounds),
        }

        let view = sys::map(self.fd.as_fd(), offset, len as usize, writable)
            .map_err(|e| KraitError::MapFailed(e.into()))?;
        Ok(RawMapping::new(view, len as usize, self.id))
    }

    /// Diagnostic re-probe of the handle: live descriptor and non-zero size.
    ///
    /// A constructed region is valid by construction; this exists for
    /// callers that want to re-check the OS handle later.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.size > 0 && sys::is_live(self.fd.as_fd())
    }

    /// Declared size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Capability mode, immutable for the lifetime of this object
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Stable identifier, shared with every duplicate and transfer
    #[inline]
    pub fn id(&self) -> RegionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sets_size_mode_and_validity() {
        let region = PlatformRegion::create(4096, Mode::Writable).unwrap();
        assert!(region.is_valid());
        assert_eq!(region.size(), 4096);
        assert_eq!(region.mode(), Mode::Writable);
        assert!(!region.id().is_nil());
    }

    #[test]
    fn create_zero_size_fails() {
        for mode in [Mode::ReadOnly, Mode::Writable, Mode::Unsafe] {
            assert!(matches!(
                PlatformRegion::create(0, mode),
                Err(KraitError::ZeroSize)
            ));
        }
    }

    #[test]
    fn create_read_only_directly_fails() {
        assert!(matches!(
            PlatformRegion::create(4096, Mode::ReadOnly),
            Err(KraitError::UnsupportedMode(Mode::ReadOnly))
        ));
    }

    #[test]
    fn duplicate_shares_identity_and_mode() {
        let region = PlatformRegion::create(8192, Mode::Unsafe).unwrap();
        let dup = region.duplicate().unwrap();
        assert_eq!(dup.id(), region.id());
        assert_eq!(dup.mode(), region.mode());
        assert_eq!(dup.size(), region.size());
        assert!(region.is_valid());
        assert!(dup.is_valid());
        drop(region);
        assert!(dup.is_valid());
    }

    #[test]
    fn map_bounds_are_checked_before_the_os() {
        let region = PlatformRegion::create(4096, Mode::Writable).unwrap();
        assert!(matches!(
            region.map_at(1, 4096, true),
            Err(KraitError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            region.map_at(4096, 1, true),
            Err(KraitError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            region.map_at(0, 0, true),
            Err(KraitError::ZeroSize)
        ));
        assert!(region.map_at(0, 4096, true).is_ok());
        assert!(region.map_at(4095, 1, true).is_ok());
    }

    #[test]
    fn map_offset_overflow_is_out_of_bounds() {
        let region = PlatformRegion::create(4096, Mode::Writable).unwrap();
        assert!(matches!(
            region.map_at(u64::MAX, 2, true),
            Err(KraitError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn convert_to_read_only_keeps_identity() {
        let region = PlatformRegion::create(4096, Mode::Writable).unwrap();
        let id = region.id();
        let ro = region.convert_to_read_only().unwrap();
        assert_eq!(ro.mode(), Mode::ReadOnly);
        assert_eq!(ro.id(), id);
        assert_eq!(ro.size(), 4096);
        assert!(ro.is_valid());
    }

    #[test]
    fn only_writable_regions_convert() {
        let region = PlatformRegion::create(4096, Mode::Unsafe).unwrap();
        assert!(matches!(
            region.convert_to_read_only(),
            Err(KraitError::ModeMismatch { .. })
        ));
        let region = PlatformRegion::create(4096, Mode::Unsafe).unwrap();
        assert!(matches!(
            region.convert_to_unsafe(),
            Err(KraitError::ModeMismatch { .. })
        ));
    }

    #[test]
    fn region_id_formats_as_hex() {
        let id = RegionId::generate().unwrap();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
