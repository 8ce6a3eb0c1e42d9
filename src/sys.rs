//! POSIX capability layer backing regions and mappings
//!
//! Everything that touches the OS lives here: anonymous backing allocations
//! (memfd), handle duplication, page-granular mapping, and the probes used
//! to validate received handles. Linux-only, like `memfd_create` itself.

use rustix::fd::{AsRawFd, BorrowedFd, OwnedFd};
use rustix::fs::{
    fcntl_add_seals, fcntl_getfl, fstat, ftruncate, memfd_create, open, MemfdFlags, Mode, OFlags,
    SealFlags,
};
use rustix::io::Result;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::rand::{getrandom, GetRandomFlags};
use std::ptr::NonNull;

/// Debug name shown in /proc/<pid>/fd for region allocations
const MEMFD_NAME: &str = "krait-region";

/// What the OS reports a handle to be capable of.
///
/// POSIX cannot distinguish a writable-unique handle from a writable-aliased
/// one, so this is coarser than [`Mode`](crate::Mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandleAccess {
    ReadOnly,
    ReadWrite,
}

/// A freshly mapped span of a backing object.
///
/// `base` is the page-aligned mapping base, `delta` the distance from it to
/// the byte the caller actually asked for, and `mapped_size` the page-rounded
/// span that must eventually be unmapped.
pub(crate) struct MapView {
    pub base: NonNull<u8>,
    pub delta: usize,
    pub mapped_size: usize,
}

/// Allocate an anonymous backing object of exactly `size` bytes.
///
/// The allocation is sealed against growing and shrinking so the size
/// declared at creation stays true for every later holder of the handle.
/// May block in the kernel.
pub(crate) fn allocate(size: u64) -> Result<OwnedFd> {
    let fd = memfd_create(MEMFD_NAME, MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING)?;
    ftruncate(&fd, size)?;
    fcntl_add_seals(&fd, SealFlags::GROW | SealFlags::SHRINK)?;
    Ok(fd)
}

/// Duplicate a handle. May block in the kernel.
pub(crate) fn duplicate(fd: BorrowedFd<'_>) -> Result<OwnedFd> {
    rustix::io::fcntl_dupfd_cloexec(fd, 0)
}

/// Reopen a handle read-only, referring to the same backing object.
pub(crate) fn reopen_read_only(fd: BorrowedFd<'_>) -> Result<OwnedFd> {
    let path = format!("/proc/self/fd/{}", fd.as_raw_fd());
    open(path, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())
}

/// Map `len` bytes of `fd` starting at `offset` into the address space.
///
/// `offset` is aligned down to a page boundary internally; see [`MapView`]
/// for how the remainder is reported. May block in the kernel.
pub(crate) fn map(fd: BorrowedFd<'_>, offset: u64, len: usize, writable: bool) -> Result<MapView> {
    let page = page_size() as u64;
    let aligned = offset & !(page - 1);
    let delta = (offset - aligned) as usize;
    let want = delta + len;

    let prot = if writable {
        ProtFlags::READ | ProtFlags::WRITE
    } else {
        ProtFlags::READ
    };

    let addr = unsafe { mmap(std::ptr::null_mut(), want, prot, MapFlags::SHARED, fd, aligned)? };
    let base = NonNull::new(addr.cast::<u8>()).expect("mmap returned null");

    Ok(MapView {
        base,
        delta,
        mapped_size: round_up_to_page(want),
    })
}

/// Unmap a span previously returned by [`map`]. May block in the kernel.
///
/// # Safety
/// `base` must be the base of a live mapping of exactly `mapped_size` bytes,
/// and no references into the span may outlive this call.
pub(crate) unsafe fn unmap(base: NonNull<u8>, mapped_size: usize) -> Result<()> {
    unsafe { munmap(base.as_ptr().cast(), mapped_size) }
}

/// Probe the OS-level access mode of a handle
pub(crate) fn handle_access(fd: BorrowedFd<'_>) -> Result<HandleAccess> {
    let flags = fcntl_getfl(fd)?;
    if flags.contains(OFlags::RDWR) || flags.contains(OFlags::WRONLY) {
        Ok(HandleAccess::ReadWrite)
    } else {
        Ok(HandleAccess::ReadOnly)
    }
}

/// Size of the backing object behind a handle
pub(crate) fn backing_size(fd: BorrowedFd<'_>) -> Result<u64> {
    let stat = fstat(fd)?;
    Ok(stat.st_size as u64)
}

/// Whether the handle still refers to an open descriptor
pub(crate) fn is_live(fd: BorrowedFd<'_>) -> bool {
    rustix::io::fcntl_getfd(fd).is_ok()
}

/// 128 bits of kernel entropy for region identifiers
pub(crate) fn random_id() -> Result<[u8; 16]> {
    let mut bytes = [0u8; 16];
    let mut filled = 0;
    while filled < bytes.len() {
        filled += getrandom(&mut bytes[filled..], GetRandomFlags::empty())?;
    }
    Ok(bytes)
}

#[inline]
pub(crate) fn page_size() -> usize {
    rustix::param::page_size()
}

pub(crate) fn round_up_to_page(len: usize) -> usize {
    let page = page_size();
    (len + page - 1) & !(page - 1)
}
