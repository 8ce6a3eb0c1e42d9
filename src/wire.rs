//! Serialization boundary for cross-process transfer
//!
//! A region travels as two pieces: the OS descriptor itself, sent
//! out-of-band (e.g. as an `SCM_RIGHTS` ancillary message), and
//! [`WireMetadata`] describing what the receiver should expect of it. This
//! module defines the shape only; transports are the caller's business.
//! Reconstruction re-validates the pieces against each other in
//! [`PlatformRegion::from_wire`](crate::PlatformRegion::from_wire).

use crate::platform::{Mode, RegionId};
use rustix::fd::OwnedFd;
use serde::{Deserialize, Serialize};

/// Transport-facing description of a transferred region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMetadata {
    /// Declared region size in bytes
    pub size: u64,
    /// Declared capability mode; checked against the receiver's expectation
    /// and against the descriptor itself
    pub mode: Mode,
    /// Stable identifier; nil is rejected on receipt
    pub id: RegionId,
}

/// A transferable region handle: descriptor plus declared metadata.
///
/// Produced by consuming a region (`into_wire_handle`); the source region
/// is gone afterwards, transfer being a move of the local ownership.
#[derive(Debug)]
pub struct WireHandle {
    fd: OwnedFd,
    meta: WireMetadata,
}

impl WireHandle {
    /// Reassemble a handle from a received descriptor and its metadata
    pub fn from_parts(fd: OwnedFd, meta: WireMetadata) -> Self {
        Self { fd, meta }
    }

    /// Split into descriptor and metadata, one per transport channel
    pub fn into_parts(self) -> (OwnedFd, WireMetadata) {
        (self.fd, self.meta)
    }

    #[inline]
    pub fn metadata(&self) -> WireMetadata {
        self.meta
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.meta.mode
    }

    #[inline]
    pub fn id(&self) -> RegionId {
        self.meta.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KraitError;
    use crate::platform::PlatformRegion;

    fn fresh_wire(mode: Mode) -> WireHandle {
        PlatformRegion::create(4096, mode).unwrap().into_wire()
    }

    #[test]
    fn round_trip_preserves_identity() {
        let region = PlatformRegion::create(4096, Mode::Writable).unwrap();
        let (size, mode, id) = (region.size(), region.mode(), region.id());

        let wire = region.into_wire();
        assert_eq!(wire.size(), size);
        assert_eq!(wire.mode(), mode);
        assert_eq!(wire.id(), id);

        let back = PlatformRegion::from_wire(wire, Mode::Writable).unwrap();
        assert_eq!(back.size(), size);
        assert_eq!(back.mode(), mode);
        assert_eq!(back.id(), id);
        assert!(back.is_valid());
    }

    #[test]
    fn mode_expectation_is_enforced_for_every_pair() {
        // read-only wires come from conversion, the others from creation
        let make = |mode: Mode| -> WireHandle {
            match mode {
                Mode::ReadOnly => PlatformRegion::create(4096, Mode::Writable)
                    .unwrap()
                    .convert_to_read_only()
                    .unwrap()
                    .into_wire(),
                _ => fresh_wire(mode),
            }
        };

        let modes = [Mode::ReadOnly, Mode::Writable, Mode::Unsafe];
        for declared in modes {
            for expected in modes {
                let result = PlatformRegion::from_wire(make(declared), expected);
                if declared == expected {
                    assert!(result.is_ok(), "{declared:?} should reconstruct as itself");
                } else {
                    assert!(
                        matches!(result, Err(KraitError::ModeMismatch { .. })),
                        "{declared:?} must not reconstruct as {expected:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn tampered_mode_declaration_is_caught() {
        // a writable descriptor relabeled ReadOnly passes the expectation
        // check but not the handle correspondence check
        let (fd, meta) = fresh_wire(Mode::Writable).into_parts();
        let forged = WireHandle::from_parts(
            fd,
            WireMetadata {
                mode: Mode::ReadOnly,
                ..meta
            },
        );
        assert!(matches!(
            PlatformRegion::from_wire(forged, Mode::ReadOnly),
            Err(KraitError::ModeMismatch { .. })
        ));
    }

    #[test]
    fn tampered_read_only_handle_is_caught() {
        let region = PlatformRegion::create(4096, Mode::Writable)
            .unwrap()
            .convert_to_read_only()
            .unwrap();
        let (fd, meta) = region.into_wire().into_parts();
        let forged = WireHandle::from_parts(
            fd,
            WireMetadata {
                mode: Mode::Writable,
                ..meta
            },
        );
        assert!(matches!(
            PlatformRegion::from_wire(forged, Mode::Writable),
            Err(KraitError::ModeMismatch { .. })
        ));
    }

    #[test]
    fn zero_size_wire_is_rejected() {
        let (fd, meta) = fresh_wire(Mode::Writable).into_parts();
        let zero = WireHandle::from_parts(fd, WireMetadata { size: 0, ..meta });
        assert!(matches!(
            PlatformRegion::from_wire(zero, Mode::Writable),
            Err(KraitError::InvalidHandle)
        ));
    }

    #[test]
    fn nil_id_wire_is_rejected() {
        let (fd, meta) = fresh_wire(Mode::Unsafe).into_parts();
        let nil = WireHandle::from_parts(
            fd,
            WireMetadata {
                id: RegionId::NIL,
                ..meta
            },
        );
        assert!(matches!(
            PlatformRegion::from_wire(nil, Mode::Unsafe),
            Err(KraitError::InvalidHandle)
        ));
    }

    #[test]
    fn oversized_declaration_is_rejected() {
        let (fd, meta) = fresh_wire(Mode::Writable).into_parts();
        let forged = WireHandle::from_parts(
            fd,
            WireMetadata {
                size: meta.size * 2,
                ..meta
            },
        );
        assert!(matches!(
            PlatformRegion::from_wire(forged, Mode::Writable),
            Err(KraitError::InvalidHandle)
        ));
    }

    #[test]
    fn metadata_serde_round_trip() {
        let meta = fresh_wire(Mode::Unsafe).metadata();
        let json = serde_json::to_string(&meta).unwrap();
        let back: WireMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
