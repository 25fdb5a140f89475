// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scaler configuration descriptors.
//!
//! A [`StrikeDescriptor`] is the cache key for one rendering configuration:
//! typeface, size, transform, flags and effects. Equality and hashing are
//! defined over the canonical byte encoding, so two descriptors are the same
//! strike if and only if their bytes are identical.

use core::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::typeface::TypefaceId;

/// Encoded size of a [`StrikeRec`] in bytes.
const REC_SIZE: usize = 44;

/// Inline capacity for descriptor byte storage.
const INLINE_CAP: usize = 48;

/// Bit set describing how glyphs are rendered.
///
/// The high bits are device-side state (gamma treatment of the target
/// surface) that peers do not see; [`StrikeDescriptor::key_descriptor`]
/// clears them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScalerFlags(u32);

impl ScalerFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Position glyphs on quarter-pixel boundaries rather than whole pixels.
    pub const SUBPIXEL_POSITIONING: Self = Self(1 << 0);
    /// Apply a synthetic bold effect while scaling.
    pub const EMBOLDEN: Self = Self(1 << 1);
    /// Prefer linearly scaled metrics over hinted ones.
    pub const LINEAR_METRICS: Self = Self(1 << 2);
    /// Device-only: rasterize against a fake gamma table.
    pub const FAKE_GAMMA: Self = Self(1 << 30);
    /// Device-only: boost contrast for the target surface.
    pub const BOOST_CONTRAST: Self = Self(1 << 31);

    /// Flags that never leave the device and are excluded from key form.
    pub const DEVICE_ONLY: Self = Self(Self::FAKE_GAMMA.0 | Self::BOOST_CONTRAST.0);

    /// Returns true if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of the two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `self` with every bit of `other` cleared.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Builds a flag set from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl core::ops::BitOr for ScalerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// The plain data underlying a descriptor.
///
/// All fields participate in the canonical encoding. The `transform` is the
/// linear part of the device transform, row-major.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrikeRec {
    /// Identity of the typeface being scaled. Nonzero.
    pub typeface_id: TypefaceId,
    /// Text size in points.
    pub text_size: f32,
    /// Horizontal scale applied before the device transform.
    pub pre_scale_x: f32,
    /// Horizontal skew applied before the device transform.
    pub pre_skew_x: f32,
    /// Linear part of the device transform: `[xx, xy, yx, yy]`.
    pub transform: [f32; 4],
    /// Rendering flags.
    pub flags: ScalerFlags,
    /// Identity of an attached path effect, zero when absent.
    pub path_effect: u32,
    /// Identity of an attached mask filter, zero when absent.
    pub mask_filter: u32,
}

impl StrikeRec {
    /// Creates a rec for the given typeface and size with an identity
    /// transform and no flags or effects.
    pub fn new(typeface_id: TypefaceId, text_size: f32) -> Self {
        Self {
            typeface_id,
            text_size,
            pre_scale_x: 1.0,
            pre_skew_x: 0.0,
            transform: [1.0, 0.0, 0.0, 1.0],
            flags: ScalerFlags::NONE,
            path_effect: 0,
            mask_filter: 0,
        }
    }

    /// Loose equality for the desperation search: same typeface, size and
    /// linear transform. Flags, effects and sub-pixel placement are ignored
    /// because any of those variants rasters the same shapes.
    pub fn loosely_matches(&self, other: &Self) -> bool {
        self.typeface_id == other.typeface_id
            && self.text_size == other.text_size
            && self.pre_scale_x == other.pre_scale_x
            && self.pre_skew_x == other.pre_skew_x
            && self.transform == other.transform
    }
}

/// An immutable, comparable-by-bytes strike cache key.
#[derive(Clone, Debug)]
pub struct StrikeDescriptor {
    rec: StrikeRec,
    bytes: SmallVec<[u8; INLINE_CAP]>,
}

impl StrikeDescriptor {
    /// Builds a descriptor by canonically encoding `rec`.
    pub fn new(rec: StrikeRec) -> Self {
        let mut bytes = SmallVec::new();
        bytes.extend_from_slice(&rec.typeface_id.to_u32().to_le_bytes());
        bytes.extend_from_slice(&rec.text_size.to_le_bytes());
        bytes.extend_from_slice(&rec.pre_scale_x.to_le_bytes());
        bytes.extend_from_slice(&rec.pre_skew_x.to_le_bytes());
        for m in rec.transform {
            bytes.extend_from_slice(&m.to_le_bytes());
        }
        bytes.extend_from_slice(&rec.flags.bits().to_le_bytes());
        bytes.extend_from_slice(&rec.path_effect.to_le_bytes());
        bytes.extend_from_slice(&rec.mask_filter.to_le_bytes());
        debug_assert_eq!(bytes.len(), REC_SIZE);
        Self { rec, bytes }
    }

    /// Decodes a descriptor from its canonical encoding.
    ///
    /// Returns `None` unless `bytes` is exactly one canonically encoded rec.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != REC_SIZE {
            return None;
        }
        let mut at = 0;
        let u32_at = |at: &mut usize| {
            let v = u32::from_le_bytes(bytes[*at..*at + 4].try_into().ok()?);
            *at += 4;
            Some(v)
        };
        let typeface_id = TypefaceId::new(u32_at(&mut at)?);
        let text_size = f32::from_bits(u32_at(&mut at)?);
        let pre_scale_x = f32::from_bits(u32_at(&mut at)?);
        let pre_skew_x = f32::from_bits(u32_at(&mut at)?);
        let mut transform = [0.0; 4];
        for m in &mut transform {
            *m = f32::from_bits(u32_at(&mut at)?);
        }
        let flags = ScalerFlags::from_bits(u32_at(&mut at)?);
        let path_effect = u32_at(&mut at)?;
        let mask_filter = u32_at(&mut at)?;
        let rec = StrikeRec {
            typeface_id,
            text_size,
            pre_scale_x,
            pre_skew_x,
            transform,
            flags,
            path_effect,
            mask_filter,
        };
        Some(Self::new(rec))
    }

    /// The decoded configuration.
    pub fn rec(&self) -> &StrikeRec {
        &self.rec
    }

    /// The canonical byte encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The peer-visible form of this descriptor, with device-only flag bits
    /// cleared. Returns a clone when nothing needs clearing.
    pub fn key_descriptor(&self) -> Self {
        if self.rec.flags.bits() & ScalerFlags::DEVICE_ONLY.bits() == 0 {
            return self.clone();
        }
        let mut rec = self.rec;
        rec.flags = rec.flags.difference(ScalerFlags::DEVICE_ONLY);
        Self::new(rec)
    }

    /// Loose comparison against another descriptor's rec. See
    /// [`StrikeRec::loosely_matches`].
    pub fn loosely_matches(&self, other: &Self) -> bool {
        self.rec.loosely_matches(&other.rec)
    }
}

impl PartialEq for StrikeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for StrikeDescriptor {}

impl Hash for StrikeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(id: u32) -> TypefaceId {
        TypefaceId::new(id)
    }

    fn rec_with_flags(flags: ScalerFlags) -> StrikeRec {
        let mut rec = StrikeRec::new(tf(7), 12.0);
        rec.flags = flags;
        rec
    }

    #[test]
    fn byte_equality_tracks_rec_identity() {
        let a = StrikeDescriptor::new(StrikeRec::new(tf(1), 10.0));
        let b = StrikeDescriptor::new(StrikeRec::new(tf(1), 10.0));
        let c = StrikeDescriptor::new(StrikeRec::new(tf(1), 11.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn flags_change_identity_but_not_loose_match() {
        let plain = StrikeDescriptor::new(rec_with_flags(ScalerFlags::NONE));
        let gamma = StrikeDescriptor::new(rec_with_flags(
            ScalerFlags::FAKE_GAMMA | ScalerFlags::BOOST_CONTRAST,
        ));
        assert_ne!(plain, gamma);
        assert!(plain.loosely_matches(&gamma));
        assert!(gamma.loosely_matches(&plain));
    }

    #[test]
    fn transform_breaks_loose_match() {
        let a = StrikeDescriptor::new(StrikeRec::new(tf(1), 10.0));
        let mut rec = StrikeRec::new(tf(1), 10.0);
        rec.transform = [2.0, 0.0, 0.0, 2.0];
        let b = StrikeDescriptor::new(rec);
        assert!(!a.loosely_matches(&b));
    }

    #[test]
    fn key_descriptor_clears_device_bits() {
        let device = StrikeDescriptor::new(rec_with_flags(
            ScalerFlags::SUBPIXEL_POSITIONING | ScalerFlags::FAKE_GAMMA,
        ));
        let key = device.key_descriptor();
        assert_ne!(device, key);
        assert_eq!(key.rec().flags, ScalerFlags::SUBPIXEL_POSITIONING);
        assert_eq!(key.key_descriptor(), key);
    }

    #[test]
    fn canonical_bytes_round_trip() {
        let mut rec = StrikeRec::new(tf(42), 16.5);
        rec.pre_skew_x = -0.25;
        rec.transform = [1.0, 0.5, 0.0, 1.0];
        rec.flags = ScalerFlags::SUBPIXEL_POSITIONING;
        rec.mask_filter = 9;
        let desc = StrikeDescriptor::new(rec);
        let back = StrikeDescriptor::from_bytes(desc.as_bytes()).unwrap();
        assert_eq!(desc, back);
        assert_eq!(back.rec(), &rec);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let desc = StrikeDescriptor::new(StrikeRec::new(tf(1), 10.0));
        let bytes = desc.as_bytes();
        assert!(StrikeDescriptor::from_bytes(&bytes[..bytes.len() - 1]).is_none());
        let mut long = bytes.to_vec();
        long.push(0);
        assert!(StrikeDescriptor::from_bytes(&long).is_none());
    }
}
