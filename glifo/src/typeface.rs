// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typeface identity and the contract strikes scale against.

use crate::descriptor::StrikeDescriptor;
use crate::scaler::ScalerContext;

/// Identity of a typeface, stable across the process boundary.
///
/// Ids are assigned by the embedder; zero is reserved and rejected on the
/// wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypefaceId(u32);

impl TypefaceId {
    /// Wraps a raw id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw id.
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

/// Visual slant of a typeface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Slant {
    /// No slant.
    #[default]
    Upright = 0,
    /// Italic design.
    Italic = 1,
    /// Mechanically slanted.
    Oblique = 2,
}

impl Slant {
    /// Wire discriminant.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Upright),
            1 => Some(Self::Italic),
            2 => Some(Self::Oblique),
            _ => None,
        }
    }
}

/// Style attributes of a typeface: weight, width and slant.
///
/// Weight uses the usual 1..=1000 scale with 400 as normal; width is a
/// percentage of normal with 100 as normal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TypefaceStyle {
    /// Visual weight, 400 is normal and 700 is bold.
    pub weight: f32,
    /// Visual width as a percentage, 100 is normal.
    pub width: f32,
    /// Visual slant.
    pub slant: Slant,
}

impl TypefaceStyle {
    /// Normal weight, width and slant.
    pub const NORMAL: Self = Self {
        weight: 400.0,
        width: 100.0,
        slant: Slant::Upright,
    };

    /// Bold weight at normal width and slant.
    pub const BOLD: Self = Self {
        weight: 700.0,
        width: 100.0,
        slant: Slant::Upright,
    };
}

impl Default for TypefaceStyle {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// A font face the cache can scale glyphs from.
///
/// The server side implements this over a real font engine. The client side
/// sees only [`TypefaceProxy`](crate::remote::TypefaceProxy) instances,
/// which answer the identity queries from wire data and produce pass-through
/// scalers.
pub trait Typeface: Send + Sync {
    /// Identity of this typeface.
    fn id(&self) -> TypefaceId;

    /// Style attributes.
    fn style(&self) -> TypefaceStyle;

    /// True for monospaced designs.
    fn is_fixed_pitch(&self) -> bool;

    /// Number of glyphs in the face.
    fn glyph_count(&self) -> u32;

    /// Builds a scaler context for the given configuration.
    fn create_scaler(&self, descriptor: &StrikeDescriptor) -> Box<dyn ScalerContext>;
}
