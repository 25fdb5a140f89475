// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-glyph cache entries and their packed keys.

use skrifa::GlyphId;

use crate::outline::Outline;

/// Number of sub-pixel position buckets per axis.
pub const SUBPIXEL_BUCKETS: u8 = 4;

const GLYPH_MASK: u32 = 0xFFFF;
const SUB_X_SHIFT: u32 = 16;
const SUB_Y_SHIFT: u32 = 18;
const SUB_MASK: u32 = 0b11;
const PACKED_BITS: u32 = 20;

/// A glyph index combined with its quantized sub-pixel position.
///
/// Layout: glyph index in bits 0..16, x bucket in bits 16..18, y bucket in
/// bits 18..20. Quarter-pixel granularity per axis; positions are rounded to
/// the nearest bucket, wrapping 1.0 back to zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackedGlyphId(u32);

impl PackedGlyphId {
    /// Packs a glyph index with explicit sub-pixel buckets.
    ///
    /// Buckets are taken modulo [`SUBPIXEL_BUCKETS`]. Glyph indices above
    /// `u16::MAX` do not occur in any sfnt font and are debug-asserted.
    pub fn pack(glyph: GlyphId, sub_x: u8, sub_y: u8) -> Self {
        let id = glyph.to_u32();
        debug_assert!(id <= GLYPH_MASK, "glyph index {id} exceeds 16 bits");
        let sub_x = u32::from(sub_x) & SUB_MASK;
        let sub_y = u32::from(sub_y) & SUB_MASK;
        Self((id & GLYPH_MASK) | (sub_x << SUB_X_SHIFT) | (sub_y << SUB_Y_SHIFT))
    }

    /// Packs a glyph index at the whole-pixel position.
    pub fn from_glyph(glyph: GlyphId) -> Self {
        Self::pack(glyph, 0, 0)
    }

    /// Packs a glyph index with buckets quantized from a device position.
    ///
    /// Only the fractional parts of `x` and `y` matter.
    pub fn quantize(glyph: GlyphId, x: f32, y: f32) -> Self {
        Self::pack(glyph, Self::bucket(x), Self::bucket(y))
    }

    fn bucket(pos: f32) -> u8 {
        let frac = pos - pos.floor();
        // Round to the nearest quarter; 1.0 wraps to bucket zero.
        (frac * f32::from(SUBPIXEL_BUCKETS) + 0.5) as u8 % SUBPIXEL_BUCKETS
    }

    /// The glyph index.
    pub fn glyph_id(self) -> GlyphId {
        GlyphId::new(self.0 & GLYPH_MASK)
    }

    /// The x sub-pixel bucket, in `0..SUBPIXEL_BUCKETS`.
    pub fn sub_x(self) -> u8 {
        ((self.0 >> SUB_X_SHIFT) & SUB_MASK) as u8
    }

    /// The y sub-pixel bucket, in `0..SUBPIXEL_BUCKETS`.
    pub fn sub_y(self) -> u8 {
        ((self.0 >> SUB_Y_SHIFT) & SUB_MASK) as u8
    }

    /// Raw packed representation.
    pub fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds a packed id from its raw representation.
    ///
    /// Returns `None` if bits outside the packed layout are set.
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits >> PACKED_BITS == 0).then_some(Self(bits))
    }
}

/// Pixel layout of a cached glyph image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaskFormat {
    /// One bit per pixel, row padded to a byte.
    Bw = 0,
    /// Eight-bit alpha only.
    Alpha8 = 1,
    /// Sixteen-bit RGB.
    Rgb565 = 2,
    /// Thirty-two-bit ARGB.
    Argb32 = 3,
}

impl MaskFormat {
    /// Bytes per image row for the given pixel width.
    pub fn row_bytes(self, width: u16) -> usize {
        let width = usize::from(width);
        match self {
            Self::Bw => width.div_ceil(8),
            Self::Alpha8 => width,
            Self::Rgb565 => width * 2,
            Self::Argb32 => width * 4,
        }
    }

    /// Wire discriminant.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Bw),
            1 => Some(Self::Alpha8),
            2 => Some(Self::Rgb565),
            3 => Some(Self::Argb32),
            _ => None,
        }
    }
}

/// Computed metrics for one packed glyph.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphMetrics {
    /// Horizontal advance in pixels.
    pub advance_x: f32,
    /// Vertical advance in pixels.
    pub advance_y: f32,
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
    /// Left bearing of the image relative to the glyph origin.
    pub left: i16,
    /// Top bearing of the image relative to the glyph origin.
    pub top: i16,
    /// Pixel layout of the image.
    pub format: MaskFormat,
}

impl GlyphMetrics {
    /// The degraded "nothing to draw" metrics used when a scaler fails or
    /// data was never delivered.
    pub fn empty() -> Self {
        Self {
            advance_x: 0.0,
            advance_y: 0.0,
            width: 0,
            height: 0,
            left: 0,
            top: 0,
            format: MaskFormat::Alpha8,
        }
    }

    /// True if the glyph has no pixels to draw.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size in bytes of a full image for these metrics.
    pub fn image_size(&self) -> usize {
        self.format.row_bytes(self.width) * usize::from(self.height)
    }
}

#[derive(Debug)]
enum ImageSlot {
    Uncomputed,
    Missing,
    Bitmap(Box<[u8]>),
}

#[derive(Debug)]
enum PathSlot {
    Uncomputed,
    Missing,
    Outline(Outline),
}

/// One cached result within a strike.
///
/// A glyph starts with nothing computed. Metrics, image and path fill in
/// lazily and independently; each records "computed but absent" distinctly
/// from "not yet computed" so the scaler is consulted at most once per kind.
#[derive(Debug)]
pub struct Glyph {
    metrics: Option<GlyphMetrics>,
    image: ImageSlot,
    path: PathSlot,
}

impl Glyph {
    pub(crate) fn new() -> Self {
        Self {
            metrics: None,
            image: ImageSlot::Uncomputed,
            path: PathSlot::Uncomputed,
        }
    }

    /// Metrics, if computed.
    pub fn metrics(&self) -> Option<&GlyphMetrics> {
        self.metrics.as_ref()
    }

    /// Image pixels, if computed and present.
    pub fn image(&self) -> Option<&[u8]> {
        match &self.image {
            ImageSlot::Bitmap(data) => Some(data),
            _ => None,
        }
    }

    /// Outline, if computed and present.
    pub fn path(&self) -> Option<&Outline> {
        match &self.path {
            PathSlot::Outline(outline) => Some(outline),
            _ => None,
        }
    }

    /// True once an image compute (or merge) has happened, even if it
    /// produced nothing.
    pub fn image_computed(&self) -> bool {
        !matches!(self.image, ImageSlot::Uncomputed)
    }

    /// True once a path compute (or merge) has happened, even if the glyph
    /// has no outline.
    pub fn path_computed(&self) -> bool {
        !matches!(self.path, PathSlot::Uncomputed)
    }

    /// Byte cost of the cached image and path data, excluding fixed
    /// per-entry overhead.
    pub fn data_cost(&self) -> usize {
        let image = match &self.image {
            ImageSlot::Bitmap(data) => data.len(),
            _ => 0,
        };
        let path = match &self.path {
            PathSlot::Outline(outline) => outline.byte_cost(),
            _ => 0,
        };
        image + path
    }

    /// Records metrics if none are present yet. Returns the metrics now in
    /// effect.
    pub(crate) fn init_metrics(&mut self, metrics: GlyphMetrics) -> GlyphMetrics {
        *self.metrics.get_or_insert(metrics)
    }

    /// Records the image compute result. First write wins; later writes are
    /// ignored. Returns the byte cost added.
    pub(crate) fn init_image(&mut self, image: Option<Box<[u8]>>) -> usize {
        if self.image_computed() {
            return 0;
        }
        match image {
            Some(data) => {
                let cost = data.len();
                self.image = ImageSlot::Bitmap(data);
                cost
            }
            None => {
                self.image = ImageSlot::Missing;
                0
            }
        }
    }

    /// Records the path compute result. First write wins; later writes are
    /// ignored. Returns the byte cost added.
    pub(crate) fn init_path(&mut self, path: Option<Outline>) -> usize {
        if self.path_computed() {
            return 0;
        }
        match path {
            Some(outline) => {
                let cost = outline.byte_cost();
                self.path = PathSlot::Outline(outline);
                cost
            }
            None => {
                self.path = PathSlot::Missing;
                0
            }
        }
    }
}
