// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scaler context seam between strikes and a font engine.

use skrifa::GlyphId;

use crate::glyph::{GlyphMetrics, PackedGlyphId};
use crate::outline::Outline;

/// Font-wide metrics for one scaler configuration.
///
/// Vertical values follow the y-down convention: `ascent` is negative,
/// `descent` positive.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FontMetrics {
    /// Distance from the baseline to the typographic top, negative.
    pub ascent: f32,
    /// Distance from the baseline to the typographic bottom, positive.
    pub descent: f32,
    /// Recommended gap between lines.
    pub leading: f32,
    /// Average character advance.
    pub avg_char_width: f32,
    /// Height of a lowercase x.
    pub x_height: f32,
    /// Height of an uppercase cap.
    pub cap_height: f32,
}

/// Produces metrics, images and outlines for one scaler configuration.
///
/// A strike owns exactly one of these and consults it at most once per glyph
/// per kind of data. Implementations must be deterministic for a given
/// configuration and glyph: the desperation search substitutes data between
/// loosely matching strikes, which is only visually sound when equal inputs
/// produce equal pixels.
///
/// Failures never surface as errors. A backend that cannot produce data for
/// a glyph returns empty metrics, no image or no path, and the strike caches
/// that emptiness.
pub trait ScalerContext: Send {
    /// Font-wide metrics for this configuration.
    fn font_metrics(&mut self) -> FontMetrics;

    /// Metrics for one packed glyph.
    fn glyph_metrics(&mut self, glyph: PackedGlyphId) -> GlyphMetrics;

    /// Rasterizes one packed glyph into a buffer of exactly
    /// `metrics.image_size()` bytes, or `None` if no image can be produced.
    fn glyph_image(&mut self, glyph: PackedGlyphId, metrics: &GlyphMetrics) -> Option<Box<[u8]>>;

    /// The glyph outline, or `None` for glyphs with no visible outline.
    ///
    /// Outlines are independent of sub-pixel position, so the key is the
    /// bare glyph index.
    fn glyph_path(&mut self, glyph: GlyphId) -> Option<Outline>;
}
