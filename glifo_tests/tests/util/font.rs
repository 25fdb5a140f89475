// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic synthetic font.
//!
//! Glyph data is a pure function of the scaler configuration and packed
//! glyph id, so two scalers built from equal descriptors always agree:
//!
//! - glyph 0 is the empty glyph,
//! - [`HUGE_GLYPH`] rasterizes far past any sane mask dimension,
//! - every other glyph is a small square with a side of `id % 5 + 1`,
//! - odd glyph ids carry an outline, even ones have none.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glifo::skrifa::outline::OutlinePen;
use glifo::{
    FontMetrics, GlyphId, GlyphMetrics, MaskFormat, Outline, PackedGlyphId, ScalerContext,
    ScalerFlags, StrikeDescriptor, Typeface, TypefaceId, TypefaceStyle,
};

/// A glyph that rasterizes at 300 pixels per side.
pub(crate) const HUGE_GLYPH: u32 = 41;

/// Scaler work performed across every scaler a [`TestTypeface`] hands out.
#[derive(Default)]
pub(crate) struct ScalerCounts {
    pub(crate) metrics: AtomicUsize,
    pub(crate) images: AtomicUsize,
    pub(crate) paths: AtomicUsize,
}

pub(crate) struct TestTypeface {
    id: TypefaceId,
    glyph_count: u32,
    style: TypefaceStyle,
    fixed_pitch: bool,
    counts: Arc<ScalerCounts>,
}

impl TestTypeface {
    pub(crate) fn new(id: u32) -> Self {
        Self::with_style(id, TypefaceStyle::NORMAL, false)
    }

    pub(crate) fn with_style(id: u32, style: TypefaceStyle, fixed_pitch: bool) -> Self {
        Self {
            id: TypefaceId::new(id),
            glyph_count: 100,
            style,
            fixed_pitch,
            counts: Arc::default(),
        }
    }

    pub(crate) fn counts(&self) -> &ScalerCounts {
        &self.counts
    }
}

impl Typeface for TestTypeface {
    fn id(&self) -> TypefaceId {
        self.id
    }

    fn style(&self) -> TypefaceStyle {
        self.style
    }

    fn is_fixed_pitch(&self) -> bool {
        self.fixed_pitch
    }

    fn glyph_count(&self) -> u32 {
        self.glyph_count
    }

    fn create_scaler(&self, descriptor: &StrikeDescriptor) -> Box<dyn ScalerContext> {
        Box::new(TestScaler {
            text_size: descriptor.rec().text_size,
            embolden: descriptor.rec().flags.contains(ScalerFlags::EMBOLDEN),
            counts: Arc::clone(&self.counts),
        })
    }
}

fn glyph_side(glyph: GlyphId) -> u16 {
    match glyph.to_u32() {
        0 => 0,
        HUGE_GLYPH => 300,
        id => (id % 5 + 1) as u16,
    }
}

struct TestScaler {
    text_size: f32,
    embolden: bool,
    counts: Arc<ScalerCounts>,
}

impl ScalerContext for TestScaler {
    fn font_metrics(&mut self) -> FontMetrics {
        FontMetrics {
            ascent: -0.8 * self.text_size,
            descent: 0.2 * self.text_size,
            leading: 0.1 * self.text_size,
            avg_char_width: 0.5 * self.text_size,
            x_height: 0.48 * self.text_size,
            cap_height: 0.7 * self.text_size,
        }
    }

    fn glyph_metrics(&mut self, glyph: PackedGlyphId) -> GlyphMetrics {
        self.counts.metrics.fetch_add(1, Ordering::Relaxed);
        let side = glyph_side(glyph.glyph_id());
        if side == 0 {
            return GlyphMetrics::empty();
        }
        GlyphMetrics {
            // Sub-pixel variants advance slightly differently so borrowed
            // metrics are distinguishable from exact ones.
            advance_x: f32::from(side) + f32::from(glyph.sub_x()) * 0.25,
            advance_y: 0.0,
            width: side,
            height: side,
            left: 1,
            top: side as i16,
            format: MaskFormat::Alpha8,
        }
    }

    fn glyph_image(&mut self, glyph: PackedGlyphId, metrics: &GlyphMetrics) -> Option<Box<[u8]>> {
        self.counts.images.fetch_add(1, Ordering::Relaxed);
        let mut seed = (glyph.to_bits() as u8) ^ (self.text_size as u8);
        if self.embolden {
            seed = seed.wrapping_add(77);
        }
        // Nonzero pixels only, so composited output is visible.
        Some(
            (0..metrics.image_size())
                .map(|i| seed.wrapping_add(i as u8) | 1)
                .collect(),
        )
    }

    fn glyph_path(&mut self, glyph: GlyphId) -> Option<Outline> {
        self.counts.paths.fetch_add(1, Ordering::Relaxed);
        if glyph.to_u32() % 2 == 0 {
            return None;
        }
        let side = f32::from(glyph_side(glyph)) * self.text_size / 10.0;
        let mut outline = Outline::new();
        outline.move_to(0.0, 0.0);
        outline.line_to(side, 0.0);
        outline.line_to(side, side);
        outline.close();
        Some(outline)
    }
}
