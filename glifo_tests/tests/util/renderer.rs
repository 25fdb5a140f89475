// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tiny software compositor for comparing rendered strikes.

use glifo::{PackedGlyphId, StrikeCache, StrikeDescriptor, Typeface};

/// Canvas side length in pixels.
pub(crate) const CANVAS_SIZE: usize = 64;

/// Renders `placed` glyphs through `cache` into an alpha-8 canvas.
///
/// This is the whole client rendering loop in miniature: check the strike
/// out, resolve metrics, skip empties, composite pixels. Glyph images are
/// assumed to be alpha-8, which is all the test font produces. Pixels are
/// max-blended so overlaps stay deterministic.
pub(crate) fn raster_glyphs(
    cache: &StrikeCache,
    typeface: &dyn Typeface,
    descriptor: &StrikeDescriptor,
    placed: &[(PackedGlyphId, (usize, usize))],
) -> Vec<u8> {
    let mut canvas = vec![0_u8; CANVAS_SIZE * CANVAS_SIZE];
    let mut strike =
        cache.find_or_create_exclusive(descriptor, || typeface.create_scaler(descriptor));
    for &(packed, (origin_x, origin_y)) in placed {
        let metrics = strike.metrics(packed);
        if metrics.is_empty() {
            continue;
        }
        let width = usize::from(metrics.width);
        let height = usize::from(metrics.height);
        let Some(image) = strike.prepare_image(packed) else {
            continue;
        };
        for row in 0..height {
            for col in 0..width {
                let px = image[row * width + col];
                let x = origin_x + col;
                let y = origin_y + row;
                if x < CANVAS_SIZE && y < CANVAS_SIZE {
                    let at = y * CANVAS_SIZE + x;
                    canvas[at] = canvas[at].max(px);
                }
            }
        }
    }
    canvas
}
