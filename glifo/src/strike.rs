// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A strike: every cached rendering result for one scaler configuration.

use core::fmt;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::cache::StrikePinner;
use crate::descriptor::StrikeDescriptor;
use crate::glyph::{Glyph, GlyphMetrics, PackedGlyphId};
use crate::outline::Outline;
use crate::scaler::{FontMetrics, ScalerContext};

/// Fixed accounting cost per cached glyph entry.
const GLYPH_OVERHEAD: usize = core::mem::size_of::<Glyph>();

/// Glyph data cached for one scaler configuration.
///
/// A strike owns its scaler context and consults it at most once per glyph
/// per kind of data; results, including failures, are cached. All methods
/// take `&mut self`: synchronization is the cache's exclusive checkout, a
/// strike has none of its own.
pub struct Strike {
    descriptor: StrikeDescriptor,
    scaler: Box<dyn ScalerContext>,
    font_metrics: FontMetrics,
    glyphs: HashMap<PackedGlyphId, Glyph>,
    memory_used: usize,
    pinner: Option<Box<dyn StrikePinner>>,
}

impl Strike {
    /// Builds an empty strike.
    ///
    /// When `font_metrics` is provided the scaler is not consulted for it;
    /// this is how deserialized strikes avoid asking a pass-through scaler
    /// for data it cannot have.
    pub(crate) fn new(
        descriptor: StrikeDescriptor,
        mut scaler: Box<dyn ScalerContext>,
        font_metrics: Option<FontMetrics>,
        pinner: Option<Box<dyn StrikePinner>>,
    ) -> Self {
        let font_metrics = font_metrics.unwrap_or_else(|| scaler.font_metrics());
        Self {
            descriptor,
            scaler,
            font_metrics,
            glyphs: HashMap::new(),
            memory_used: core::mem::size_of::<Self>(),
            pinner,
        }
    }

    /// The configuration this strike caches for.
    pub fn descriptor(&self) -> &StrikeDescriptor {
        &self.descriptor
    }

    /// Font-wide metrics for this configuration.
    pub fn font_metrics(&self) -> FontMetrics {
        self.font_metrics
    }

    /// Tracked byte cost of this strike, maintained incrementally.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Number of cached glyph entries.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Read-only access to a cached entry, without computing anything.
    pub fn glyph(&self, packed: PackedGlyphId) -> Option<&Glyph> {
        self.glyphs.get(&packed)
    }

    fn ensure_glyph(&mut self, packed: PackedGlyphId) -> &mut Glyph {
        match self.glyphs.entry(packed) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.memory_used += GLYPH_OVERHEAD;
                entry.insert(Glyph::new())
            }
        }
    }

    /// Returns the existing entry for `packed`, inserting an unpopulated one
    /// if needed.
    pub fn get_or_create_glyph(&mut self, packed: PackedGlyphId) -> &Glyph {
        self.ensure_glyph(packed)
    }

    /// Metrics for `packed`, computing them on first request.
    pub fn metrics(&mut self, packed: PackedGlyphId) -> GlyphMetrics {
        let glyph = match self.glyphs.entry(packed) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.memory_used += GLYPH_OVERHEAD;
                entry.insert(Glyph::new())
            }
        };
        if let Some(metrics) = glyph.metrics() {
            return *metrics;
        }
        let computed = self.scaler.glyph_metrics(packed);
        glyph.init_metrics(computed)
    }

    /// Image pixels for `packed`, rasterizing on first request.
    ///
    /// Empty glyphs have nothing to draw and are never handed to the scaler.
    pub fn prepare_image(&mut self, packed: PackedGlyphId) -> Option<&[u8]> {
        let metrics = self.metrics(packed);
        if metrics.is_empty() {
            return None;
        }
        let glyph = self.glyphs.get_mut(&packed)?;
        if !glyph.image_computed() {
            let image = self.scaler.glyph_image(packed, &metrics);
            self.memory_used += glyph.init_image(image);
        }
        glyph.image()
    }

    /// Outline for `packed`, producing it on first request.
    pub fn prepare_path(&mut self, packed: PackedGlyphId) -> Option<&Outline> {
        self.metrics(packed);
        let glyph = self.glyphs.get_mut(&packed)?;
        if !glyph.path_computed() {
            let path = self.scaler.glyph_path(packed.glyph_id());
            self.memory_used += glyph.init_path(path);
        }
        glyph.path()
    }

    /// Installs metrics delivered from a peer. Existing metrics win.
    pub(crate) fn merge_glyph(&mut self, packed: PackedGlyphId, metrics: GlyphMetrics) {
        self.ensure_glyph(packed).init_metrics(metrics);
    }

    /// Installs image data delivered from a peer. Existing data wins.
    pub(crate) fn merge_image(&mut self, packed: PackedGlyphId, data: Box<[u8]>) {
        let glyph = self.ensure_glyph(packed);
        let added = glyph.init_image(Some(data));
        self.memory_used += added;
    }

    /// Installs an outline delivered from a peer; `None` records the glyph
    /// as having no outline. Existing data wins.
    pub(crate) fn merge_path(&mut self, packed: PackedGlyphId, path: Option<Outline>) {
        let glyph = self.ensure_glyph(packed);
        let added = glyph.init_path(path);
        self.memory_used += added;
    }

    /// Asks the pinner, if any, whether this strike may be destroyed.
    pub(crate) fn can_evict(&mut self) -> bool {
        match &mut self.pinner {
            Some(pinner) => pinner.can_delete(),
            None => true,
        }
    }

    /// Recomputes the byte cost by full scan, for validation.
    pub(crate) fn scan_memory_used(&self) -> usize {
        core::mem::size_of::<Self>()
            + self
                .glyphs
                .values()
                .map(|glyph| GLYPH_OVERHEAD + glyph.data_cost())
                .sum::<usize>()
    }
}

impl fmt::Debug for Strike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strike")
            .field("descriptor", &self.descriptor)
            .field("glyphs", &self.glyphs.len())
            .field("memory_used", &self.memory_used)
            .field("pinned", &self.pinner.is_some())
            .finish_non_exhaustive()
    }
}
