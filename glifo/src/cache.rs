// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The strike cache: bounded, recency-ordered storage of strikes.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, OnceLock};

use skrifa::GlyphId;

use crate::descriptor::StrikeDescriptor;
use crate::glyph::{GlyphMetrics, PackedGlyphId, SUBPIXEL_BUCKETS};
use crate::outline::Outline;
use crate::scaler::{FontMetrics, ScalerContext};
use crate::strike::Strike;

/// Default maximum number of resident strikes.
pub const DEFAULT_COUNT_LIMIT: usize = 2048;

/// Default byte budget for resident strikes.
pub const DEFAULT_BYTE_LIMIT: usize = 2 * 1024 * 1024;

/// Lower bound on the byte budget; smaller requests are clamped up to keep
/// the cache from thrashing.
pub const MIN_BYTE_LIMIT: usize = 256 * 1024;

/// Veto over eviction of one strike.
///
/// A pinner travels with its strike. Eviction asks `can_delete` before
/// destroying the strike and skips it on refusal; a `true` answer is also
/// the pinner's notification that the strike is now going away.
pub trait StrikePinner: Send {
    /// Whether the pinned strike may be destroyed now.
    fn can_delete(&mut self) -> bool;
}

/// A bounded, recency-ordered collection of strikes.
///
/// All operations take `&self` and serialize on one internal lock; held
/// time is bounded by in-memory work. Strikes leave the cache for the
/// duration of a checkout, so a checked-out strike is invisible to lookups
/// and untouchable by eviction until its guard drops.
pub struct StrikeCache {
    inner: Mutex<Inner>,
}

struct Inner {
    /// Resident strikes, most recently used first.
    strikes: Vec<Box<Strike>>,
    count_limit: usize,
    byte_limit: usize,
    total_bytes: usize,
}

impl StrikeCache {
    /// Creates an empty cache with the default budgets.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                strikes: Vec::new(),
                count_limit: DEFAULT_COUNT_LIMIT,
                byte_limit: DEFAULT_BYTE_LIMIT,
                total_bytes: 0,
            }),
        }
    }

    /// The process-wide cache backing local rendering.
    ///
    /// Callers needing isolation (remote clients, tests) construct their own
    /// instance instead.
    pub fn global() -> &'static Arc<Self> {
        static GLOBAL: OnceLock<Arc<StrikeCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new()))
    }

    /// Checks out the strike for `descriptor`, detaching it from the cache.
    ///
    /// Returns `None` on a miss. The strike rejoins the cache at the
    /// most-recent end when the guard drops.
    pub fn find_exclusive(&self, descriptor: &StrikeDescriptor) -> Option<ExclusiveStrike<'_>> {
        let mut inner = self.inner.lock().unwrap();
        let at = inner
            .strikes
            .iter()
            .position(|strike| strike.descriptor() == descriptor)?;
        let strike = inner.strikes.remove(at);
        inner.total_bytes -= strike.memory_used();
        Some(ExclusiveStrike {
            cache: self,
            strike: Some(strike),
        })
    }

    /// Checks out the strike for `descriptor`, building it on a miss with a
    /// scaler from `scaler_factory`.
    pub fn find_or_create_exclusive(
        &self,
        descriptor: &StrikeDescriptor,
        scaler_factory: impl FnOnce() -> Box<dyn ScalerContext>,
    ) -> ExclusiveStrike<'_> {
        if let Some(strike) = self.find_exclusive(descriptor) {
            return strike;
        }
        self.create_exclusive(descriptor.clone(), scaler_factory(), None, None)
    }

    /// Builds a new checked-out strike without consulting the cache.
    ///
    /// The strike joins the cache only when the guard drops. Pre-supplied
    /// `font_metrics` spare the scaler a query; a `pinner` vetoes future
    /// eviction.
    pub fn create_exclusive(
        &self,
        descriptor: StrikeDescriptor,
        scaler: Box<dyn ScalerContext>,
        font_metrics: Option<FontMetrics>,
        pinner: Option<Box<dyn StrikePinner>>,
    ) -> ExclusiveStrike<'_> {
        let strike = Box::new(Strike::new(descriptor, scaler, font_metrics, pinner));
        ExclusiveStrike {
            cache: self,
            strike: Some(strike),
        }
    }

    /// Searches loosely matching resident strikes for a usable image for
    /// `packed`: the exact sub-pixel bucket first, then every other bucket
    /// of the same glyph. Returns a deep copy of the donor's metrics and
    /// pixels.
    pub fn find_similar_image(
        &self,
        descriptor: &StrikeDescriptor,
        packed: PackedGlyphId,
    ) -> Option<(GlyphMetrics, Box<[u8]>)> {
        let inner = self.inner.lock().unwrap();
        for strike in &inner.strikes {
            if !strike.descriptor().loosely_matches(descriptor) {
                continue;
            }
            if let Some(found) = copy_image(strike, packed) {
                return Some(found);
            }
            for sub_y in 0..SUBPIXEL_BUCKETS {
                for sub_x in 0..SUBPIXEL_BUCKETS {
                    let candidate = PackedGlyphId::pack(packed.glyph_id(), sub_x, sub_y);
                    if candidate == packed {
                        continue;
                    }
                    if let Some(found) = copy_image(strike, candidate) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Searches loosely matching resident strikes for an outline for
    /// `glyph`. Outlines are position-independent, so only the whole-pixel
    /// bucket is consulted. Returns a deep copy.
    pub fn find_similar_path(
        &self,
        descriptor: &StrikeDescriptor,
        glyph: GlyphId,
    ) -> Option<Outline> {
        let packed = PackedGlyphId::from_glyph(glyph);
        let inner = self.inner.lock().unwrap();
        for strike in &inner.strikes {
            if !strike.descriptor().loosely_matches(descriptor) {
                continue;
            }
            if let Some(path) = strike.glyph(packed).and_then(|glyph| glyph.path()) {
                return Some(path.clone());
            }
        }
        None
    }

    /// Evicts every resident strike whose pinner does not object,
    /// regardless of budget.
    pub fn purge_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let total = inner.total_bytes;
        inner.purge(total);
        inner.debug_validate();
    }

    /// Updates the byte budget, clamped to [`MIN_BYTE_LIMIT`], evicting as
    /// needed. Returns the previous budget.
    pub fn set_byte_limit(&self, limit: usize) -> usize {
        let limit = limit.max(MIN_BYTE_LIMIT);
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.byte_limit;
        inner.byte_limit = limit;
        inner.purge(0);
        inner.debug_validate();
        previous
    }

    /// Updates the strike count budget, evicting as needed. Returns the
    /// previous budget.
    pub fn set_count_limit(&self, limit: usize) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.count_limit;
        inner.count_limit = limit;
        inner.purge(0);
        inner.debug_validate();
        previous
    }

    /// The current byte budget.
    pub fn byte_limit(&self) -> usize {
        self.inner.lock().unwrap().byte_limit
    }

    /// The current strike count budget.
    pub fn count_limit(&self) -> usize {
        self.inner.lock().unwrap().count_limit
    }

    /// Bytes used by resident strikes. Checked-out strikes do not count
    /// until they return.
    pub fn total_bytes_used(&self) -> usize {
        self.inner.lock().unwrap().total_bytes
    }

    /// Number of resident strikes.
    pub fn strike_count(&self) -> usize {
        self.inner.lock().unwrap().strikes.len()
    }

    /// Recomputes every strike's cost by full scan and asserts it against
    /// the incremental accounting. Panics on any mismatch; an inconsistency
    /// here is a bug in this crate, not a runtime condition.
    pub fn validate(&self) {
        let inner = self.inner.lock().unwrap();
        let mut bytes = 0;
        for strike in &inner.strikes {
            assert_eq!(
                strike.memory_used(),
                strike.scan_memory_used(),
                "strike accounting diverged from scan"
            );
            bytes += strike.memory_used();
        }
        assert_eq!(
            bytes, inner.total_bytes,
            "cache byte total diverged from resident strikes"
        );
    }

    fn attach(&self, strike: Box<Strike>) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_bytes += strike.memory_used();
        inner.strikes.insert(0, strike);
        inner.purge(0);
        inner.debug_validate();
    }
}

impl Default for StrikeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrikeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("StrikeCache")
            .field("strikes", &inner.strikes.len())
            .field("total_bytes", &inner.total_bytes)
            .field("count_limit", &inner.count_limit)
            .field("byte_limit", &inner.byte_limit)
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Evicts from the least-recent end until budgets are satisfied.
    ///
    /// Byte purges are batched: when any bytes must go, at least a quarter
    /// of the total goes with them, amortizing repeated releases that each
    /// sit barely over budget. Count purges are exact. Pinned strikes are
    /// skipped and the walk continues past them.
    fn purge(&mut self, min_bytes_needed: usize) {
        let mut bytes_needed = self
            .total_bytes
            .saturating_sub(self.byte_limit)
            .max(min_bytes_needed);
        if bytes_needed > 0 {
            bytes_needed = bytes_needed.max(self.total_bytes / 4);
        }
        let count_needed = self.strikes.len().saturating_sub(self.count_limit);
        if bytes_needed == 0 && count_needed == 0 {
            return;
        }
        let mut bytes_freed = 0;
        let mut count_freed = 0;
        let mut at = self.strikes.len();
        while at > 0 && (bytes_freed < bytes_needed || count_freed < count_needed) {
            at -= 1;
            if !self.strikes[at].can_evict() {
                continue;
            }
            let strike = self.strikes.remove(at);
            bytes_freed += strike.memory_used();
            count_freed += 1;
            self.total_bytes -= strike.memory_used();
        }
        if count_freed > 0 {
            log::debug!(
                "evicted {count_freed} strikes ({bytes_freed} bytes), {} resident",
                self.strikes.len()
            );
        }
    }

    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        {
            let bytes: usize = self.strikes.iter().map(|s| s.memory_used()).sum();
            assert_eq!(bytes, self.total_bytes, "cache byte accounting drifted");
        }
    }
}

/// Exclusive ownership of one strike, checked out of its cache.
///
/// Dereferences to [`Strike`]. Dropping the guard returns the strike to the
/// most-recent end of the cache and runs eviction; with no background
/// thread, guard drops and budget changes are the only eviction triggers.
pub struct ExclusiveStrike<'a> {
    cache: &'a StrikeCache,
    strike: Option<Box<Strike>>,
}

impl Deref for ExclusiveStrike<'_> {
    type Target = Strike;

    fn deref(&self) -> &Strike {
        self.strike.as_ref().unwrap()
    }
}

impl DerefMut for ExclusiveStrike<'_> {
    fn deref_mut(&mut self) -> &mut Strike {
        self.strike.as_mut().unwrap()
    }
}

impl Drop for ExclusiveStrike<'_> {
    fn drop(&mut self) {
        if let Some(strike) = self.strike.take() {
            self.cache.attach(strike);
        }
    }
}

impl fmt::Debug for ExclusiveStrike<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExclusiveStrike").field(&**self).finish()
    }
}

fn copy_image(strike: &Strike, packed: PackedGlyphId) -> Option<(GlyphMetrics, Box<[u8]>)> {
    let glyph = strike.glyph(packed)?;
    let metrics = *glyph.metrics()?;
    let image = glyph.image()?;
    Some((metrics, image.to_vec().into_boxed_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ScalerFlags, StrikeRec};
    use crate::glyph::MaskFormat;
    use crate::typeface::TypefaceId;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Every glyph is a `bytes_per_glyph` x 1 alpha strip; byte costs are
    /// exact multiples for budget arithmetic.
    struct StripScaler {
        bytes_per_glyph: u16,
    }

    impl ScalerContext for StripScaler {
        fn font_metrics(&mut self) -> FontMetrics {
            FontMetrics::default()
        }

        fn glyph_metrics(&mut self, _glyph: PackedGlyphId) -> GlyphMetrics {
            GlyphMetrics {
                advance_x: 1.0,
                advance_y: 0.0,
                width: self.bytes_per_glyph,
                height: 1,
                left: 0,
                top: 0,
                format: MaskFormat::Alpha8,
            }
        }

        fn glyph_image(
            &mut self,
            glyph: PackedGlyphId,
            metrics: &GlyphMetrics,
        ) -> Option<Box<[u8]>> {
            let seed = (glyph.to_bits() & 0xFF) as u8;
            Some(vec![seed; metrics.image_size()].into_boxed_slice())
        }

        fn glyph_path(&mut self, glyph: GlyphId) -> Option<Outline> {
            if glyph.to_u32() % 2 == 0 {
                return None;
            }
            use skrifa::outline::OutlinePen;
            let mut outline = Outline::new();
            outline.move_to(0.0, 0.0);
            outline.line_to(1.0, 0.0);
            outline.close();
            Some(outline)
        }
    }

    fn descriptor(id: u32, size: f32) -> StrikeDescriptor {
        StrikeDescriptor::new(StrikeRec::new(TypefaceId::new(id), size))
    }

    fn scaler() -> Box<dyn ScalerContext> {
        Box::new(StripScaler { bytes_per_glyph: 8 })
    }

    fn fill(cache: &StrikeCache, desc: &StrikeDescriptor, glyphs: u32) {
        let mut strike = cache.find_or_create_exclusive(desc, scaler);
        for id in 1..=glyphs {
            strike.prepare_image(PackedGlyphId::from_glyph(GlyphId::new(id)));
        }
    }

    #[test]
    fn accounting_survives_churn() {
        let cache = StrikeCache::new();
        for round in 1..=5_u32 {
            fill(&cache, &descriptor(round, 12.0), round * 3);
            cache.validate();
        }
        assert_eq!(cache.strike_count(), 5);
        cache.set_count_limit(2);
        cache.validate();
        assert_eq!(cache.strike_count(), 2);
        cache.purge_all();
        cache.validate();
        assert_eq!(cache.strike_count(), 0);
        assert_eq!(cache.total_bytes_used(), 0);
    }

    #[test]
    fn checked_out_strike_is_invisible() {
        let cache = StrikeCache::new();
        let desc = descriptor(1, 12.0);
        fill(&cache, &desc, 1);
        let held = cache.find_exclusive(&desc).unwrap();
        assert!(cache.find_exclusive(&desc).is_none());
        assert_eq!(cache.strike_count(), 0);
        drop(held);
        assert!(cache.find_exclusive(&desc).is_some());
    }

    #[test]
    fn checkout_moves_bytes_out_of_totals() {
        let cache = StrikeCache::new();
        let desc = descriptor(1, 12.0);
        fill(&cache, &desc, 4);
        let resident = cache.total_bytes_used();
        assert!(resident > 0);
        let held = cache.find_exclusive(&desc).unwrap();
        assert_eq!(cache.total_bytes_used(), 0);
        cache.validate();
        drop(held);
        assert_eq!(cache.total_bytes_used(), resident);
    }

    #[test]
    fn eviction_never_touches_checked_out_strike() {
        let cache = StrikeCache::new();
        cache.set_count_limit(2);
        let desc_a = descriptor(1, 12.0);
        fill(&cache, &desc_a, 1);
        fill(&cache, &descriptor(2, 12.0), 1);
        let held = cache.find_exclusive(&desc_a).unwrap();
        // Two new strikes while at the limit force evictions; the held
        // strike is not resident, so it cannot be a victim.
        fill(&cache, &descriptor(3, 12.0), 1);
        fill(&cache, &descriptor(4, 12.0), 1);
        drop(held);
        assert!(cache.find_exclusive(&desc_a).is_some());
    }

    #[test]
    fn byte_limit_floor_is_enforced() {
        let cache = StrikeCache::new();
        cache.set_byte_limit(1);
        assert_eq!(cache.byte_limit(), MIN_BYTE_LIMIT);
    }

    #[test]
    fn lookup_refreshes_recency() {
        let cache = StrikeCache::new();
        let desc_old = descriptor(1, 12.0);
        fill(&cache, &desc_old, 1);
        fill(&cache, &descriptor(2, 12.0), 1);
        // Touch the older strike, then shrink to one slot; the untouched
        // strike is now least recent and goes first.
        drop(cache.find_exclusive(&desc_old).unwrap());
        cache.set_count_limit(1);
        assert!(cache.find_exclusive(&desc_old).is_some());
    }

    #[test]
    fn desperation_search_copies_across_buckets() {
        let cache = StrikeCache::new();
        let glyph = GlyphId::new(9);
        let mut donor_rec = StrikeRec::new(TypefaceId::new(1), 12.0);
        donor_rec.flags = ScalerFlags::FAKE_GAMMA;
        let donor_desc = StrikeDescriptor::new(donor_rec);
        let donor_packed = PackedGlyphId::from_glyph(glyph);
        let donor_image = {
            let mut strike = cache.find_or_create_exclusive(&donor_desc, scaler);
            strike.prepare_image(donor_packed).unwrap().to_vec()
        };
        // Same typeface and size, no flags: loosely equal, byte-distinct.
        let seeker_desc = descriptor(1, 12.0);
        assert_ne!(donor_desc, seeker_desc);
        let wanted = PackedGlyphId::pack(glyph, 2, 2);
        let (metrics, mut copy) = cache.find_similar_image(&seeker_desc, wanted).unwrap();
        assert_eq!(copy.as_ref(), &donor_image[..]);
        assert_eq!(metrics.width, 8);
        copy[0] ^= 0xFF;
        let (_, again) = cache.find_similar_image(&seeker_desc, wanted).unwrap();
        assert_eq!(again.as_ref(), &donor_image[..]);
        // A different glyph misses every bucket.
        assert!(cache
            .find_similar_image(&seeker_desc, PackedGlyphId::from_glyph(GlyphId::new(10)))
            .is_none());
        // A descriptor at another size does not match loosely.
        assert!(cache.find_similar_image(&descriptor(1, 14.0), wanted).is_none());
    }

    #[test]
    fn desperation_search_finds_paths_at_whole_pixels() {
        let cache = StrikeCache::new();
        let glyph = GlyphId::new(9);
        let mut donor_rec = StrikeRec::new(TypefaceId::new(1), 12.0);
        donor_rec.flags = ScalerFlags::EMBOLDEN;
        let donor_desc = StrikeDescriptor::new(donor_rec);
        {
            let mut strike = cache.find_or_create_exclusive(&donor_desc, scaler);
            assert!(strike.prepare_path(PackedGlyphId::from_glyph(glyph)).is_some());
        }
        let seeker_desc = descriptor(1, 12.0);
        assert!(cache.find_similar_path(&seeker_desc, glyph).is_some());
        // Never computed by the donor, so nothing to borrow.
        assert!(cache.find_similar_path(&seeker_desc, GlyphId::new(7)).is_none());
        // A different typeface does not match loosely.
        assert!(cache.find_similar_path(&descriptor(2, 12.0), glyph).is_none());
    }

    struct FlagPinner {
        deletable: Arc<AtomicBool>,
    }

    impl StrikePinner for FlagPinner {
        fn can_delete(&mut self) -> bool {
            self.deletable.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn pinned_strike_survives_purge_until_released() {
        let cache = StrikeCache::new();
        let deletable = Arc::new(AtomicBool::new(false));
        let desc = descriptor(1, 12.0);
        let pinner = Box::new(FlagPinner {
            deletable: deletable.clone(),
        });
        drop(cache.create_exclusive(desc.clone(), scaler(), None, Some(pinner)));
        cache.purge_all();
        assert_eq!(cache.strike_count(), 1, "pinned strike must survive purge");
        deletable.store(true, Ordering::Relaxed);
        cache.purge_all();
        assert_eq!(cache.strike_count(), 0);
        cache.validate();
    }
}
