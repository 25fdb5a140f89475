// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client half of the transport: commits blobs into a local cache.

use core::fmt;
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use skrifa::GlyphId;

use super::wire::{self, ReadError, Reader, WireTypeface};
use super::{CacheMissKind, DiscardableHandleId};
use crate::cache::{StrikeCache, StrikePinner};
use crate::descriptor::StrikeDescriptor;
use crate::glyph::{GlyphMetrics, PackedGlyphId};
use crate::outline::Outline;
use crate::scaler::{FontMetrics, ScalerContext};
use crate::typeface::{Typeface, TypefaceId, TypefaceStyle};

/// Client-side view of the discardable handle registry, plus the miss
/// telemetry sink.
///
/// The embedder implements this over the same registry the server's
/// [`ServerDiscardableManager`](super::ServerDiscardableManager) uses.
pub trait ClientDiscardableManager: Send + Sync {
    /// Attempts to delete `handle`. Returns false while the server holds
    /// the handle locked, in which case the cached state must survive.
    /// Returning true is a point of no return; the server will see the
    /// next lock attempt fail and rebuild.
    fn delete_handle(&self, handle: DiscardableHandleId) -> bool;

    /// Called whenever rendering needed glyph data that was never
    /// delivered. Purely diagnostic; rendering continues degraded.
    fn notify_cache_miss(&self, kind: CacheMissKind);
}

/// Commits serialized typefaces and strike data into a local cache.
///
/// Typefaces arrive as identity-only proxies, deduplicated per server id.
/// Strike blobs commit all or nothing: a blob that fails validation at any
/// point leaves every strike untouched.
pub struct StrikeClient {
    manager: Arc<dyn ClientDiscardableManager>,
    cache: Arc<StrikeCache>,
    typefaces: HashMap<TypefaceId, Arc<TypefaceProxy>>,
}

impl StrikeClient {
    /// Creates a client that commits into the process-wide cache.
    pub fn new(manager: Arc<dyn ClientDiscardableManager>) -> Self {
        Self::with_cache(manager, StrikeCache::global().clone())
    }

    /// Creates a client that commits into `cache`.
    pub fn with_cache(manager: Arc<dyn ClientDiscardableManager>, cache: Arc<StrikeCache>) -> Self {
        Self {
            manager,
            cache,
            typefaces: HashMap::new(),
        }
    }

    /// The cache this client commits into.
    pub fn cache(&self) -> &Arc<StrikeCache> {
        &self.cache
    }

    /// Builds or reuses the proxy for one serialized typeface.
    ///
    /// Deserializing the same server typeface twice yields the same proxy
    /// instance, so typeface pointer identity survives the transport.
    pub fn deserialize_typeface(&mut self, bytes: &[u8]) -> Result<Arc<TypefaceProxy>, ReadError> {
        let mut r = Reader::new(bytes);
        let wire_typeface = WireTypeface::read(&mut r)?;
        r.finish()?;
        Ok(self.intern_typeface(wire_typeface))
    }

    /// Commits one strike data blob.
    ///
    /// On any error the glyph cache is exactly as it was; a hostile or
    /// truncated blob cannot commit partially. Typefaces named by a blob
    /// that later fails validation may still be interned, which is
    /// harmless: proxies carry identity only.
    pub fn read_strike_data(&mut self, bytes: &[u8]) -> Result<(), ReadError> {
        match self.try_read_strike_data(bytes) {
            Ok(()) => Ok(()),
            Err(error) => {
                log::warn!("rejected strike data: {error}");
                Err(error)
            }
        }
    }

    fn try_read_strike_data(&mut self, bytes: &[u8]) -> Result<(), ReadError> {
        let (typefaces, strikes) = parse_strike_data(bytes)?;
        let typeface_count = typefaces.len();
        for wire_typeface in typefaces {
            self.intern_typeface(wire_typeface);
        }

        // Resolve every reference before the first commit, so a bad strike
        // cannot leave earlier ones half applied.
        let mut resolved = Vec::new();
        for staged in strikes {
            let id = staged.descriptor.rec().typeface_id;
            let proxy = self
                .typefaces
                .get(&id)
                .cloned()
                .ok_or(ReadError::UnknownTypeface(id))?;
            let glyph_count = proxy.glyph_count();
            for glyph in &staged.glyphs {
                if glyph.packed.glyph_id().to_u32() >= glyph_count {
                    return Err(ReadError::MalformedData("glyph id out of range"));
                }
            }
            resolved.push((staged, proxy));
        }

        let strike_count = resolved.len();
        for (staged, proxy) in resolved {
            self.commit_strike(staged, &proxy);
        }
        log::debug!("committed strike data: {typeface_count} typefaces, {strike_count} strikes");
        Ok(())
    }

    fn intern_typeface(&mut self, wire_typeface: WireTypeface) -> Arc<TypefaceProxy> {
        match self.typefaces.entry(wire_typeface.id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry
                .insert(Arc::new(TypefaceProxy::new(
                    wire_typeface,
                    self.cache.clone(),
                    self.manager.clone(),
                )))
                .clone(),
        }
    }

    /// Merges one staged strike into the cache. The strike is created on
    /// first contact with delivered font metrics and a pinner tied to the
    /// server's handle; re-sent strikes merge into the resident one.
    fn commit_strike(&mut self, staged: StagedStrike, proxy: &Arc<TypefaceProxy>) {
        let mut strike = match self.cache.find_exclusive(&staged.descriptor) {
            Some(strike) => strike,
            None => self.cache.create_exclusive(
                staged.descriptor.clone(),
                proxy.create_scaler(&staged.descriptor),
                Some(staged.font_metrics),
                Some(Box::new(DiscardablePinner {
                    manager: self.manager.clone(),
                    handle: staged.handle,
                })),
            ),
        };
        for glyph in staged.glyphs {
            strike.merge_glyph(glyph.packed, glyph.metrics);
            if let Some(image) = glyph.image {
                strike.merge_image(glyph.packed, image);
            }
            if let Some(path) = glyph.path {
                strike.merge_path(glyph.packed, path);
            }
        }
    }
}

impl fmt::Debug for StrikeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrikeClient")
            .field("typefaces", &self.typefaces.len())
            .finish_non_exhaustive()
    }
}

struct StagedGlyph {
    packed: PackedGlyphId,
    metrics: GlyphMetrics,
    image: Option<Box<[u8]>>,
    /// Outer `None`: the record carried no path. Inner `None`: the server
    /// computed the path and the glyph has none.
    path: Option<Option<Outline>>,
}

struct StagedStrike {
    descriptor: StrikeDescriptor,
    handle: DiscardableHandleId,
    font_metrics: FontMetrics,
    glyphs: Vec<StagedGlyph>,
}

/// Parses a whole blob into staged form without touching any cache state.
fn parse_strike_data(bytes: &[u8]) -> Result<(Vec<WireTypeface>, Vec<StagedStrike>), ReadError> {
    let mut r = Reader::new(bytes);
    let typeface_count = r.read_u32()?;
    let mut typefaces = Vec::new();
    for _ in 0..typeface_count {
        typefaces.push(WireTypeface::read(&mut r)?);
    }
    let strike_count = r.read_u32()?;
    let mut strikes = Vec::new();
    for _ in 0..strike_count {
        strikes.push(parse_strike_block(&mut r)?);
    }
    r.finish()?;
    Ok((typefaces, strikes))
}

fn parse_strike_block(r: &mut Reader<'_>) -> Result<StagedStrike, ReadError> {
    let desc_len = r.read_u32()? as usize;
    let desc_bytes = r.read_bytes(desc_len)?;
    let descriptor = StrikeDescriptor::from_bytes(desc_bytes)
        .ok_or(ReadError::MalformedData("strike descriptor"))?;
    let handle_bits = r.read_u32()?;
    if handle_bits == 0 {
        return Err(ReadError::InvalidHandle);
    }
    let handle = DiscardableHandleId::new(handle_bits);
    let font_metrics = wire::read_font_metrics(r)?;
    let glyph_count = r.read_u32()?;
    let mut glyphs = Vec::new();
    for _ in 0..glyph_count {
        let (packed, metrics) = wire::read_glyph_metrics(r)?;
        let image = if r.read_bool()? {
            if metrics.is_empty() {
                return Err(ReadError::MalformedData("image for empty glyph"));
            }
            let len = r.read_u32()? as usize;
            if len != metrics.image_size() {
                return Err(ReadError::MalformedData("image size mismatch"));
            }
            Some(r.read_bytes(len)?.into())
        } else {
            None
        };
        let path = if r.read_bool()? {
            Some(wire::read_outline(r)?)
        } else {
            None
        };
        glyphs.push(StagedGlyph {
            packed,
            metrics,
            image,
            path,
        });
    }
    Ok(StagedStrike {
        descriptor,
        handle,
        font_metrics,
        glyphs,
    })
}

/// Identity of a server typeface, without any font data behind it.
///
/// Proxies answer style and glyph-count queries from wire data and build
/// pass-through scalers that resolve everything from the local cache. One
/// proxy exists per server typeface id per client.
pub struct TypefaceProxy {
    id: TypefaceId,
    style: TypefaceStyle,
    fixed_pitch: bool,
    glyph_count: u32,
    cache: Arc<StrikeCache>,
    manager: Arc<dyn ClientDiscardableManager>,
}

impl TypefaceProxy {
    fn new(
        wire_typeface: WireTypeface,
        cache: Arc<StrikeCache>,
        manager: Arc<dyn ClientDiscardableManager>,
    ) -> Self {
        Self {
            id: wire_typeface.id,
            style: wire_typeface.style,
            fixed_pitch: wire_typeface.fixed_pitch,
            glyph_count: wire_typeface.glyph_count,
            cache,
            manager,
        }
    }
}

impl Typeface for TypefaceProxy {
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
        Box::new(RemoteScalerContext {
            descriptor: descriptor.clone(),
            cache: Arc::downgrade(&self.cache),
            manager: self.manager.clone(),
        })
    }
}

impl fmt::Debug for TypefaceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypefaceProxy")
            .field("id", &self.id)
            .field("style", &self.style)
            .field("glyph_count", &self.glyph_count)
            .finish_non_exhaustive()
    }
}

/// Scaler behind a proxy typeface. It can compute nothing itself: anything
/// asked of it was supposed to arrive over the wire, so every call is a
/// cache miss that degrades as gracefully as the resident strikes allow.
struct RemoteScalerContext {
    descriptor: StrikeDescriptor,
    /// Weak because the scaler sits inside a strike the cache owns.
    cache: Weak<StrikeCache>,
    manager: Arc<dyn ClientDiscardableManager>,
}

impl ScalerContext for RemoteScalerContext {
    fn font_metrics(&mut self) -> FontMetrics {
        // Only reachable when a strike is built locally rather than from a
        // strike block, which always carries font metrics.
        self.manager.notify_cache_miss(CacheMissKind::FontMetrics);
        FontMetrics::default()
    }

    fn glyph_metrics(&mut self, glyph: PackedGlyphId) -> GlyphMetrics {
        let borrowed = self
            .cache
            .upgrade()
            .and_then(|cache| cache.find_similar_image(&self.descriptor, glyph));
        if let Some((metrics, _)) = borrowed {
            self.manager
                .notify_cache_miss(CacheMissKind::GlyphMetricsFallback);
            return metrics;
        }
        self.manager.notify_cache_miss(CacheMissKind::GlyphMetrics);
        GlyphMetrics::empty()
    }

    fn glyph_image(&mut self, glyph: PackedGlyphId, _metrics: &GlyphMetrics) -> Option<Box<[u8]>> {
        // A borrowed image is a clean recovery, not a miss: the strike
        // caches the copy and rendering proceeds at full quality.
        let borrowed = self
            .cache
            .upgrade()
            .and_then(|cache| cache.find_similar_image(&self.descriptor, glyph));
        if let Some((_, image)) = borrowed {
            return Some(image);
        }
        self.manager.notify_cache_miss(CacheMissKind::GlyphImage);
        None
    }

    fn glyph_path(&mut self, glyph: GlyphId) -> Option<Outline> {
        let borrowed = self
            .cache
            .upgrade()
            .and_then(|cache| cache.find_similar_path(&self.descriptor, glyph));
        if let Some(path) = borrowed {
            self.manager
                .notify_cache_miss(CacheMissKind::GlyphPathFallback);
            return Some(path);
        }
        self.manager.notify_cache_miss(CacheMissKind::GlyphPath);
        None
    }
}

/// Ties a cached strike's lifetime to its discardable handle. Eviction asks
/// the handle registry; a locked handle keeps the strike resident so the
/// server's sent bookkeeping stays truthful.
struct DiscardablePinner {
    manager: Arc<dyn ClientDiscardableManager>,
    handle: DiscardableHandleId,
}

impl StrikePinner for DiscardablePinner {
    fn can_delete(&mut self) -> bool {
        self.manager.delete_handle(self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StrikeRec;
    use crate::remote::wire::Writer;

    struct NullManager;

    impl ClientDiscardableManager for NullManager {
        fn delete_handle(&self, _handle: DiscardableHandleId) -> bool {
            true
        }

        fn notify_cache_miss(&self, _kind: CacheMissKind) {}
    }

    fn client() -> StrikeClient {
        StrikeClient::with_cache(Arc::new(NullManager), Arc::new(StrikeCache::new()))
    }

    fn typeface_bytes(id: u32, glyph_count: u32) -> Vec<u8> {
        let wire_typeface = WireTypeface {
            id: TypefaceId::new(id),
            glyph_count,
            style: TypefaceStyle::NORMAL,
            fixed_pitch: false,
        };
        let mut buf = Vec::new();
        wire_typeface.write(&mut Writer::new(&mut buf));
        buf
    }

    #[test]
    fn deserialized_typefaces_are_deduplicated() {
        let mut client = client();
        let bytes = typeface_bytes(7, 100);
        let first = client.deserialize_typeface(&bytes).unwrap();
        let second = client.deserialize_typeface(&bytes).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.glyph_count(), 100);
    }

    #[test]
    fn empty_blob_is_rejected() {
        let mut client = client();
        assert_eq!(client.read_strike_data(&[]), Err(ReadError::OutOfBounds));
    }

    #[test]
    fn blob_with_no_deltas_commits_nothing() {
        let mut client = client();
        let mut blob = Vec::new();
        let mut w = Writer::new(&mut blob);
        w.write_u32(0);
        w.write_u32(0);
        assert_eq!(client.read_strike_data(&blob), Ok(()));
        assert_eq!(client.cache().strike_count(), 0);
    }

    #[test]
    fn strike_for_unknown_typeface_is_rejected() {
        let mut client = client();
        let descriptor = StrikeDescriptor::new(StrikeRec::new(TypefaceId::new(9), 12.0));
        let mut blob = Vec::new();
        let mut w = Writer::new(&mut blob);
        w.write_u32(0);
        w.write_u32(1);
        let desc_bytes = descriptor.as_bytes();
        w.write_u32(desc_bytes.len() as u32);
        w.write_bytes(desc_bytes);
        w.write_u32(1);
        wire::write_font_metrics(&mut w, &FontMetrics::default());
        w.write_u32(0);
        assert_eq!(
            client.read_strike_data(&blob),
            Err(ReadError::UnknownTypeface(TypefaceId::new(9)))
        );
        assert_eq!(client.cache().strike_count(), 0);
    }

    #[test]
    fn zero_handle_is_rejected() {
        let mut client = client();
        let descriptor = StrikeDescriptor::new(StrikeRec::new(TypefaceId::new(9), 12.0));
        let mut blob = Vec::new();
        let mut w = Writer::new(&mut blob);
        w.write_u32(0);
        w.write_u32(1);
        let desc_bytes = descriptor.as_bytes();
        w.write_u32(desc_bytes.len() as u32);
        w.write_bytes(desc_bytes);
        w.write_u32(0);
        wire::write_font_metrics(&mut w, &FontMetrics::default());
        w.write_u32(0);
        assert_eq!(client.read_strike_data(&blob), Err(ReadError::InvalidHandle));
    }
}
