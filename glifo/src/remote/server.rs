// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Server half of the transport: analyzes glyph runs and serializes deltas.

use core::fmt;
use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::{HashMap, HashSet};
use skrifa::GlyphId;

use super::DiscardableHandleId;
use super::wire::{self, WireTypeface, Writer};
use crate::descriptor::{ScalerFlags, StrikeDescriptor, StrikeRec};
use crate::glyph::{GlyphMetrics, PackedGlyphId};
use crate::scaler::{FontMetrics, ScalerContext};
use crate::typeface::{Typeface, TypefaceId};

/// Default cap on concurrently tracked remote strikes.
pub const DEFAULT_MAX_TRACKED_STRIKES: usize = 64;

/// Default device text size above which whole runs ship as outlines.
pub const DEFAULT_MASK_SIZE_LIMIT: f32 = 256.0;

/// Default text size outline strikes are scaled at. Outlines are resolution
/// independent, so one canonical size serves every large or stroked run.
pub const DEFAULT_CANONICAL_PATH_SIZE: f32 = 64.0;

/// Per-glyph image dimension limit, in pixels. A glyph whose mask would
/// exceed this on either axis ships as an outline instead.
const MAX_MASK_DIMENSION: u16 = 256;

/// Cap on memoized glyph metrics per remote strike.
const METRICS_MEMO_LIMIT: usize = 256;

/// Server-side view of the discardable handle registry.
///
/// The embedder implements this over whatever shared memory or message
/// channel pairs the two processes. Handles are created locked.
pub trait ServerDiscardableManager: Send + Sync {
    /// Mints a fresh handle in the locked state.
    fn create_handle(&self) -> DiscardableHandleId;

    /// Attempts to relock `handle`. Returns false once the client has
    /// discarded it, after which the handle can never be locked again.
    fn lock_handle(&self, handle: DiscardableHandleId) -> bool;
}

/// The linear part of a device transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    /// Horizontal scale.
    pub scale_x: f32,
    /// Horizontal skew.
    pub skew_x: f32,
    /// Vertical skew.
    pub skew_y: f32,
    /// Vertical scale.
    pub scale_y: f32,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        skew_x: 0.0,
        skew_y: 0.0,
        scale_y: 1.0,
    };

    /// Applies the transform to a point.
    pub fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.scale_x * x + self.skew_x * y,
            self.skew_y * x + self.scale_y * y,
        )
    }

    /// The largest scale factor the transform applies to any direction,
    /// from the larger singular value.
    pub fn max_scale(&self) -> f32 {
        let trace = self.scale_x * self.scale_x
            + self.skew_x * self.skew_x
            + self.skew_y * self.skew_y
            + self.scale_y * self.scale_y;
        let det = self.scale_x * self.scale_y - self.skew_x * self.skew_y;
        let disc = (trace * trace - 4.0 * det * det).max(0.0).sqrt();
        ((trace + disc) * 0.5).sqrt()
    }

    fn rows(&self) -> [f32; 4] {
        [self.scale_x, self.skew_x, self.skew_y, self.scale_y]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One positioned glyph run to analyze.
pub struct GlyphRun<'a> {
    /// The typeface the run is set in.
    pub typeface: &'a dyn Typeface,
    /// Text size in points.
    pub text_size: f32,
    /// Rendering flags for the run.
    pub flags: ScalerFlags,
    /// True when the run is stroked rather than filled. Stroked runs ship
    /// as outlines, since masks bake the fill in.
    pub stroked: bool,
    /// Glyph indices, parallel with `positions`.
    pub glyphs: &'a [GlyphId],
    /// User-space glyph positions, parallel with `glyphs`.
    pub positions: &'a [(f32, f32)],
}

impl fmt::Debug for GlyphRun<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphRun")
            .field("typeface", &self.typeface.id())
            .field("text_size", &self.text_size)
            .field("flags", &self.flags)
            .field("stroked", &self.stroked)
            .field("glyphs", &self.glyphs.len())
            .finish_non_exhaustive()
    }
}

/// Tuning knobs for a [`StrikeServer`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrikeServerOptions {
    /// Most remote strikes tracked at once; the least recently used strike
    /// is silently dropped to stay under this, forcing a resend if it is
    /// ever needed again.
    pub max_tracked_strikes: usize,
    /// Device text size above which whole runs ship as outlines.
    pub mask_size_limit: f32,
    /// Text size outline strikes are scaled at.
    pub canonical_path_size: f32,
}

impl Default for StrikeServerOptions {
    fn default() -> Self {
        Self {
            max_tracked_strikes: DEFAULT_MAX_TRACKED_STRIKES,
            mask_size_limit: DEFAULT_MASK_SIZE_LIMIT,
            canonical_path_size: DEFAULT_CANONICAL_PATH_SIZE,
        }
    }
}

/// Everything the server remembers about one strike it has shipped.
struct RemoteStrike {
    handle: DiscardableHandleId,
    key_descriptor: StrikeDescriptor,
    scaler: Box<dyn ScalerContext>,
    font_metrics: FontMetrics,
    /// Glyphs whose image the client has, or will have after the next flush.
    sent_images: HashSet<PackedGlyphId>,
    /// Glyphs whose outline the client has, or will have after the next flush.
    sent_paths: HashSet<PackedGlyphId>,
    pending_images: Vec<PackedGlyphId>,
    pending_paths: Vec<PackedGlyphId>,
    metrics_memo: HashMap<PackedGlyphId, (u64, GlyphMetrics)>,
    memo_epoch: u64,
    /// Whether the handle has been locked during the current flush interval.
    locked: bool,
    last_used: u64,
}

impl RemoteStrike {
    fn new(
        manager: &dyn ServerDiscardableManager,
        typeface: &dyn Typeface,
        descriptor: &StrikeDescriptor,
        last_used: u64,
    ) -> Self {
        let handle = manager.create_handle();
        let mut scaler = typeface.create_scaler(descriptor);
        let font_metrics = scaler.font_metrics();
        log::debug!(
            "tracking strike for typeface {} under handle {}",
            typeface.id().to_u32(),
            handle.to_u32()
        );
        Self {
            handle,
            key_descriptor: descriptor.key_descriptor(),
            scaler,
            font_metrics,
            sent_images: HashSet::new(),
            sent_paths: HashSet::new(),
            pending_images: Vec::new(),
            pending_paths: Vec::new(),
            metrics_memo: HashMap::new(),
            memo_epoch: 0,
            locked: true,
            last_used,
        }
    }

    /// Metrics for `packed`, memoized up to [`METRICS_MEMO_LIMIT`] entries.
    fn glyph_metrics(&mut self, packed: PackedGlyphId) -> GlyphMetrics {
        self.memo_epoch += 1;
        let epoch = self.memo_epoch;
        if let Some((stamp, metrics)) = self.metrics_memo.get_mut(&packed) {
            *stamp = epoch;
            return *metrics;
        }
        let metrics = self.scaler.glyph_metrics(packed);
        if self.metrics_memo.len() >= METRICS_MEMO_LIMIT {
            let stalest = self
                .metrics_memo
                .iter()
                .min_by_key(|(_, (stamp, _))| *stamp)
                .map(|(key, _)| *key);
            if let Some(stalest) = stalest {
                self.metrics_memo.remove(&stalest);
            }
        }
        self.metrics_memo.insert(packed, (epoch, metrics));
        metrics
    }

    fn enqueue_image(&mut self, packed: PackedGlyphId) {
        if self.sent_images.insert(packed) {
            self.pending_images.push(packed);
        }
    }

    fn enqueue_path(&mut self, packed: PackedGlyphId) {
        if self.sent_paths.insert(packed) {
            self.pending_paths.push(packed);
        }
    }

    fn has_pending(&self) -> bool {
        !self.pending_images.is_empty() || !self.pending_paths.is_empty()
    }

    /// Serializes one strike block: key descriptor, handle, font metrics
    /// and every pending glyph record. Pending queues drain; sent sets are
    /// retained so nothing ships twice while the handle lives.
    fn write_pending(&mut self, w: &mut Writer<'_>) {
        let desc_bytes = self.key_descriptor.as_bytes();
        w.write_u32(desc_bytes.len() as u32);
        w.write_bytes(desc_bytes);
        w.write_u32(self.handle.to_u32());
        wire::write_font_metrics(w, &self.font_metrics);

        // One record per glyph; a glyph wanted both ways gets one record
        // carrying image and path together.
        let images = core::mem::take(&mut self.pending_images);
        let paths = core::mem::take(&mut self.pending_paths);
        let mut records: Vec<(PackedGlyphId, bool, bool)> =
            images.iter().map(|&packed| (packed, true, false)).collect();
        for &packed in &paths {
            match records.iter_mut().find(|record| record.0 == packed) {
                Some(record) => record.2 = true,
                None => records.push((packed, false, true)),
            }
        }

        w.write_u32(records.len() as u32);
        for (packed, want_image, want_path) in records {
            let metrics = self.glyph_metrics(packed);
            wire::write_glyph_metrics(w, packed, &metrics);
            let image = if want_image && !metrics.is_empty() {
                self.scaler.glyph_image(packed, &metrics)
            } else {
                None
            };
            match image {
                Some(data) => {
                    w.write_bool(true);
                    w.write_u32(data.len() as u32);
                    w.write_bytes(&data);
                }
                None => w.write_bool(false),
            }
            if want_path {
                w.write_bool(true);
                let path = self.scaler.glyph_path(packed.glyph_id());
                wire::write_outline(w, path.as_ref());
            } else {
                w.write_bool(false);
            }
        }
    }
}

/// Analyzes glyph runs where real fonts live and serializes glyph data
/// deltas for a [`StrikeClient`](super::StrikeClient) in another process.
///
/// The server never talks to the transport itself: the embedder calls
/// [`process_glyph_run`](Self::process_glyph_run) for everything a frame
/// draws, cuts a flush with [`write_strike_data`](Self::write_strike_data)
/// and ships the bytes however it likes.
pub struct StrikeServer {
    manager: Arc<dyn ServerDiscardableManager>,
    options: StrikeServerOptions,
    strikes: HashMap<StrikeDescriptor, RemoteStrike>,
    typefaces_seen: HashSet<TypefaceId>,
    pending_typefaces: Vec<WireTypeface>,
    epoch: u64,
}

impl StrikeServer {
    /// Creates a server with default options.
    pub fn new(manager: Arc<dyn ServerDiscardableManager>) -> Self {
        Self::with_options(manager, StrikeServerOptions::default())
    }

    /// Creates a server with explicit options.
    pub fn with_options(
        manager: Arc<dyn ServerDiscardableManager>,
        options: StrikeServerOptions,
    ) -> Self {
        Self {
            manager,
            options,
            strikes: HashMap::new(),
            typefaces_seen: HashSet::new(),
            pending_typefaces: Vec::new(),
            epoch: 0,
        }
    }

    /// Serializes the identity of `typeface` for explicit delivery.
    ///
    /// Typefaces referenced by glyph runs ride along in strike data
    /// automatically; this exists for embedders that hand typefaces to the
    /// client out of band, ahead of any text. Safe to call repeatedly.
    pub fn serialize_typeface(&mut self, typeface: &dyn Typeface) -> Vec<u8> {
        let wire_typeface = WireTypeface::from_typeface(typeface);
        self.typefaces_seen.insert(wire_typeface.id);
        let mut buf = Vec::new();
        wire_typeface.write(&mut Writer::new(&mut buf));
        buf
    }

    /// Records everything the client will need to draw `run`.
    ///
    /// `origin` is the device-space run origin and `transform` the linear
    /// part of the device transform. Small filled runs are tracked as mask
    /// strikes keyed by the full device setup; stroked runs and runs past
    /// [`mask_size_limit`](StrikeServerOptions::mask_size_limit) are
    /// tracked as outline strikes at the canonical size. Individual glyphs
    /// too large for a mask fall back to outlines within a mask run.
    pub fn process_glyph_run(
        &mut self,
        run: &GlyphRun<'_>,
        origin: (f32, f32),
        transform: Transform,
    ) {
        let device_size = run.text_size * transform.max_scale();
        if run.stroked || device_size > self.options.mask_size_limit {
            self.process_as_paths(run);
        } else {
            self.process_as_masks(run, origin, transform);
        }
    }

    fn process_as_masks(&mut self, run: &GlyphRun<'_>, origin: (f32, f32), transform: Transform) {
        let mut rec = StrikeRec::new(run.typeface.id(), run.text_size);
        rec.flags = run.flags;
        rec.transform = transform.rows();
        let descriptor = StrikeDescriptor::new(rec);
        let subpixel = run.flags.contains(ScalerFlags::SUBPIXEL_POSITIONING);
        let state = self.lock_or_create(descriptor, run.typeface);
        for (&glyph, &(x, y)) in run.glyphs.iter().zip(run.positions) {
            let packed = if subpixel {
                let (dx, dy) = transform.map(x, y);
                PackedGlyphId::quantize(glyph, origin.0 + dx, origin.1 + dy)
            } else {
                PackedGlyphId::from_glyph(glyph)
            };
            let metrics = state.glyph_metrics(packed);
            if metrics.width > MAX_MASK_DIMENSION || metrics.height > MAX_MASK_DIMENSION {
                // Too big to ship as pixels; the client draws the outline.
                state.enqueue_path(packed);
            } else {
                state.enqueue_image(packed);
            }
        }
    }

    fn process_as_paths(&mut self, run: &GlyphRun<'_>) {
        let mut rec = StrikeRec::new(run.typeface.id(), self.options.canonical_path_size);
        // Outlines are positioned exactly at draw time, so sub-pixel
        // placement never applies to them.
        rec.flags = run.flags.difference(ScalerFlags::SUBPIXEL_POSITIONING);
        let descriptor = StrikeDescriptor::new(rec);
        let state = self.lock_or_create(descriptor, run.typeface);
        for &glyph in run.glyphs {
            state.enqueue_path(PackedGlyphId::from_glyph(glyph));
        }
    }

    /// Returns the tracked strike for `descriptor` with its handle locked
    /// for this interval, rebuilding under a fresh handle if the client
    /// has discarded the old one.
    fn lock_or_create(
        &mut self,
        descriptor: StrikeDescriptor,
        typeface: &dyn Typeface,
    ) -> &mut RemoteStrike {
        self.epoch += 1;
        let epoch = self.epoch;

        // First contact with a typeface queues its identity so it lands in
        // the flush ahead of any strike that references it.
        if self.typefaces_seen.insert(typeface.id()) {
            self.pending_typefaces
                .push(WireTypeface::from_typeface(typeface));
        }

        if !self.strikes.contains_key(&descriptor) {
            self.drop_stalest_over(self.options.max_tracked_strikes.saturating_sub(1));
        }

        match self.strikes.entry(descriptor) {
            Entry::Occupied(mut entry) => {
                let reusable = {
                    let state = entry.get_mut();
                    state.last_used = epoch;
                    let locked = state.locked || self.manager.lock_handle(state.handle);
                    state.locked = locked;
                    locked
                };
                if !reusable {
                    // The client purged this strike; every sent set is
                    // stale, so start over under a new handle.
                    log::debug!("client discarded handle; rebuilding strike");
                    let state =
                        RemoteStrike::new(self.manager.as_ref(), typeface, entry.key(), epoch);
                    entry.insert(state);
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let state = RemoteStrike::new(self.manager.as_ref(), typeface, entry.key(), epoch);
                entry.insert(state)
            }
        }
    }

    /// Drops least recently used strikes until at most `limit` remain.
    fn drop_stalest_over(&mut self, limit: usize) {
        while self.strikes.len() > limit {
            let stalest = self
                .strikes
                .iter()
                .min_by_key(|(_, state)| state.last_used)
                .map(|(descriptor, _)| descriptor.clone());
            let Some(stalest) = stalest else { break };
            self.strikes.remove(&stalest);
            log::debug!(
                "dropped least recently used remote strike; {} tracked",
                self.strikes.len()
            );
        }
    }

    /// Serializes every pending typeface and glyph delta into `out` and
    /// ends the flush interval.
    ///
    /// The blob commits atomically on the client; an empty interval still
    /// produces a small valid blob. Handles stay locked until the flush is
    /// cut, so nothing the client holds for this interval can vanish
    /// between analysis and delivery.
    pub fn write_strike_data(&mut self, out: &mut Vec<u8>) {
        let mut w = Writer::new(out);
        w.write_u32(self.pending_typefaces.len() as u32);
        for wire_typeface in self.pending_typefaces.drain(..) {
            wire_typeface.write(&mut w);
        }

        // Deterministic block order regardless of map iteration.
        let mut dirty: Vec<&mut RemoteStrike> = self
            .strikes
            .values_mut()
            .filter(|state| state.has_pending())
            .collect();
        dirty.sort_by_key(|state| state.handle);
        w.write_u32(dirty.len() as u32);
        for state in dirty {
            state.write_pending(&mut w);
        }

        for state in self.strikes.values_mut() {
            state.locked = false;
        }
        log::debug!("flushed strike data: {} bytes", out.len());
    }

    /// Number of strikes currently tracked.
    pub fn tracked_strike_count(&self) -> usize {
        self.strikes.len()
    }

    /// The options this server was built with.
    pub fn options(&self) -> &StrikeServerOptions {
        &self.options
    }
}

impl fmt::Debug for StrikeServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrikeServer")
            .field("options", &self.options)
            .field("strikes", &self.strikes.len())
            .field("typefaces_seen", &self.typefaces_seen.len())
            .finish_non_exhaustive()
    }
}
