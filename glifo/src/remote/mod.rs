// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-process glyph transport.
//!
//! The server side runs where real fonts live. It diffs glyph runs against
//! what it has already shipped and serializes typeface and glyph deltas
//! into byte blobs. The client side, typically sandboxed away from any
//! font engine, commits those blobs into a local [`StrikeCache`] behind
//! proxy typefaces, so rendering resolves glyph data with no font access.
//!
//! Liveness of shipped state is tracked per strike through discardable
//! handles: the server locks a handle into each flush, and learns from a
//! failed lock that the client has purged the state, at which point it
//! rebuilds under a fresh handle. The transport below the blobs is the
//! embedder's concern; delivery is assumed reliable, ordered and complete.
//!
//! [`StrikeCache`]: crate::cache::StrikeCache

mod client;
mod server;
mod wire;

pub use client::{ClientDiscardableManager, StrikeClient, TypefaceProxy};
pub use server::{
    DEFAULT_CANONICAL_PATH_SIZE, DEFAULT_MASK_SIZE_LIMIT, DEFAULT_MAX_TRACKED_STRIKES, GlyphRun,
    ServerDiscardableManager, StrikeServer, StrikeServerOptions, Transform,
};
pub use wire::ReadError;

/// Identity of one server-tracked cache line across the process boundary.
///
/// Ids are strictly increasing and never reused; zero never occurs and is
/// rejected on the wire. A handle begins locked, may be relocked any number
/// of times while the client retains the state, and is permanently dead
/// once the client deletes it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscardableHandleId(u32);

impl DiscardableHandleId {
    /// Wraps a raw id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw id.
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

/// What a client renderer was missing, reported through
/// [`ClientDiscardableManager::notify_cache_miss`].
///
/// Misses are telemetry, never control flow: every miss degrades to an
/// empty glyph and rendering continues.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheMissKind {
    /// Font-wide metrics were never delivered for a strike.
    FontMetrics = 0,
    /// Glyph metrics were absent and no loose match existed.
    GlyphMetrics = 1,
    /// A glyph image was absent and no loose match existed.
    GlyphImage = 2,
    /// A glyph path was absent and no loose match existed.
    GlyphPath = 3,
    /// Glyph metrics were absent; a loosely matching strike filled in.
    GlyphMetricsFallback = 4,
    /// A glyph path was absent; a loosely matching strike filled in.
    GlyphPathFallback = 5,
}

impl CacheMissKind {
    /// Every kind, in discriminant order.
    pub const ALL: [Self; 6] = [
        Self::FontMetrics,
        Self::GlyphMetrics,
        Self::GlyphImage,
        Self::GlyphPath,
        Self::GlyphMetricsFallback,
        Self::GlyphPathFallback,
    ];
}
