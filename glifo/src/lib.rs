// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph strike caching with a cross-process remote transport.
//!
//! The core of the crate is [`StrikeCache`], a budgeted cache of strikes.
//! A strike holds every rendering result, metrics, images and outlines,
//! computed for one scaler configuration, and is checked out exclusively
//! while a renderer works with it. Font backends plug in beneath it through
//! the [`Typeface`] and [`ScalerContext`] traits.
//!
//! The [`remote`] module moves strike data between processes: a server
//! with font access diffs glyph runs and serializes deltas, and a client
//! commits them into its local cache behind proxy typefaces, letting a
//! sandboxed process draw text it could never rasterize itself.

mod cache;
mod descriptor;
mod glyph;
mod outline;
mod scaler;
mod strike;
mod typeface;

pub mod remote;

pub use skrifa;
pub use skrifa::GlyphId;

pub use cache::{
    DEFAULT_BYTE_LIMIT, DEFAULT_COUNT_LIMIT, ExclusiveStrike, MIN_BYTE_LIMIT, StrikeCache,
    StrikePinner,
};
pub use descriptor::{ScalerFlags, StrikeDescriptor, StrikeRec};
pub use glyph::{Glyph, GlyphMetrics, MaskFormat, PackedGlyphId, SUBPIXEL_BUCKETS};
pub use outline::{Outline, OutlineElement};
pub use scaler::{FontMetrics, ScalerContext};
pub use strike::Strike;
pub use typeface::{Slant, Typeface, TypefaceId, TypefaceStyle};
