// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for the integration suite.

mod font;
mod manager;
mod renderer;

pub(crate) use font::{HUGE_GLYPH, TestTypeface};
pub(crate) use manager::TrackingManager;
pub(crate) use renderer::{CANVAS_SIZE, raster_glyphs};
