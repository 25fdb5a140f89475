// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph outlines recorded as pen commands.

use skrifa::outline::OutlinePen;

/// A single pen command within an [`Outline`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OutlineElement {
    /// Start a new subpath at the given point.
    MoveTo {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Straight line to the given point.
    LineTo {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Quadratic bezier to `(x, y)` with one control point.
    QuadTo {
        /// Control point x.
        cx0: f32,
        /// Control point y.
        cy0: f32,
        /// End point x.
        x: f32,
        /// End point y.
        y: f32,
    },
    /// Cubic bezier to `(x, y)` with two control points.
    CurveTo {
        /// First control point x.
        cx0: f32,
        /// First control point y.
        cy0: f32,
        /// Second control point x.
        cx1: f32,
        /// Second control point y.
        cy1: f32,
        /// End point x.
        x: f32,
        /// End point y.
        y: f32,
    },
    /// Close the current subpath.
    Close,
}

/// A glyph outline captured from a scaler.
///
/// Outlines are recorded through the [`OutlinePen`] impl, so any backend
/// that can draw into a pen can produce one directly. An outline with no
/// elements is a valid "blank glyph" shape; strikes additionally track
/// whether a glyph has an outline at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    elements: Vec<OutlineElement>,
}

impl Outline {
    /// Creates an empty outline.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no commands have been recorded.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The recorded commands in order.
    pub fn elements(&self) -> &[OutlineElement] {
        &self.elements
    }

    /// In-memory cost of the recorded commands, used for cache accounting.
    pub fn byte_cost(&self) -> usize {
        self.elements.len() * core::mem::size_of::<OutlineElement>()
    }
}

impl OutlinePen for Outline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.elements.push(OutlineElement::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.elements.push(OutlineElement::LineTo { x, y });
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.elements.push(OutlineElement::QuadTo { cx0, cy0, x, y });
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.elements.push(OutlineElement::CurveTo {
            cx0,
            cy0,
            cx1,
            cy1,
            x,
            y,
        });
    }

    fn close(&mut self) {
        self.elements.push(OutlineElement::Close);
    }
}
