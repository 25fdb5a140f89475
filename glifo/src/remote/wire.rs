// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte-level encoding shared by the strike server and client.
//!
//! Everything on the wire is little-endian and length-prefixed. The
//! reader is fully bounds checked and never panics on hostile input;
//! any structural problem surfaces as a [`ReadError`].

use core::fmt;

use skrifa::outline::OutlinePen;

use crate::glyph::{GlyphMetrics, MaskFormat, PackedGlyphId};
use crate::outline::{Outline, OutlineElement};
use crate::scaler::FontMetrics;
use crate::typeface::{Slant, Typeface, TypefaceId, TypefaceStyle};

/// An error while decoding a serialized typeface or strike blob.
///
/// Decoding is all or nothing: when any of these is returned, the
/// receiving cache has not been touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// A read ran past the end of the blob.
    OutOfBounds,
    /// An enum discriminant byte had no defined meaning.
    InvalidFormat(u8),
    /// A discardable handle id was zero.
    InvalidHandle,
    /// A typeface id was zero.
    InvalidTypefaceId,
    /// A strike referenced a typeface id never delivered to this client.
    UnknownTypeface(TypefaceId),
    /// A structurally invalid field, described briefly.
    MalformedData(&'static str),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "read past the end of the data"),
            Self::InvalidFormat(value) => write!(f, "invalid format discriminant {value}"),
            Self::InvalidHandle => write!(f, "discardable handle id was zero"),
            Self::InvalidTypefaceId => write!(f, "typeface id was zero"),
            Self::UnknownTypeface(id) => {
                write!(f, "strike referenced unknown typeface {}", id.to_u32())
            }
            Self::MalformedData(detail) => write!(f, "malformed data: {detail}"),
        }
    }
}

impl std::error::Error for ReadError {}

/// Bounds-checked little-endian cursor over a received blob.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, at: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self.at.checked_add(len).ok_or(ReadError::OutOfBounds)?;
        if end > self.data.len() {
            return Err(ReadError::OutOfBounds);
        }
        let bytes = &self.data[self.at..end];
        self.at = end;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ReadError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(self.read_u16()? as i16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ReadError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, ReadError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a bool encoded as a single byte, rejecting anything but 0 or 1.
    pub(crate) fn read_bool(&mut self) -> Result<bool, ReadError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(ReadError::InvalidFormat(value)),
        }
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        self.take(len)
    }

    /// Fails unless every byte has been consumed.
    pub(crate) fn finish(&self) -> Result<(), ReadError> {
        if self.at == self.data.len() {
            Ok(())
        } else {
            Err(ReadError::MalformedData("trailing bytes"))
        }
    }
}

/// Little-endian append-only writer over a caller-owned buffer.
pub(crate) struct Writer<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub(crate) fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// The slice of typeface identity that crosses the process boundary.
///
/// Enough to answer style queries and bound glyph ids on the client, and
/// nothing more; actual font data never leaves the server.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct WireTypeface {
    pub(crate) id: TypefaceId,
    pub(crate) glyph_count: u32,
    pub(crate) style: TypefaceStyle,
    pub(crate) fixed_pitch: bool,
}

impl WireTypeface {
    pub(crate) fn from_typeface(typeface: &dyn Typeface) -> Self {
        Self {
            id: typeface.id(),
            glyph_count: typeface.glyph_count(),
            style: typeface.style(),
            fixed_pitch: typeface.is_fixed_pitch(),
        }
    }

    pub(crate) fn write(&self, w: &mut Writer<'_>) {
        w.write_u32(self.id.to_u32());
        w.write_u32(self.glyph_count);
        w.write_f32(self.style.weight);
        w.write_f32(self.style.width);
        w.write_u8(self.style.slant.to_u8());
        w.write_bool(self.fixed_pitch);
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Result<Self, ReadError> {
        let id = r.read_u32()?;
        if id == 0 {
            return Err(ReadError::InvalidTypefaceId);
        }
        let glyph_count = r.read_u32()?;
        let weight = r.read_f32()?;
        let width = r.read_f32()?;
        let slant_bits = r.read_u8()?;
        let slant = Slant::from_u8(slant_bits).ok_or(ReadError::InvalidFormat(slant_bits))?;
        let fixed_pitch = r.read_bool()?;
        Ok(Self {
            id: TypefaceId::new(id),
            glyph_count,
            style: TypefaceStyle {
                weight,
                width,
                slant,
            },
            fixed_pitch,
        })
    }
}

pub(crate) fn write_font_metrics(w: &mut Writer<'_>, metrics: &FontMetrics) {
    w.write_f32(metrics.ascent);
    w.write_f32(metrics.descent);
    w.write_f32(metrics.leading);
    w.write_f32(metrics.avg_char_width);
    w.write_f32(metrics.x_height);
    w.write_f32(metrics.cap_height);
}

pub(crate) fn read_font_metrics(r: &mut Reader<'_>) -> Result<FontMetrics, ReadError> {
    Ok(FontMetrics {
        ascent: r.read_f32()?,
        descent: r.read_f32()?,
        leading: r.read_f32()?,
        avg_char_width: r.read_f32()?,
        x_height: r.read_f32()?,
        cap_height: r.read_f32()?,
    })
}

pub(crate) fn write_glyph_metrics(
    w: &mut Writer<'_>,
    packed: PackedGlyphId,
    metrics: &GlyphMetrics,
) {
    w.write_u32(packed.to_bits());
    w.write_f32(metrics.advance_x);
    w.write_f32(metrics.advance_y);
    w.write_u16(metrics.width);
    w.write_u16(metrics.height);
    w.write_i16(metrics.left);
    w.write_i16(metrics.top);
    w.write_u8(metrics.format.to_u8());
}

pub(crate) fn read_glyph_metrics(
    r: &mut Reader<'_>,
) -> Result<(PackedGlyphId, GlyphMetrics), ReadError> {
    let packed_bits = r.read_u32()?;
    let packed = PackedGlyphId::from_bits(packed_bits)
        .ok_or(ReadError::MalformedData("packed glyph id"))?;
    let advance_x = r.read_f32()?;
    let advance_y = r.read_f32()?;
    let width = r.read_u16()?;
    let height = r.read_u16()?;
    let left = r.read_i16()?;
    let top = r.read_i16()?;
    let format_bits = r.read_u8()?;
    let format = MaskFormat::from_u8(format_bits).ok_or(ReadError::InvalidFormat(format_bits))?;
    Ok((
        packed,
        GlyphMetrics {
            advance_x,
            advance_y,
            width,
            height,
            left,
            top,
            format,
        },
    ))
}

const MOVE_TO: u8 = 0;
const LINE_TO: u8 = 1;
const QUAD_TO: u8 = 2;
const CURVE_TO: u8 = 3;
const CLOSE: u8 = 4;

/// Writes an optional outline. `None` becomes a zero length prefix, which
/// the client reads back as "computed and absent". A present outline with
/// no elements is distinct from `None`.
pub(crate) fn write_outline(w: &mut Writer<'_>, outline: Option<&Outline>) {
    let Some(outline) = outline else {
        w.write_u32(0);
        return;
    };
    let mut body = Vec::new();
    {
        let mut bw = Writer::new(&mut body);
        bw.write_u32(outline.elements().len() as u32);
        for element in outline.elements() {
            match *element {
                OutlineElement::MoveTo { x, y } => {
                    bw.write_u8(MOVE_TO);
                    bw.write_f32(x);
                    bw.write_f32(y);
                }
                OutlineElement::LineTo { x, y } => {
                    bw.write_u8(LINE_TO);
                    bw.write_f32(x);
                    bw.write_f32(y);
                }
                OutlineElement::QuadTo { cx0, cy0, x, y } => {
                    bw.write_u8(QUAD_TO);
                    bw.write_f32(cx0);
                    bw.write_f32(cy0);
                    bw.write_f32(x);
                    bw.write_f32(y);
                }
                OutlineElement::CurveTo {
                    cx0,
                    cy0,
                    cx1,
                    cy1,
                    x,
                    y,
                } => {
                    bw.write_u8(CURVE_TO);
                    bw.write_f32(cx0);
                    bw.write_f32(cy0);
                    bw.write_f32(cx1);
                    bw.write_f32(cy1);
                    bw.write_f32(x);
                    bw.write_f32(y);
                }
                OutlineElement::Close => bw.write_u8(CLOSE),
            }
        }
    }
    w.write_u32(body.len() as u32);
    w.write_bytes(&body);
}

/// Reads an optional outline written by [`write_outline`]. The element
/// stream must consume its byte length exactly.
pub(crate) fn read_outline(r: &mut Reader<'_>) -> Result<Option<Outline>, ReadError> {
    let byte_len = r.read_u32()? as usize;
    if byte_len == 0 {
        return Ok(None);
    }
    let mut body = Reader::new(r.read_bytes(byte_len)?);
    let count = body.read_u32()?;
    let mut outline = Outline::new();
    for _ in 0..count {
        let tag = body.read_u8()?;
        match tag {
            MOVE_TO => {
                let x = body.read_f32()?;
                let y = body.read_f32()?;
                outline.move_to(x, y);
            }
            LINE_TO => {
                let x = body.read_f32()?;
                let y = body.read_f32()?;
                outline.line_to(x, y);
            }
            QUAD_TO => {
                let cx0 = body.read_f32()?;
                let cy0 = body.read_f32()?;
                let x = body.read_f32()?;
                let y = body.read_f32()?;
                outline.quad_to(cx0, cy0, x, y);
            }
            CURVE_TO => {
                let cx0 = body.read_f32()?;
                let cy0 = body.read_f32()?;
                let cx1 = body.read_f32()?;
                let cy1 = body.read_f32()?;
                let x = body.read_f32()?;
                let y = body.read_f32()?;
                outline.curve_to(cx0, cy0, cx1, cy1, x, y);
            }
            _ => return Err(ReadError::InvalidFormat(tag)),
        }
    }
    body.finish()?;
    Ok(Some(outline))
}
