//! Font metrics and text decoding for word extraction.
//!
//! Only what is needed to place words is read: glyph widths, ascent/descent
//! and the code → Unicode mapping. Glyph outlines are never touched.

use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

use crate::cmap::ToUnicode;
use crate::standard14::standard_widths;
use crate::utils::{get_number, get_stream_content, resolve, resolve_array, resolve_dict};

const DEFAULT_ASCENT: f32 = 0.8;
const DEFAULT_DESCENT: f32 = -0.2;
const COURIER_WIDTH: f32 = 600.0;

/// A decoded glyph: its character code and the text it stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Bytes per character code (1 for simple fonts, 2 for Type0).
    code_len: usize,
    /// Widths in glyph space (1/1000 em).
    widths: HashMap<u32, f32>,
    default_width: Option<f32>,
    monospace: bool,
    to_unicode: Option<ToUnicode>,
    /// Fraction of the font size above the baseline.
    pub ascent: f32,
    /// Fraction of the font size below the baseline (negative).
    pub descent: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            code_len: 1,
            widths: HashMap::new(),
            default_width: None,
            monospace: false,
            to_unicode: None,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }
}

impl FontInfo {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let mut info = FontInfo::default();

        let subtype = name_of(font.get(b"Subtype").ok());
        let base_font = name_of(font.get(b"BaseFont").ok()).unwrap_or_default();
        info.monospace = base_font.contains("Courier");

        if let Some(Object::Stream(stream)) = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj))
        {
            let cmap = ToUnicode::parse(&get_stream_content(stream));
            if !cmap.is_empty() {
                info.to_unicode = Some(cmap);
            }
        }

        if subtype.as_deref() == Some("Type0") {
            info.code_len = 2;
            info.default_width = Some(1000.0);
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| resolve_array(doc, obj))
                .and_then(|arr| arr.first())
                .and_then(|obj| resolve_dict(doc, obj));
            if let Some(cid_font) = descendant {
                if let Some(dw) = cid_font.get(b"DW").ok().and_then(get_number) {
                    info.default_width = Some(dw);
                }
                if let Some(w) = cid_font.get(b"W").ok().and_then(|obj| resolve_array(doc, obj)) {
                    read_cid_widths(doc, w, &mut info.widths);
                }
                info.read_descriptor(doc, cid_font);
            }
        } else {
            let first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(get_number)
                .unwrap_or(0.0) as u32;
            match font.get(b"Widths").ok().and_then(|obj| resolve_array(doc, obj)) {
                Some(widths) => {
                    for (i, w) in widths.iter().enumerate() {
                        if let Some(width) = resolve(doc, w).and_then(get_number) {
                            info.widths.insert(first_char + i as u32, width);
                        }
                    }
                }
                None => {
                    if let Some(standard) = standard_widths(&base_font) {
                        info.widths.extend(standard);
                    }
                }
            }
            info.read_descriptor(doc, font);
        }

        info
    }

    fn read_descriptor(&mut self, doc: &Document, font: &Dictionary) {
        let Some(descriptor) = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
        else {
            return;
        };

        let ascent = descriptor.get(b"Ascent").ok().and_then(get_number);
        let descent = descriptor.get(b"Descent").ok().and_then(get_number);
        if let (Some(a), Some(d)) = (ascent, descent) {
            if a > 0.0 && d <= 0.0 && a - d > 0.0 {
                self.ascent = a / 1000.0;
                self.descent = d / 1000.0;
            }
        }
        if self.default_width.is_none() {
            self.default_width = descriptor.get(b"MissingWidth").ok().and_then(get_number);
        }
        if let Some(flags) = descriptor.get(b"Flags").ok().and_then(get_number) {
            // bit 1: FixedPitch
            if (flags as u32) & 1 == 1 {
                self.monospace = true;
            }
        }
    }

    /// Word spacing only applies to single-byte code 32.
    pub fn is_single_byte(&self) -> bool {
        self.code_len == 1
    }

    /// Splits a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        bytes
            .chunks(self.code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                let text = match self.to_unicode.as_ref().and_then(|cmap| cmap.get(code)) {
                    Some(mapped) => mapped.to_string(),
                    None => fallback_text(code, chunk.len()),
                };
                Glyph { code, text }
            })
            .collect()
    }

    /// Advance width of a glyph in glyph space (1/1000 em).
    pub fn width(&self, glyph: &Glyph) -> f32 {
        if let Some(w) = self.widths.get(&glyph.code) {
            return *w;
        }
        if let Some(w) = self.default_width {
            if w > 0.0 {
                return w;
            }
        }
        if self.monospace {
            return COURIER_WIDTH;
        }
        estimate_width(glyph)
    }
}

/// Single-byte codes fall back to Latin-1; wider codes are taken as Unicode.
fn fallback_text(code: u32, len: usize) -> String {
    if len == 1 {
        return match code {
            0x00..=0x1F => String::new(),
            _ => char::from(code as u8).to_string(),
        };
    }
    char::from_u32(code)
        .filter(|c| !c.is_control())
        .map(|c| c.to_string())
        .unwrap_or_default()
}

/// Rough advance when the font carries no metrics.
fn estimate_width(glyph: &Glyph) -> f32 {
    match glyph.text.chars().next() {
        Some(' ') => 250.0,
        Some(c) if c.is_ascii() => 550.0,
        Some(_) => 1000.0,
        None => 500.0,
    }
}

/// `W` array: `c [w1 w2 ...]` and `cfirst clast w` forms.
fn read_cid_widths(doc: &Document, w: &[Object], out: &mut HashMap<u32, f32>) {
    let mut i = 0;
    while i < w.len() {
        let Some(first) = resolve(doc, &w[i]).and_then(get_number) else {
            break;
        };
        match w.get(i + 1).and_then(|obj| resolve(doc, obj)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = resolve(doc, width).and_then(get_number) {
                        out.insert(first as u32 + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    get_number(last),
                    w.get(i + 2).and_then(|obj| resolve(doc, obj)).and_then(get_number),
                ) else {
                    break;
                };
                for code in first as u32..=last as u32 {
                    out.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    match obj? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}
