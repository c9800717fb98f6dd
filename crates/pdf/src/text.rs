//! Positioned word extraction from page content streams.
//!
//! The content stream is replayed with just enough of the graphics and text
//! state to know where every glyph lands. Form XObjects are replayed in
//! place with their own matrix and resources. Glyph positions go to a
//! `WordCollector`, which groups them into words.

use blackout_core::BBox;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

use crate::fonts::{FontInfo, Glyph};
use crate::utils::{
    get_matrix, get_number, get_page_content, get_stream_content, multiply, page_resources,
    resolve, resolve_array, resolve_dict, resource_dict, transform_point, translate, Matrix,
    IDENTITY,
};
use crate::words::{PageLayout, Pen, WordCollector};

/// Nesting limit for forms drawing forms.
const MAX_FORM_DEPTH: usize = 8;

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Named resources visible to the content being replayed.
#[derive(Clone, Copy)]
struct Scope<'a> {
    fonts: Option<&'a Dictionary>,
    xobjects: Option<&'a Dictionary>,
}

impl<'a> Scope<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>) -> Self {
        Self {
            fonts: resource_dict(doc, resources, b"Font"),
            xobjects: resource_dict(doc, resources, b"XObject"),
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    scope: Scope<'a>,
    fonts: HashMap<Vec<u8>, FontInfo>,
    fallback_font: FontInfo,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    collector: WordCollector,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, page_id: ObjectId) -> Self {
        Self {
            doc,
            scope: Scope::new(doc, page_resources(doc, page_id)),
            fonts: HashMap::new(),
            fallback_font: FontInfo::default(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            collector: WordCollector::default(),
        }
    }

    fn set_font(&mut self, name: &[u8], size: f32) {
        self.state.font = Some(name.to_vec());
        self.state.font_size = size;

        if self.fonts.contains_key(name) {
            return;
        }
        let info = self
            .scope
            .fonts
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|obj| resolve_dict(self.doc, obj))
            .map(|dict| FontInfo::from_dict(self.doc, dict));
        match info {
            Some(info) => {
                self.fonts.insert(name.to_vec(), info);
            }
            None => {
                log::debug!(
                    "[Extract] font /{} not found in resources, estimating metrics",
                    String::from_utf8_lossy(name)
                );
            }
        }
    }

    fn move_text(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translate(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_text(0.0, -self.state.leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let font = match &self.state.font {
            Some(name) => self.fonts.get(name).unwrap_or(&self.fallback_font),
            None => &self.fallback_font,
        };
        let glyphs: Vec<(Glyph, f32)> = font
            .decode(bytes)
            .into_iter()
            .map(|g| {
                let w = font.width(&g) / 1000.0;
                (g, w)
            })
            .collect();
        let (ascent, descent) = (font.ascent, font.descent);
        let single_byte = font.is_single_byte();

        let state = &self.state;
        let fs = state.font_size;
        let th = state.horizontal_scaling;

        for (glyph, w0) in glyphs {
            let m = multiply(&self.text_matrix, &state.ctm);

            let mut advance = w0 * fs + state.char_spacing;
            if single_byte && glyph.code == 32 {
                advance += state.word_spacing;
            }
            advance *= th;

            let glyph_width = w0 * fs * th;
            let bottom = state.rise + descent * fs;
            let top = state.rise + ascent * fs;
            let corners = [
                transform_point(&m, 0.0, bottom),
                transform_point(&m, glyph_width, bottom),
                transform_point(&m, 0.0, top),
                transform_point(&m, glyph_width, top),
            ];
            let mut bbox = BBox::from_corners(corners[0].0, corners[0].1, corners[3].0, corners[3].1);
            for (x, y) in &corners[1..3] {
                bbox = bbox.union(&BBox::from_corners(*x, *y, *x, *y));
            }

            let dir = normalize(m[0], m[1]);
            let size = (fs * (m[2] * m[2] + m[3] * m[3]).sqrt()).abs().max(0.01);
            let (ox, oy) = transform_point(&m, 0.0, state.rise);
            let (ex, ey) = transform_point(&m, advance, state.rise);

            self.collector.push_glyph(
                &glyph.text,
                bbox,
                Pen { x: ox, y: oy, dir, size },
                Pen { x: ex, y: ey, dir, size },
            );

            self.text_matrix = multiply(&translate(advance, 0.0), &self.text_matrix);
        }
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    if let Some(n) = get_number(other) {
                        let tx = -n / 1000.0 * self.state.font_size * self.state.horizontal_scaling;
                        self.text_matrix = multiply(&translate(tx, 0.0), &self.text_matrix);
                    }
                }
            }
        }
    }

    fn run(mut self, content: &Content) -> PageLayout {
        self.run_operations(&content.operations, 0);
        self.collector.finish()
    }

    /// Replays a form XObject in place. Anything else drawn with `Do`
    /// (images, mostly) carries no text and is skipped.
    fn invoke_xobject(&mut self, name: &[u8], depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            log::debug!(
                "[Extract] form /{} nested too deep, skipped",
                String::from_utf8_lossy(name)
            );
            return;
        }
        let doc = self.doc;
        let stream = match self
            .scope
            .xobjects
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| resolve(doc, obj))
        {
            Some(Object::Stream(stream)) => stream,
            _ => return,
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(kind)) if kind == b"Form") {
            return;
        }

        let data = get_stream_content(stream);
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                log::warn!(
                    "[Extract] form /{} has unreadable content: {}",
                    String::from_utf8_lossy(name),
                    e
                );
                return;
            }
        };
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve_array(doc, obj))
            .and_then(|items| get_matrix(items))
            .unwrap_or(IDENTITY);
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj));

        // a form with its own resources may reuse font names for other fonts
        let outer_scope = self.scope;
        let outer_fonts = resources.map(|res| {
            self.scope = Scope::new(doc, Some(res));
            std::mem::take(&mut self.fonts)
        });
        let outer_state = self.state.clone();
        let outer_stack = self.stack.len();
        let outer_text = (self.text_matrix, self.line_matrix);

        self.state.ctm = multiply(&matrix, &self.state.ctm);
        self.run_operations(&content.operations, depth + 1);

        self.stack.truncate(outer_stack);
        self.state = outer_state;
        (self.text_matrix, self.line_matrix) = outer_text;
        self.scope = outer_scope;
        if let Some(fonts) = outer_fonts {
            self.fonts = fonts;
        }
    }

    fn run_operations(&mut self, operations: &[Operation], depth: usize) {
        for op in operations {
            let operands = op.operands.as_slice();
            let num = |i: usize| operands.get(i).and_then(get_number);

            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = get_matrix(operands) {
                        self.state.ctm = multiply(&m, &self.state.ctm);
                    }
                }
                "BT" => {
                    self.text_matrix = IDENTITY;
                    self.line_matrix = IDENTITY;
                    self.collector.begin_block();
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) = (operands.first(), num(1)) {
                        self.set_font(name, size);
                    }
                }
                "Tc" => {
                    if let Some(v) = num(0) {
                        self.state.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = num(0) {
                        self.state.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = num(0) {
                        self.state.horizontal_scaling = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(v) = num(0) {
                        self.state.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(v) = num(0) {
                        self.state.rise = v;
                    }
                }
                "Td" => {
                    if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                        self.move_text(tx, ty);
                    }
                }
                "TD" => {
                    if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                        self.state.leading = -ty;
                        self.move_text(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = get_matrix(operands) {
                        self.text_matrix = m;
                        self.line_matrix = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show_array(items);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                        self.state.word_spacing = aw;
                        self.state.char_spacing = ac;
                    }
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.invoke_xobject(name, depth);
                    }
                }
                _ => {}
            }
        }
    }
}

fn normalize(x: f32, y: f32) -> (f32, f32) {
    let len = (x * x + y * y).sqrt();
    if len > f32::EPSILON {
        (x / len, y / len)
    } else {
        (1.0, 0.0)
    }
}

/// Replays the content of `page_id` and returns its words and text.
pub fn extract_layout(doc: &Document, page_id: ObjectId) -> Result<PageLayout, String> {
    let data = get_page_content(doc, page_id)?;
    if data.is_empty() {
        return Ok(PageLayout::default());
    }
    let content = Content::decode(&data).map_err(|e| e.to_string())?;
    Ok(Interpreter::new(doc, page_id).run(&content))
}

