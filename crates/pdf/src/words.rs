//! Grouping of positioned glyphs into words and lines.
//!
//! A whitespace glyph, a jump off the baseline or a horizontal gap wider
//! than [`WORD_GAP`] of the font size ends the current word. Text object
//! boundaries do not: a word drawn in two `BT`/`ET` pieces stays one word
//! as long as the pieces touch.

use blackout_core::{BBox, PageWord};

/// Horizontal gap, as a fraction of the font size, that separates two words.
const WORD_GAP: f32 = 0.15;
/// Baseline offset, as a fraction of the font size, that starts a new line.
const LINE_SHIFT: f32 = 0.5;

/// Text and words of one page, in reading order.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub text: String,
    pub words: Vec<PageWord>,
}

/// A point on the baseline with the writing direction and font size there.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pen {
    pub x: f32,
    pub y: f32,
    pub dir: (f32, f32),
    pub size: f32,
}

impl Pen {
    /// `(along, across)` offset of a point relative to the pen.
    fn offset(&self, x: f32, y: f32) -> (f32, f32) {
        let (dx, dy) = (x - self.x, y - self.y);
        let along = dx * self.dir.0 + dy * self.dir.1;
        let across = self.dir.0 * dy - self.dir.1 * dx;
        (along, across)
    }

    fn same_line(&self, other: &Pen) -> bool {
        let (along, across) = self.offset(other.x, other.y);
        across.abs() <= LINE_SHIFT * self.size && along >= 0.0
    }
}

#[derive(Debug)]
struct PendingWord {
    text: String,
    bbox: BBox,
    anchor: Pen,
    block: u32,
}

#[derive(Debug, Default)]
pub(crate) struct WordCollector {
    words: Vec<PageWord>,
    text: String,
    pending: Option<PendingWord>,
    /// Where the previous glyph ended.
    pen: Option<Pen>,
    /// Start of the previously emitted word.
    last_anchor: Option<Pen>,
    block: u32,
    started_blocks: u32,
    line: u32,
    word: u32,
}

impl WordCollector {
    /// Starts a new text block. Words begun after this belong to it.
    pub fn begin_block(&mut self) {
        if self.started_blocks > 0 {
            self.block += 1;
        }
        self.started_blocks += 1;
    }

    /// Adds one glyph. `origin` and `end` are the pen before and after it.
    pub fn push_glyph(&mut self, text: &str, bbox: BBox, origin: Pen, end: Pen) {
        if let Some(pen) = self.pen {
            let (along, across) = pen.offset(origin.x, origin.y);
            let off_line = across.abs() > LINE_SHIFT * pen.size;
            let gap = along > WORD_GAP * pen.size || along < -pen.size;
            if off_line || gap {
                self.flush();
            }
        }

        if text.is_empty() {
            self.pen = Some(end);
            return;
        }

        if text.chars().all(char::is_whitespace) {
            self.flush();
            self.pen = Some(end);
            return;
        }

        match &mut self.pending {
            Some(word) => {
                word.text.push_str(text);
                word.bbox = word.bbox.union(&bbox);
            }
            None => {
                self.pending = Some(PendingWord {
                    text: text.to_string(),
                    bbox,
                    anchor: origin,
                    block: self.block,
                });
            }
        }
        self.pen = Some(end);
    }

    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let previous = self.last_anchor.zip(self.words.last().map(|w| w.block));
        let (block, separator) = match previous {
            None => {
                self.line = 0;
                self.word = 0;
                (pending.block, None)
            }
            // a word continuing the previous line stays in that line's block
            Some((prev, prev_block)) if prev.same_line(&pending.anchor) => {
                self.word += 1;
                (prev_block, Some(' '))
            }
            Some((_, prev_block)) => {
                self.line = if pending.block == prev_block { self.line + 1 } else { 0 };
                self.word = 0;
                (pending.block, Some('\n'))
            }
        };

        if let Some(sep) = separator {
            self.text.push(sep);
        }
        self.text.push_str(&pending.text);
        self.last_anchor = Some(pending.anchor);

        self.words.push(PageWord {
            text: pending.text,
            bbox: pending.bbox,
            block,
            line: self.line,
            word: self.word,
        });
    }

    pub fn finish(mut self) -> PageLayout {
        self.flush();
        PageLayout {
            text: self.text,
            words: self.words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(x: f32, y: f32) -> Pen {
        Pen { x, y, dir: (1.0, 0.0), size: 10.0 }
    }

    fn glyph_box(x: f32) -> BBox {
        BBox { x0: x, y0: 0.0, x1: x + 5.0, y1: 8.0 }
    }

    fn push(c: &mut WordCollector, text: &str, x: f32, y: f32) {
        c.push_glyph(text, glyph_box(x), pen(x, y), pen(x + 5.0, y));
    }

    #[test]
    fn collector_splits_on_space_and_gap() {
        let mut c = WordCollector::default();
        c.begin_block();
        push(&mut c, "H", 0.0, 0.0);
        push(&mut c, "i", 5.0, 0.0);
        c.push_glyph(" ", glyph_box(10.0), pen(10.0, 0.0), pen(13.0, 0.0));
        c.push_glyph("y", glyph_box(13.0), pen(13.0, 0.0), pen(18.0, 0.0));
        // 4pt gap at 10pt size: a TJ-style word break
        push(&mut c, "o", 22.0, 0.0);
        let layout = c.finish();

        let words: Vec<&str> = layout.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["Hi", "y", "o"]);
        assert_eq!(layout.text, "Hi y o");
        assert_eq!(layout.words[0].bbox, BBox { x0: 0.0, y0: 0.0, x1: 10.0, y1: 8.0 });
        assert_eq!(layout.words[2].word, 2);
    }

    #[test]
    fn collector_numbers_lines_and_blocks() {
        let mut c = WordCollector::default();
        c.begin_block();
        push(&mut c, "a", 0.0, 100.0);
        push(&mut c, "b", 0.0, 88.0);
        c.begin_block();
        push(&mut c, "c", 0.0, 50.0);
        let layout = c.finish();

        let ids: Vec<(u32, u32, u32)> = layout.words.iter().map(|w| (w.block, w.line, w.word)).collect();
        assert_eq!(ids, vec![(0, 0, 0), (0, 1, 0), (1, 0, 0)]);
        assert_eq!(layout.text, "a\nb\nc");
    }

    #[test]
    fn small_kerning_keeps_the_word_together() {
        let mut c = WordCollector::default();
        c.begin_block();
        push(&mut c, "A", 0.0, 0.0);
        push(&mut c, "V", 4.5, 0.0);
        let layout = c.finish();
        assert_eq!(layout.words.len(), 1);
        assert_eq!(layout.words[0].text, "AV");
    }

    #[test]
    fn word_continues_across_text_blocks() {
        let mut c = WordCollector::default();
        c.begin_block();
        push(&mut c, "J", 0.0, 0.0);
        push(&mut c, "o", 5.0, 0.0);
        c.begin_block();
        push(&mut c, "h", 10.0, 0.0);
        push(&mut c, "n", 15.0, 0.0);
        let layout = c.finish();

        assert_eq!(layout.text, "John");
        assert_eq!(layout.words.len(), 1);
        assert_eq!(layout.words[0].bbox, BBox { x0: 0.0, y0: 0.0, x1: 20.0, y1: 8.0 });
    }

    #[test]
    fn new_block_on_the_same_line_is_space_separated() {
        let mut c = WordCollector::default();
        c.begin_block();
        push(&mut c, "Dear", 0.0, 0.0);
        c.begin_block();
        push(&mut c, "John", 40.0, 0.0);
        c.begin_block();
        push(&mut c, "Regards", 0.0, -30.0);
        let layout = c.finish();

        assert_eq!(layout.text, "Dear John\nRegards");
        let ids: Vec<(u32, u32, u32)> = layout.words.iter().map(|w| (w.block, w.line, w.word)).collect();
        assert_eq!(ids, vec![(0, 0, 0), (0, 0, 1), (2, 0, 0)]);
    }
}
