//! Document capability surface and the per-page word model.
//!
//! Every PDF backend implements [`RedactableDocument`]; the pipeline only ever
//! talks to the document through this trait.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Characters stripped from the end of a word before matching.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Axis-aligned box in page user space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Builds a box from two arbitrary corners.
    pub fn from_corners(ax: f32, ay: f32, bx: f32, by: f32) -> Self {
        Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A word as the PDF backend reports it, before trimming.
///
/// Mirrors the `(x0, y0, x1, y1, text, block, line, word)` tuple of the
/// extraction layer. `block`, `line` and `word` are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWord {
    pub text: String,
    pub bbox: BBox,
    pub block: u32,
    pub line: u32,
    pub word: u32,
}

/// A trimmed word located on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    /// Page number, starting at 1
    pub page: u32,
    pub text: String,
    pub bbox: BBox,
}

impl WordRecord {
    pub fn from_page_word(page: u32, word: &PageWord) -> Self {
        Self {
            page,
            text: trim_punctuation(&word.text).to_string(),
            bbox: word.bbox,
        }
    }
}

impl fmt::Display for WordRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{page: {}, text: {:?}, position: ({}, {}, {}, {})}}",
            self.page, self.text, self.bbox.x0, self.bbox.y0, self.bbox.x1, self.bbox.y1
        )
    }
}

/// Text and words of one page.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub text: String,
    pub words: Vec<WordRecord>,
}

/// Capability surface a PDF backend has to provide.
///
/// Pages are addressed by zero-based index; page numbers shown to users and
/// stored in [`WordRecord`] are `index + 1`.
pub trait RedactableDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Plain text of a page.
    fn page_text(&self, page_index: usize) -> Result<String>;

    /// Words of a page in extraction order.
    fn page_words(&self, page_index: usize) -> Result<Vec<PageWord>>;

    /// Text and words of a page in one call. Backends that derive both from
    /// the same parse should override this.
    fn read_page(&self, page_index: usize) -> Result<(String, Vec<PageWord>)> {
        Ok((self.page_text(page_index)?, self.page_words(page_index)?))
    }

    /// Paints opaque black rectangles over the given boxes.
    fn fill_rects(&mut self, page_index: usize, rects: &[BBox]) -> Result<()>;

    /// Serializes the whole document.
    fn save_to_bytes(&mut self) -> Result<Vec<u8>>;
}

/// Removes the trailing run of sentence punctuation.
///
/// Only the end of the word is touched: `"U.S."` becomes `"U.S"`.
pub fn trim_punctuation(text: &str) -> &str {
    text.trim_end_matches(TRAILING_PUNCTUATION)
}

/// Reads the text and trimmed words of a page.
pub fn extract_page<D: RedactableDocument + ?Sized>(
    doc: &D,
    page_index: usize,
) -> Result<ExtractedPage> {
    let page_number = page_index as u32 + 1;
    let (text, raw_words) = doc.read_page(page_index)?;
    let words = raw_words
        .iter()
        .map(|w| WordRecord::from_page_word(page_number, w))
        .collect::<Vec<_>>();

    log::debug!(
        "[Extract] page {}: {} chars, {} words",
        page_number,
        text.chars().count(),
        words.len()
    );

    Ok(ExtractedPage { text, words })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_punctuation_run() {
        assert_eq!(trim_punctuation("Smith,"), "Smith");
        assert_eq!(trim_punctuation("U.S."), "U.S");
        assert_eq!(trim_punctuation("wait?!..."), "wait");
        assert_eq!(trim_punctuation("john@x.com."), "john@x.com");
    }

    #[test]
    fn keeps_internal_punctuation_and_case() {
        assert_eq!(trim_punctuation("O'Neil"), "O'Neil");
        assert_eq!(trim_punctuation("(555)"), "(555)");
        assert_eq!(trim_punctuation("a.b,c"), "a.b,c");
        assert_eq!(trim_punctuation("..."), "");
    }

    #[test]
    fn bbox_from_corners_normalizes() {
        let bbox = BBox::from_corners(10.0, 20.0, 5.0, 2.0);
        assert_eq!(bbox, BBox { x0: 5.0, y0: 2.0, x1: 10.0, y1: 20.0 });
        assert_eq!(bbox.width(), 5.0);
        assert_eq!(bbox.height(), 18.0);
    }

    #[test]
    fn word_record_display() {
        let record = WordRecord {
            page: 2,
            text: "Doe".into(),
            bbox: BBox { x0: 1.0, y0: 2.0, x1: 3.5, y1: 4.0 },
        };
        assert_eq!(
            record.to_string(),
            "{page: 2, text: \"Doe\", position: (1, 2, 3.5, 4)}"
        );
    }
}
