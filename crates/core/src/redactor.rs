//! Blacks out the words of a page that appear in its redact set.
//!
//! This is a visual redaction: rectangles are painted over the glyphs, the
//! text itself stays in the content stream and can still be extracted.

use crate::document::{BBox, RedactableDocument, WordRecord};
use crate::entities::RedactSet;
use crate::Result;

/// Words whose trimmed text matches a redact-set token, ignoring case.
pub fn matching_words<'a>(words: &'a [WordRecord], redact_set: &RedactSet) -> Vec<&'a WordRecord> {
    if redact_set.is_empty() {
        return Vec::new();
    }
    let matcher = redact_set.matcher();
    words.iter().filter(|w| matcher.matches(&w.text)).collect()
}

/// Paints a black box over every matching word and returns how many were drawn.
pub fn redact_page<D: RedactableDocument + ?Sized>(
    doc: &mut D,
    page_index: usize,
    words: &[WordRecord],
    redact_set: &RedactSet,
) -> Result<usize> {
    let hits = matching_words(words, redact_set);
    if hits.is_empty() {
        return Ok(0);
    }

    for word in &hits {
        log::debug!(
            "[Redact] page {}: {:?} at ({:.1}, {:.1}, {:.1}, {:.1})",
            word.page,
            word.text,
            word.bbox.x0,
            word.bbox.y0,
            word.bbox.x1,
            word.bbox.y1
        );
    }

    let rects: Vec<BBox> = hits.iter().map(|w| w.bbox).collect();
    doc.fill_rects(page_index, &rects)?;
    Ok(rects.len())
}
