//! In-memory document and scripted classifier used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::classifier::{ClassifyError, EntityClassifier};
use crate::document::{BBox, PageWord, RedactableDocument};
use crate::entities::{EntityFields, EntityRecord};
use crate::{CoreError, Result};

struct MemoryPage {
    text: String,
    words: Vec<PageWord>,
    filled: Vec<BBox>,
}

/// One line of words per page, each word 10pt wide with a 5pt gap.
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
    fail_save: bool,
    saves: usize,
}

impl MemoryDocument {
    pub fn from_pages(texts: &[&str]) -> Self {
        let pages = texts
            .iter()
            .map(|text| {
                let words = text
                    .split_whitespace()
                    .enumerate()
                    .map(|(i, w)| {
                        let x0 = i as f32 * 15.0;
                        PageWord {
                            text: w.to_string(),
                            bbox: BBox { x0, y0: 700.0, x1: x0 + 10.0, y1: 712.0 },
                            block: 0,
                            line: 0,
                            word: i as u32,
                        }
                    })
                    .collect();
                MemoryPage {
                    text: text.to_string(),
                    words,
                    filled: Vec::new(),
                }
            })
            .collect();
        Self {
            pages,
            fail_save: false,
            saves: 0,
        }
    }

    pub fn single_page(text: &str) -> Self {
        Self::from_pages(&[text])
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn filled(&self, page_index: usize) -> &[BBox] {
        &self.pages[page_index].filled
    }

    pub fn word_bbox(&self, page_index: usize, word: usize) -> BBox {
        self.pages[page_index].words[word].bbox
    }

    /// Raw text of every word whose box was painted, in word order.
    pub fn covered_words(&self, page_index: usize) -> Vec<&str> {
        let page = &self.pages[page_index];
        page.words
            .iter()
            .filter(|w| page.filled.contains(&w.bbox))
            .map(|w| w.text.as_str())
            .collect()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn serialized(&self) -> Vec<u8> {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!("page {} {:?}\n", i + 1, page.filled));
        }
        out.into_bytes()
    }

    fn page(&self, page_index: usize) -> Result<&MemoryPage> {
        self.pages
            .get(page_index)
            .ok_or_else(|| CoreError::Document(format!("no page {page_index}")))
    }
}

impl RedactableDocument for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page_index: usize) -> Result<String> {
        Ok(self.page(page_index)?.text.clone())
    }

    fn page_words(&self, page_index: usize) -> Result<Vec<PageWord>> {
        Ok(self.page(page_index)?.words.clone())
    }

    fn fill_rects(&mut self, page_index: usize, rects: &[BBox]) -> Result<()> {
        let page = self
            .pages
            .get_mut(page_index)
            .ok_or_else(|| CoreError::Document(format!("no page {page_index}")))?;
        page.filled.extend_from_slice(rects);
        Ok(())
    }

    fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        if self.fail_save {
            return Err(CoreError::Serialization("disk full".into()));
        }
        self.saves += 1;
        Ok(self.serialized())
    }
}

/// Builds a record from a list of entries, numbering them from 1.
pub fn record(entries: &[&[(&str, &str)]]) -> EntityRecord {
    entries
        .iter()
        .enumerate()
        .map(|(i, fields)| {
            let fields: EntityFields = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            ((i + 1).to_string(), fields)
        })
        .collect()
}

/// Replies with a fixed outcome per page; unscripted pages get an empty record.
#[derive(Default)]
pub struct ScriptedClassifier {
    replies: HashMap<u32, std::result::Result<EntityRecord, ClassifyError>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(u32, String, String)>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(
        mut self,
        page: u32,
        outcome: std::result::Result<EntityRecord, ClassifyError>,
    ) -> Self {
        self.replies.insert(page, outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(page, text, instruction)` of every call, sorted by page.
    pub fn seen(&self) -> Vec<(u32, String, String)> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_by_key(|(page, _, _)| *page);
        seen
    }
}

impl EntityClassifier for ScriptedClassifier {
    fn classify(
        &self,
        page: u32,
        page_text: &str,
        instruction: &str,
    ) -> std::result::Result<EntityRecord, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((page, page_text.to_string(), instruction.to_string()));
        self.replies
            .get(&page)
            .cloned()
            .unwrap_or_else(|| Ok(EntityRecord::new()))
    }
}
