//! PDF document for the redaction pipeline.
//!
//! [`PdfDocument`] reads page text and positioned words either through
//! pdfium, when the shared library is available, or straight from the
//! content streams with lopdf. Black boxes are always painted with lopdf by
//! appending an overlay stream to each page. Coordinates are PDF user space,
//! origin bottom-left.

use blackout_core::{BBox, CoreError, PageWord, RedactableDocument};
use lopdf::{Document, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub mod cmap;
pub mod fonts;
pub mod overlay;
pub mod pdfium;
mod standard14;
pub mod text;
pub mod utils;
mod words;

pub use words::PageLayout;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to load PDF: {0}")]
    Load(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("page index {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("page {page}: {message}")]
    Content { page: u32, message: String },
    #[error("pdfium text extraction failed: {0}")]
    Pdfium(String),
    #[error("failed to save PDF: {0}")]
    Save(String),
}

impl From<PdfError> for CoreError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Save(message) => CoreError::Serialization(message),
            other => CoreError::Document(other.to_string()),
        }
    }
}

/// Where page text and word boxes come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBackend {
    /// pdfium if the library loads, the content streams otherwise.
    #[default]
    Auto,
    /// pdfium only; loading fails without the library.
    Pdfium,
    /// The built-in content stream reader.
    Lopdf,
}

impl FromStr for TextBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TextBackend::Auto),
            "pdfium" => Ok(TextBackend::Pdfium),
            "lopdf" => Ok(TextBackend::Lopdf),
            other => Err(format!(
                "unknown text backend {other:?} (expected auto, pdfium or lopdf)"
            )),
        }
    }
}

impl fmt::Display for TextBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextBackend::Auto => "auto",
            TextBackend::Pdfium => "pdfium",
            TextBackend::Lopdf => "lopdf",
        })
    }
}

pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    /// Layouts read up front by pdfium; `None` means replay content streams.
    layouts: Option<Vec<PageLayout>>,
}

impl PdfDocument {
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Self::load_from_bytes_with(bytes, TextBackend::Auto)
    }

    pub fn load_from_bytes_with(bytes: &[u8], backend: TextBackend) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))?;
        let mut pdf = Self::from_document(doc);

        pdf.layouts = match backend {
            TextBackend::Lopdf => None,
            TextBackend::Pdfium => Some(pdf.pdfium_layouts(bytes)?),
            TextBackend::Auto => match pdf.pdfium_layouts(bytes) {
                Ok(layouts) => Some(layouts),
                Err(e) => {
                    log::info!("[PDF] {}; reading text from content streams", e);
                    None
                }
            },
        };
        Ok(pdf)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        Self::load_with(path, TextBackend::Auto)
    }

    pub fn load_with<P: AsRef<Path>>(path: P, backend: TextBackend) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| PdfError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let pdf = Self::load_from_bytes_with(&bytes, backend)?;
        log::info!(
            "[PDF] loaded {} ({} pages, {} bytes, text via {})",
            path.display(),
            pdf.page_ids.len(),
            bytes.len(),
            if pdf.layouts.is_some() { "pdfium" } else { "lopdf" }
        );
        Ok(pdf)
    }

    pub fn from_document(doc: Document) -> Self {
        // get_pages is keyed by page number, so values come out in page order
        let page_ids = doc.get_pages().into_values().collect();
        Self {
            doc,
            page_ids,
            layouts: None,
        }
    }

    fn pdfium_layouts(&self, bytes: &[u8]) -> Result<Vec<PageLayout>, PdfError> {
        let layouts = pdfium::extract_layouts(bytes).map_err(PdfError::Pdfium)?;
        if layouts.len() != self.page_ids.len() {
            return Err(PdfError::Pdfium(format!(
                "pdfium saw {} page(s), lopdf {}",
                layouts.len(),
                self.page_ids.len()
            )));
        }
        Ok(layouts)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    /// Text and words of a page from a single pass over its content.
    pub fn layout(&self, index: usize) -> Result<PageLayout, PdfError> {
        let page_id = self.page_id(index)?;
        if let Some(layout) = self.layouts.as_ref().and_then(|all| all.get(index)) {
            return Ok(layout.clone());
        }
        text::extract_layout(&self.doc, page_id).map_err(|message| PdfError::Content {
            page: index as u32 + 1,
            message,
        })
    }

    pub fn save_to_vec(&mut self) -> Result<Vec<u8>, PdfError> {
        self.doc.compress();
        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| PdfError::Save(e.to_string()))?;
        Ok(out)
    }
}

impl RedactableDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_text(&self, page_index: usize) -> blackout_core::Result<String> {
        Ok(self.layout(page_index)?.text)
    }

    fn page_words(&self, page_index: usize) -> blackout_core::Result<Vec<PageWord>> {
        Ok(self.layout(page_index)?.words)
    }

    fn read_page(&self, page_index: usize) -> blackout_core::Result<(String, Vec<PageWord>)> {
        let layout = self.layout(page_index)?;
        Ok((layout.text, layout.words))
    }

    fn fill_rects(&mut self, page_index: usize, rects: &[BBox]) -> blackout_core::Result<()> {
        let page_id = self.page_id(page_index)?;
        overlay::append_overlay(&mut self.doc, page_id, rects).map_err(|message| {
            PdfError::Content {
                page: page_index as u32 + 1,
                message,
            }
        })?;
        Ok(())
    }

    fn save_to_bytes(&mut self) -> blackout_core::Result<Vec<u8>> {
        Ok(self.save_to_vec()?)
    }
}
