//! Page-by-page redaction pipeline.
//!
//! For each page, in document order: extract words, classify the page text,
//! build the redact set, black out matches. The document is serialized once
//! after every page has been attempted.
//!
//! A page whose classification fails is left untouched and reported in the
//! [`RunSummary`]; it never stops the run. Failures of the document itself
//! (reading a page, drawing, saving) abort the whole run.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use crate::classifier::{ClassifyError, EntityClassifier};
use crate::diagnostics;
use crate::document::{extract_page, ExtractedPage, RedactableDocument};
use crate::entities::{EntityRecord, RedactSet};
use crate::redactor::redact_page;
use crate::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory for per-page word list and redact set dumps.
    pub diagnostics_dir: Option<PathBuf>,
    /// Maximum number of classification calls in flight. `1` keeps the
    /// pipeline strictly sequential.
    pub concurrency: usize,
    /// Field names every classifier entry must carry. A reply with missing
    /// or extra fields fails that page. `None` accepts any fields.
    pub expected_fields: Option<Vec<String>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            diagnostics_dir: None,
            concurrency: 1,
            expected_fields: None,
        }
    }
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    /// Page number, starting at 1
    pub page: u32,
    pub words: usize,
    pub entities: usize,
    pub tokens: usize,
    pub boxes: usize,
    /// Set when the classifier failed and the page was left unredacted.
    pub classification_error: Option<ClassifyError>,
}

impl PageReport {
    pub fn classification_failed(&self) -> bool {
        self.classification_error.is_some()
    }
}

/// Per-run totals, including the pages that were skipped because
/// classification failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub pages: Vec<PageReport>,
}

impl RunSummary {
    pub fn pages_total(&self) -> usize {
        self.pages.len()
    }

    pub fn pages_redacted(&self) -> usize {
        self.pages.iter().filter(|p| p.boxes > 0).count()
    }

    pub fn boxes_drawn(&self) -> usize {
        self.pages.iter().map(|p| p.boxes).sum()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.classification_failed())
    }

    /// Pages that were classified successfully but got no rectangles.
    pub fn pages_without_detections(&self) -> impl Iterator<Item = &PageReport> {
        self.pages
            .iter()
            .filter(|p| !p.classification_failed() && p.boxes == 0)
    }

    pub fn is_complete(&self) -> bool {
        self.failed_pages().next().is_none()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} page(s) processed, {} redacted, {} box(es) drawn",
            self.pages_total(),
            self.pages_redacted(),
            self.boxes_drawn()
        )?;

        let quiet: Vec<String> = self
            .pages_without_detections()
            .map(|p| p.page.to_string())
            .collect();
        if !quiet.is_empty() {
            writeln!(f, "no detections on page(s): {}", quiet.join(", "))?;
        }

        for page in self.failed_pages() {
            if let Some(error) = &page.classification_error {
                writeln!(f, "page {} NOT redacted, classification failed: {}", page.page, error)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RedactionOutput {
    /// The serialized, redacted document.
    pub pdf: Vec<u8>,
    pub summary: RunSummary,
}

pub struct RedactionPipeline<C> {
    classifier: C,
    options: PipelineOptions,
}

impl<C: EntityClassifier> RedactionPipeline<C> {
    pub fn new(classifier: C) -> Self {
        Self::with_options(classifier, PipelineOptions::default())
    }

    pub fn with_options(classifier: C, options: PipelineOptions) -> Self {
        Self { classifier, options }
    }

    /// Redacts every page of `doc` and returns the serialized result.
    ///
    /// An empty `instruction` means no category was selected; the document is
    /// not touched and [`CoreError::NoCategories`] is returned.
    pub fn run<D: RedactableDocument + ?Sized>(
        &self,
        doc: &mut D,
        instruction: &str,
    ) -> Result<RedactionOutput> {
        if instruction.trim().is_empty() {
            return Err(CoreError::NoCategories);
        }

        let page_count = doc.page_count();
        let workers = self.options.concurrency.max(1).min(page_count.max(1));
        log::info!(
            "[Pipeline] redacting {} page(s), {} classification worker(s)",
            page_count,
            workers
        );

        let mut summary = RunSummary::default();

        if workers <= 1 {
            for page_index in 0..page_count {
                let page = extract_page(doc, page_index)?;
                let classified = self.classify(page_index, &page, instruction);
                let report = self.finish_page(doc, page_index, page, classified)?;
                summary.pages.push(report);
            }
        } else {
            let pages = (0..page_count)
                .map(|page_index| extract_page(doc, page_index))
                .collect::<Result<Vec<_>>>()?;
            let outcomes = self.classify_all(&pages, instruction, workers);
            for (page_index, (page, classified)) in pages.into_iter().zip(outcomes).enumerate() {
                let report = self.finish_page(doc, page_index, page, classified)?;
                summary.pages.push(report);
            }
        }

        let pdf = doc.save_to_bytes()?;
        log::info!(
            "[Pipeline] done: {} box(es) on {} page(s), {} page(s) failed classification, {} bytes",
            summary.boxes_drawn(),
            summary.pages_redacted(),
            summary.failed_pages().count(),
            pdf.len()
        );

        Ok(RedactionOutput { pdf, summary })
    }

    fn classify(
        &self,
        page_index: usize,
        page: &ExtractedPage,
        instruction: &str,
    ) -> std::result::Result<EntityRecord, ClassifyError> {
        let page_number = page_index as u32 + 1;
        if should_log_full_text() {
            log::debug!("[Pipeline] page {} text:\n{}", page_number, page.text);
        }

        let classified = self
            .classifier
            .classify(page_number, &page.text, instruction)
            .and_then(|entities| match &self.options.expected_fields {
                Some(fields) => entities.check_fields(fields.as_slice()).map(|()| entities),
                None => Ok(entities),
            });

        match classified {
            Ok(entities) => {
                log::info!(
                    "[Classify] page {}: {} item(s)",
                    page_number,
                    entities.len()
                );
                Ok(entities)
            }
            Err(e) => {
                log::warn!(
                    "[Classify] page {} failed, leaving it unredacted: {}",
                    page_number,
                    e
                );
                Err(e)
            }
        }
    }

    /// Classifies all pages on a bounded set of scoped workers. Results come
    /// back indexed by page, whatever order the calls complete in.
    fn classify_all(
        &self,
        pages: &[ExtractedPage],
        instruction: &str,
        workers: usize,
    ) -> Vec<std::result::Result<EntityRecord, ClassifyError>> {
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                scope.spawn(move || loop {
                    let page_index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(page) = pages.get(page_index) else {
                        break;
                    };
                    let outcome = self.classify(page_index, page, instruction);
                    if tx.send((page_index, outcome)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<std::result::Result<EntityRecord, ClassifyError>>> =
            (0..pages.len()).map(|_| None).collect();
        for (page_index, outcome) in rx {
            slots[page_index] = Some(outcome);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ClassifyError::Transport("classification worker stopped".into()))
                })
            })
            .collect()
    }

    fn finish_page<D: RedactableDocument + ?Sized>(
        &self,
        doc: &mut D,
        page_index: usize,
        page: ExtractedPage,
        classified: std::result::Result<EntityRecord, ClassifyError>,
    ) -> Result<PageReport> {
        let page_number = page_index as u32 + 1;
        let (entities, classification_error) = match classified {
            Ok(entities) => (entities, None),
            Err(e) => (EntityRecord::new(), Some(e)),
        };

        let redact_set = RedactSet::from_entities(&entities);

        if let Some(dir) = &self.options.diagnostics_dir {
            diagnostics::dump_page(dir, page_number, &page.words, &redact_set);
        }

        let boxes = redact_page(doc, page_index, &page.words, &redact_set)?;
        log::info!(
            "[Pipeline] page {}: {} token(s), {} box(es)",
            page_number,
            redact_set.len(),
            boxes
        );

        Ok(PageReport {
            page: page_number,
            words: page.words.len(),
            entities: entities.len(),
            tokens: redact_set.len(),
            boxes,
            classification_error,
        })
    }
}

fn should_log_full_text() -> bool {
    match std::env::var("BLACKOUT_LOG_FULL_TEXT") {
        Ok(val) => {
            let val = val.to_ascii_lowercase();
            val == "1" || val == "true" || val == "yes"
        }
        Err(_) => false,
    }
}
