//! Core of the redaction pipeline.
//!
//! Pages are read through [`RedactableDocument`], classified through
//! [`EntityClassifier`], and every word that matches a classified token is
//! covered with a black rectangle. Redaction is visual only: covered text is
//! still present in the document's content streams.

pub mod classifier;
pub mod diagnostics;
pub mod document;
pub mod entities;
pub mod pipeline;
pub mod prompt;
pub mod redactor;

#[cfg(test)]
mod testing;

pub use classifier::{ClassifyError, EntityClassifier};
pub use document::{extract_page, trim_punctuation, BBox, ExtractedPage, PageWord, RedactableDocument, WordRecord};
pub use entities::{EntityFields, EntityRecord, RedactSet, TokenMatcher};
pub use pipeline::{PageReport, PipelineOptions, RedactionOutput, RedactionPipeline, RunSummary};
pub use prompt::{build_system_prompt, expected_fields, Category, UnknownCategory};
pub use redactor::{matching_words, redact_page};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("no redaction category selected")]
    NoCategories,
    #[error("document error: {0}")]
    Document(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}
