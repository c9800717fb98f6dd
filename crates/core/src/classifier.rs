//! Seam to the external entity classification service.

use thiserror::Error;

use crate::entities::EntityRecord;

/// Why a page could not be classified.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service returned no content")]
    EmptyResponse,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// Identifies sensitive items in the text of one page.
///
/// Implementations report failures as [`ClassifyError`]; the pipeline decides
/// how a failed page is handled.
pub trait EntityClassifier: Send + Sync {
    fn classify(
        &self,
        page: u32,
        page_text: &str,
        instruction: &str,
    ) -> Result<EntityRecord, ClassifyError>;
}

impl<C: EntityClassifier + ?Sized> EntityClassifier for &C {
    fn classify(
        &self,
        page: u32,
        page_text: &str,
        instruction: &str,
    ) -> Result<EntityRecord, ClassifyError> {
        (**self).classify(page, page_text, instruction)
    }
}

impl<C: EntityClassifier + ?Sized> EntityClassifier for Box<C> {
    fn classify(
        &self,
        page: u32,
        page_text: &str,
        instruction: &str,
    ) -> Result<EntityRecord, ClassifyError> {
        (**self).classify(page, page_text, instruction)
    }
}
