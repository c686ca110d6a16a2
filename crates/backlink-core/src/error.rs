use crate::backlinks::PropagationReport;
use thiserror::Error;

/// Raised by the tree navigator when a path does not address a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("path {path:?} does not address a node")]
    InvalidPath { path: Vec<usize> },
}

impl TreeError {
    pub(crate) fn invalid(path: &[usize]) -> Self {
        TreeError::InvalidPath {
            path: path.to_vec(),
        }
    }
}

/// A single backlinked document whose fetch or persist failed during propagation.
#[derive(Debug)]
pub struct DocumentFailure {
    pub document_id: String,
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum BacklinkError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document store error: {0:#}")]
    Store(anyhow::Error),

    /// Some per-document sequences failed. Sequences that completed are not rolled back.
    #[error("{} of {} backlinked document(s) failed to update", .failures.len(), .attempted)]
    PersistFailure {
        attempted: usize,
        failures: Vec<DocumentFailure>,
        /// What the sequences that did not fail accomplished.
        report: PropagationReport,
    },
}
