use std::path::PathBuf;

use thiserror::Error;

use crate::error::StorageError;

/// Failures while turning HTML into PDF bytes.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Renderer did not finish within {secs}s")]
    Timeout { secs: u64 },

    #[error("Renderer produced no usable PDF: {0}")]
    InvalidOutput(String),

    #[error("Renderer IO failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build PDF: {0}")]
    Pdf(String),
}

/// Which combiner input a malformed PDF came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfInput {
    RenderedContract,
    ScopeOfWork,
}

impl std::fmt::Display for PdfInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfInput::RenderedContract => write!(f, "rendered contract"),
            PdfInput::ScopeOfWork => write!(f, "scope of work"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Malformed PDF ({input}): {reason}")]
    MalformedPdf { input: PdfInput, reason: String },

    #[error("Scope-of-work file missing: {0}")]
    ScopeOfWorkMissing(PathBuf),

    #[error("Artifact storage failed: {0}")]
    Storage(#[from] StorageError),
}
