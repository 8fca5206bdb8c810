use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::document::DocumentError;
use crate::error::StorageError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid {entity} transition for '{id}': {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Scope-of-work file missing: {0}")]
    ScopeOfWorkMissing(PathBuf),

    #[error("Job '{0}' has no proposal")]
    NoProposal(String),

    #[error("Unknown merge fields: {}", .0.join(", "))]
    UnknownMergeField(Vec<String>),

    #[error("{entity} '{id}' was modified concurrently")]
    ConcurrentModification { entity: &'static str, id: String },

    #[error(
        "{operation} left partial changes: completed [{}], failed at '{failed_step}', \
         could not revert [{}]: {source}",
        .completed.join(", "),
        .unreverted.join(", ")
    )]
    PartialUpdate {
        operation: &'static str,
        completed: Vec<String>,
        failed_step: String,
        unreverted: Vec<String>,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("Document error: {0}")]
    Document(DocumentError),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<DatabaseError> for WorkflowError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::VersionConflict { table, id, .. }
            | DatabaseError::AlreadyClaimed { table, id } => {
                WorkflowError::ConcurrentModification {
                    entity: table.trim_end_matches('s'),
                    id,
                }
            }
            other => WorkflowError::Database(other),
        }
    }
}

impl From<DocumentError> for WorkflowError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::ScopeOfWorkMissing(path) => WorkflowError::ScopeOfWorkMissing(path),
            other => WorkflowError::Document(other),
        }
    }
}

impl WorkflowError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the error left nothing changed, i.e. it is not a
    /// [`WorkflowError::PartialUpdate`].
    pub fn is_clean(&self) -> bool {
        !matches!(self, WorkflowError::PartialUpdate { .. })
    }
}
