pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod storage;
pub mod workflow;

pub use config::{load_config, load_config_from_str, Config};
pub use db::Database;
pub use document::{
    ChromiumRenderer, DocumentError, MailMerge, MergeField, PageFormat, RenderError,
    TemplateRenderer, TextRenderer,
};
pub use error::{ConfigError, ContractflowError, Result, StorageError};
pub use storage::FileStorage;
pub use workflow::{
    ContractStatus, JobStatus, NewJob, NewTemplate, ProposalStatus, WorkflowEngine, WorkflowError,
};
