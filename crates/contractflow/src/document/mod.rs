//! Contract documents: merge fields, template substitution, PDF rendering
//! and concatenation.

pub mod combiner;
pub mod error;
pub mod fields;
pub mod merge;
pub mod renderer;
pub mod template;

pub use error::{DocumentError, PdfInput, RenderError};
pub use fields::{MergeField, MergeFieldRegistry, MergeSources, NOT_AVAILABLE};
pub use merge::{artifact_name, MailMerge, MergeOutput};
pub use renderer::{ChromiumRenderer, PageFormat, TemplateRenderer, TextRenderer};
pub use template::FieldMap;
