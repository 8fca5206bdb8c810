use std::path::{Path, PathBuf};

use tracing::{debug, info_span};

use crate::sanitize;
use crate::storage::FileStorage;

use super::combiner;
use super::error::{DocumentError, PdfInput};
use super::renderer::TemplateRenderer;
use super::template::{self, FieldMap};

/// File name of the merged contract for a proposal.
pub fn artifact_name(proposal_id: &str) -> String {
    format!("merged_contract_{}.pdf", proposal_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub path: PathBuf,
    pub rendered_pages: usize,
    pub scope_of_work_pages: usize,
}

impl MergeOutput {
    pub fn total_pages(&self) -> usize {
        self.rendered_pages + self.scope_of_work_pages
    }
}

/// Template substitution → render → concatenate with the scope of work →
/// store.
pub struct MailMerge {
    renderer: Box<dyn TemplateRenderer>,
    storage: FileStorage,
}

impl MailMerge {
    pub fn new(renderer: Box<dyn TemplateRenderer>, storage: FileStorage) -> Self {
        Self { renderer, storage }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Produces the merged contract PDF and writes it under `output_name`.
    ///
    /// The output file only appears once it is complete; a failure at any
    /// step leaves no artifact behind.
    pub fn merge(
        &self,
        template_html: &str,
        fields: &FieldMap,
        scope_of_work: &Path,
        output_name: &str,
    ) -> Result<MergeOutput, DocumentError> {
        let _merge_span = info_span!("mail_merge",
            output = %output_name,
            scope_of_work = %sanitize::redact_path(scope_of_work),
        )
        .entered();

        if template_html.trim().is_empty() {
            return Err(DocumentError::TemplateNotFound(
                "template content is empty".to_string(),
            ));
        }

        // Step 1: Load the scope of work before spending time on rendering
        let scope_bytes = {
            let _step = info_span!("load_scope_of_work").entered();
            if !self.storage.exists(scope_of_work) {
                return Err(DocumentError::ScopeOfWorkMissing(
                    self.storage.resolve(scope_of_work),
                ));
            }
            self.storage.read(scope_of_work)?
        };

        // Step 2: Substitute fields
        let html = {
            let _step = info_span!("substitute").entered();
            let html = template::substitute(template_html, fields);
            let leftover = template::placeholders(&html);
            if !leftover.is_empty() {
                debug!(placeholders = ?leftover, "Template keeps unmapped placeholders");
            }
            html
        };

        // Step 3: Render
        let rendered = {
            let _step = info_span!("render").entered();
            self.renderer.render(&html)?
        };

        // Step 4: Concatenate
        let (combined, rendered_pages, scope_of_work_pages) = {
            let _step = info_span!("combine").entered();
            let rendered_pages = combiner::page_count(&rendered, PdfInput::RenderedContract)?;
            let scope_pages = combiner::page_count(&scope_bytes, PdfInput::ScopeOfWork)?;
            let combined = combiner::combine(&rendered, &scope_bytes)?;
            (combined, rendered_pages, scope_pages)
        };

        // Step 5: Store
        let path = {
            let _step = info_span!("store").entered();
            self.storage.write_atomic(output_name, &combined)?
        };

        debug!(
            rendered_pages,
            scope_of_work_pages,
            bytes = combined.len(),
            "Merged contract written"
        );

        Ok(MergeOutput {
            path,
            rendered_pages,
            scope_of_work_pages,
        })
    }
}
