//! Test harness for isolated workflow tests.
//!
//! Each `TestHarness` owns a temporary directory holding the SQLite file and
//! the artifacts directory, a seeded directory (one client, one vendor, one
//! property) and a `WorkflowEngine` wired to them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use contractflow::db::directory_repo;
use contractflow::db::job_repo::JobRow;
use contractflow::db::proposal_repo::ProposalRow;
use contractflow::db::template_repo::TemplateRow;
use contractflow::{
    Database, FileStorage, MailMerge, NewTemplate, PageFormat, TemplateRenderer, TextRenderer,
    WorkflowEngine,
};

use super::builders::{
    scope_of_work_pdf, JobRequestBuilder, PropertyBuilder, UserBuilder, VendorBuilder,
};

pub const CLIENT_ID: &str = "client-1";
pub const VENDOR_ID: &str = "vendor-1";
pub const PROPERTY_ID: &str = "prop-1";

pub const STANDARD_TEMPLATE: &str = "<html><head><title>Contract</title></head><body>\
    <h1>Service Contract</h1>\
    <p>Vendor: {{vendorName}}</p>\
    <p>Client: {{clientName}}</p>\
    <p>Property: {{propertyName}}, {{propertyAddress}}</p>\
    <p>Work: {{requestDetails}}</p>\
    <p>Date: {{contractDate}}</p>\
    </body></html>";

pub struct TestHarness {
    temp_dir: TempDir,
    pub artifacts_dir: PathBuf,
    pub engine: WorkflowEngine,
}

impl TestHarness {
    /// Harness using the built-in text renderer.
    pub fn new() -> Self {
        Self::with_renderer(Box::new(TextRenderer::new(PageFormat::A4)))
    }

    pub fn with_renderer(renderer: Box<dyn TemplateRenderer>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let artifacts_dir = temp_dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts_dir).expect("Failed to create artifacts dir");

        let db = Database::open(&temp_dir.path().join("data").join("contractflow.db"))
            .expect("Failed to open database");
        seed_directory(&db);

        let merge = MailMerge::new(renderer, FileStorage::new(&artifacts_dir));
        let engine = WorkflowEngine::new(db, merge);

        Self {
            temp_dir,
            artifacts_dir,
            engine,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db(&self) -> &Database {
        self.engine.database()
    }

    /// Writes a scope-of-work PDF into the artifacts directory and returns
    /// its path relative to it.
    pub fn write_scope_of_work(&self, filename: &str, pages: usize) -> String {
        std::fs::write(self.artifacts_dir.join(filename), scope_of_work_pdf(pages))
            .expect("Failed to write scope of work");
        filename.to_string()
    }

    pub fn create_job(&self) -> JobRow {
        self.engine
            .create_job(JobRequestBuilder::new(PROPERTY_ID, CLIENT_ID).build())
            .expect("Failed to create job")
    }

    /// A job with a freshly submitted proposal whose two-page scope of work
    /// exists on disk.
    pub fn submitted_proposal(&self) -> (JobRow, ProposalRow) {
        let job = self.create_job();
        let sow = self.write_scope_of_work("sow.pdf", 2);
        let proposal = self
            .engine
            .create_proposal(&job.id, VENDOR_ID, &sow)
            .expect("Failed to create proposal");
        let job = self.engine.job(&job.id).expect("Failed to reload job");
        (job, proposal)
    }

    pub fn register_template(&self, html: &str) -> TemplateRow {
        self.engine
            .register_template(NewTemplate {
                owner_id: CLIENT_ID.to_string(),
                name: "Standard contract".to_string(),
                html: html.to_string(),
                fields: vec![],
            })
            .expect("Failed to register template")
    }

    /// Visible files in the artifacts directory, sorted.
    pub fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.artifacts_dir)
            .expect("Failed to read artifacts dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }
}

fn seed_directory(db: &Database) {
    directory_repo::insert_user(
        db,
        &UserBuilder::new(CLIENT_ID)
            .name("Dana Client")
            .email("dana@example.com")
            .build(),
    )
    .expect("Failed to insert client");
    directory_repo::insert_vendor(
        db,
        &VendorBuilder::new(VENDOR_ID)
            .name("Acme Roofing")
            .email("ops@acme.test")
            .service_type("Roofing")
            .build(),
    )
    .expect("Failed to insert vendor");
    directory_repo::insert_vendor(db, &VendorBuilder::new("vendor-2").name("Beta Builders").build())
        .expect("Failed to insert vendor");
    directory_repo::insert_property(
        db,
        &PropertyBuilder::new(PROPERTY_ID)
            .owner(CLIENT_ID)
            .name("Harbor View")
            .address("1 Harbor Way")
            .build(),
    )
    .expect("Failed to insert property");
}
