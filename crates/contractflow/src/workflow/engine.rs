//! Job → proposal → contract workflow.
//!
//! Every operation validates fully before its first write. Operations that
//! touch more than one record run as a [`Saga`], and every status write is a
//! compare-and-swap on the version read during validation, so two callers
//! racing on the same record cannot both succeed.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, info_span};

use crate::config::Config;
use crate::db::contract_repo::{self, ContractFilter, ContractRow};
use crate::db::directory_repo;
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::proposal_repo::{self, ProposalFilter, ProposalRow};
use crate::db::template_repo::{self, TemplateFilter, TemplateRow};
use crate::db::{format_timestamp, Database};
use crate::document::{self, artifact_name, MailMerge, MergeField, MergeFieldRegistry, MergeSources};
use crate::error::{ConfigError, ContractflowError};
use crate::storage::FileStorage;

use super::error::WorkflowError;
use super::saga::Saga;
use super::status::{ContractStatus, JobStatus, ProposalStatus, StatusMachine};

type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub property_id: String,
    pub client_id: String,
    pub request_details: String,
    pub service_type: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub owner_id: String,
    pub name: String,
    pub html: String,
    /// Merge-field keys to fill. Empty means every registered field.
    #[serde(default)]
    pub fields: Vec<String>,
}

pub struct WorkflowEngine {
    db: Database,
    merge: MailMerge,
    registry: MergeFieldRegistry,
}

impl WorkflowEngine {
    pub fn new(db: Database, merge: MailMerge) -> Self {
        Self {
            db,
            merge,
            registry: MergeFieldRegistry::standard(),
        }
    }

    /// Opens the database and builds the renderer and artifact storage
    /// described by `config`.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ContractflowError> {
        let db_path = config
            .database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "Could not determine database path".to_string(),
            })?;
        let db = Database::open(&db_path)?;
        let renderer = document::renderer::from_config(&config.renderer)?;
        let storage = FileStorage::new(&config.artifacts_directory);
        Ok(Self::new(db, MailMerge::new(renderer, storage)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn storage(&self) -> &FileStorage {
        self.merge.storage()
    }

    // ─── Jobs ───────────────────────────────────────────────────────────────

    pub fn create_job(&self, new: NewJob) -> Result<JobRow> {
        let _span = info_span!("workflow.create_job",
            property_id = %new.property_id,
            client_id = %new.client_id,
        )
        .entered();

        require("property_id", &new.property_id)?;
        require("client_id", &new.client_id)?;
        require("request_details", &new.request_details)?;
        require("service_type", &new.service_type)?;

        if directory_repo::find_property(&self.db, &new.property_id)?.is_none() {
            return Err(WorkflowError::not_found("property", &new.property_id));
        }
        if directory_repo::find_user(&self.db, &new.client_id)?.is_none() {
            return Err(WorkflowError::not_found("user", &new.client_id));
        }
        if let Some(vendor_id) = &new.vendor_id {
            if directory_repo::find_vendor(&self.db, vendor_id)?.is_none() {
                return Err(WorkflowError::not_found("vendor", vendor_id));
            }
        }

        let now = format_timestamp(Utc::now());
        let job = JobRow {
            id: uuid::Uuid::new_v4().to_string(),
            property_id: new.property_id,
            client_id: new.client_id,
            request_details: new.request_details,
            service_type: new.service_type,
            status: JobStatus::INITIAL,
            vendor_id: new.vendor_id,
            proposal_id: None,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        };
        job_repo::insert(&self.db, &job)?;

        info!(job_id = %job.id, "Job created");
        Ok(job)
    }

    /// Moves a job along its transition table. Statuses past Pending (other
    /// than Cancelled) require the job to reference a proposal.
    pub fn transition_job_status(&self, job_id: &str, target: JobStatus) -> Result<JobRow> {
        let _span = info_span!("workflow.transition_job_status",
            job_id = %job_id,
            to = %target,
        )
        .entered();

        let job = self.job(job_id)?;
        check_transition(&job.id, job.status, target)?;
        if target.requires_proposal() && job.proposal_id.is_none() {
            return Err(WorkflowError::NoProposal(job.id));
        }

        let from = job.status;
        let updated = job_repo::update(
            &self.db,
            &JobRow {
                status: target,
                ..job
            },
        )?;

        info!(from = %from, to = %target, "Job status changed");
        Ok(updated)
    }

    /// Sends the job's current proposal back to the vendor.
    pub fn request_proposal_revision(&self, job_id: &str) -> Result<(JobRow, ProposalRow)> {
        let _span = info_span!("workflow.request_proposal_revision", job_id = %job_id).entered();

        let job = self.job(job_id)?;
        let proposal_id = job
            .proposal_id
            .clone()
            .ok_or_else(|| WorkflowError::NoProposal(job.id.clone()))?;
        let proposal = self.proposal(&proposal_id)?;

        check_transition(&proposal.id, proposal.status, ProposalStatus::NeedsRevision)?;
        check_transition(&job.id, job.status, JobStatus::ProposalNeedsRevision)?;

        let db = &self.db;
        let mut saga = Saga::new("request_proposal_revision");

        let revised = saga.run("proposal needs revision", || {
            Ok(proposal_repo::update(
                db,
                &ProposalRow {
                    status: ProposalStatus::NeedsRevision,
                    ..proposal.clone()
                },
            )?)
        })?;
        let restore = ProposalRow {
            version: revised.version,
            ..proposal.clone()
        };
        saga.on_undo("proposal needs revision", move || {
            proposal_repo::update(db, &restore)?;
            Ok(())
        });

        let job = saga.run("job needs revision", || {
            Ok(job_repo::update(
                db,
                &JobRow {
                    status: JobStatus::ProposalNeedsRevision,
                    ..job.clone()
                },
            )?)
        })?;

        info!(proposal_id = %revised.id, "Proposal revision requested");
        Ok((job, revised))
    }

    // ─── Proposals ──────────────────────────────────────────────────────────

    /// Records a vendor proposal for a job and makes it the job's current
    /// proposal. A previously current proposal is soft-deleted.
    pub fn create_proposal(
        &self,
        job_id: &str,
        vendor_id: &str,
        scope_of_work_path: &str,
    ) -> Result<ProposalRow> {
        let _span = info_span!("workflow.create_proposal",
            job_id = %job_id,
            vendor_id = %vendor_id,
            scope_of_work = %crate::sanitize::redact_path(Path::new(scope_of_work_path)),
        )
        .entered();

        require("job_id", job_id)?;
        require("vendor_id", vendor_id)?;
        require("scope_of_work_path", scope_of_work_path)?;

        let job = self.job(job_id)?;
        if directory_repo::find_vendor(&self.db, vendor_id)?.is_none() {
            return Err(WorkflowError::not_found("vendor", vendor_id));
        }
        check_transition(&job.id, job.status, JobStatus::ProposalSubmitted)?;

        let previous = match &job.proposal_id {
            Some(id) => proposal_repo::find_by_id(&self.db, id)?
                .filter(|p| p.status.is_live()),
            None => None,
        };
        if let Some(prev) = &previous {
            check_transition(&prev.id, prev.status, ProposalStatus::Deleted)?;
        }

        let now = format_timestamp(Utc::now());
        let proposal = ProposalRow {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            vendor_id: vendor_id.to_string(),
            scope_of_work_path: scope_of_work_path.to_string(),
            status: ProposalStatus::INITIAL,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        };

        let db = &self.db;
        let mut saga = Saga::new("create_proposal");

        saga.run("insert proposal", || Ok(proposal_repo::insert(db, &proposal)?))?;
        let inserted_id = proposal.id.clone();
        saga.on_undo("insert proposal", move || {
            proposal_repo::delete(db, &inserted_id)?;
            Ok(())
        });

        if let Some(prev) = previous {
            let deleted = saga.run("delete previous proposal", || {
                Ok(proposal_repo::update(
                    db,
                    &ProposalRow {
                        status: ProposalStatus::Deleted,
                        ..prev.clone()
                    },
                )?)
            })?;
            debug!(previous_id = %prev.id, "Previous proposal soft-deleted");
            let restore = ProposalRow {
                version: deleted.version,
                ..prev
            };
            saga.on_undo("delete previous proposal", move || {
                proposal_repo::update(db, &restore)?;
                Ok(())
            });
        }

        saga.run("link job", || {
            Ok(job_repo::update(
                db,
                &JobRow {
                    status: JobStatus::ProposalSubmitted,
                    vendor_id: Some(proposal.vendor_id.clone()),
                    proposal_id: Some(proposal.id.clone()),
                    ..job.clone()
                },
            )?)
        })?;

        info!(proposal_id = %proposal.id, "Proposal created");
        Ok(proposal)
    }

    /// Approves a submitted proposal and generates its contract.
    ///
    /// The template is merged with the proposal's data, rendered, and
    /// concatenated with the scope-of-work PDF. The contract is created in
    /// Draft before the proposal is marked Approved; if that last write loses
    /// a race the contract is removed again. The job status is left as is.
    pub fn approve_proposal(&self, proposal_id: &str, template_id: &str) -> Result<ContractRow> {
        let _span = info_span!("workflow.approve_proposal",
            proposal_id = %proposal_id,
            template_id = %template_id,
        )
        .entered();

        require("template_id", template_id)?;

        let proposal = self.proposal(proposal_id)?;
        if proposal.status != ProposalStatus::Submitted {
            return Err(invalid_transition(
                &proposal.id,
                proposal.status,
                ProposalStatus::Approved,
            ));
        }

        let template = self.template(template_id)?;
        if template.content.trim().is_empty() {
            return Err(document::DocumentError::TemplateNotFound(template.id).into());
        }

        let storage = self.merge.storage();
        let scope_of_work = Path::new(&proposal.scope_of_work_path);
        if !storage.exists(scope_of_work) {
            return Err(WorkflowError::ScopeOfWorkMissing(
                storage.resolve(scope_of_work),
            ));
        }

        let job = self.job(&proposal.job_id)?;
        let vendor = directory_repo::find_vendor(&self.db, &proposal.vendor_id)?;
        let client = directory_repo::find_user(&self.db, &job.client_id)?;
        let property = directory_repo::find_property(&self.db, &job.property_id)?;
        let fields = self.registry.build_field_map(
            &MergeSources {
                job: &job,
                proposal: &proposal,
                vendor: vendor.as_ref(),
                client: client.as_ref(),
                property: property.as_ref(),
                generated_at: Utc::now(),
            },
            &template.fields,
        );

        let db = &self.db;
        let mut saga = Saga::new("approve_proposal");

        let output = saga.run("merge contract", || {
            Ok(self.merge.merge(
                &template.content,
                &fields,
                scope_of_work,
                &artifact_name(&proposal.id),
            )?)
        })?;
        let artifact = output.path.clone();
        let owner = proposal.id.clone();
        saga.on_undo("merge contract", move || {
            // A concurrent approval may have produced the same artifact.
            let (_, referencing) = contract_repo::query(
                db,
                &ContractFilter {
                    proposal_id: Some(owner),
                    limit: Some(1),
                    ..Default::default()
                },
            )?;
            if referencing == 0 {
                storage.remove(&artifact)?;
            }
            Ok(())
        });

        let now = format_timestamp(Utc::now());
        let contract = ContractRow {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            vendor_id: proposal.vendor_id.clone(),
            proposal_id: proposal.id.clone(),
            template_id: Some(template.id.clone()),
            scope_of_work_path: proposal.scope_of_work_path.clone(),
            merged_contract_pdf: output.path.to_string_lossy().into_owned(),
            status: ContractStatus::INITIAL,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        };

        saga.run("insert contract", || Ok(contract_repo::insert(db, &contract)?))?;
        let contract_id = contract.id.clone();
        saga.on_undo("insert contract", move || {
            contract_repo::delete(db, &contract_id)?;
            Ok(())
        });

        saga.run("approve proposal", || {
            Ok(proposal_repo::update(
                db,
                &ProposalRow {
                    status: ProposalStatus::Approved,
                    ..proposal.clone()
                },
            )?)
        })?;

        info!(
            contract_id = %contract.id,
            pages = output.total_pages(),
            "Proposal approved, contract drafted"
        );
        Ok(contract)
    }

    /// Resubmits a proposal that was sent back for revision, optionally with
    /// a new scope-of-work document. The job status is not touched.
    pub fn submit_proposal_revision(
        &self,
        proposal_id: &str,
        new_scope_of_work_path: Option<&str>,
    ) -> Result<ProposalRow> {
        let _span =
            info_span!("workflow.submit_proposal_revision", proposal_id = %proposal_id).entered();

        if let Some(path) = new_scope_of_work_path {
            require("scope_of_work_path", path)?;
        }

        let proposal = self.proposal(proposal_id)?;
        check_transition(&proposal.id, proposal.status, ProposalStatus::Submitted)?;

        let scope_of_work_path = new_scope_of_work_path
            .map(str::to_string)
            .unwrap_or_else(|| proposal.scope_of_work_path.clone());
        let updated = proposal_repo::update(
            &self.db,
            &ProposalRow {
                status: ProposalStatus::Submitted,
                scope_of_work_path,
                ..proposal
            },
        )?;

        info!("Proposal revision submitted");
        Ok(updated)
    }

    /// Generic proposal status change.
    ///
    /// Approved and Needs Revision also move the job, when this proposal is
    /// the job's current one. This path never creates a contract; use
    /// [`approve_proposal`](Self::approve_proposal) for that.
    pub fn transition_proposal_status(
        &self,
        proposal_id: &str,
        target: ProposalStatus,
    ) -> Result<ProposalRow> {
        let _span = info_span!("workflow.transition_proposal_status",
            proposal_id = %proposal_id,
            to = %target,
        )
        .entered();

        let proposal = self.proposal(proposal_id)?;
        check_transition(&proposal.id, proposal.status, target)?;

        let job_target = match target {
            ProposalStatus::Approved => Some(JobStatus::ProposalApproved),
            ProposalStatus::NeedsRevision => Some(JobStatus::ProposalNeedsRevision),
            _ => None,
        };
        let job_move = match job_target {
            Some(job_target) => {
                let job = self.job(&proposal.job_id)?;
                if job.proposal_id.as_deref() == Some(proposal.id.as_str()) {
                    check_transition(&job.id, job.status, job_target)?;
                    Some((job, job_target))
                } else {
                    debug!(job_id = %job.id, "Proposal is not the job's current one");
                    None
                }
            }
            None => None,
        };

        let db = &self.db;
        let mut saga = Saga::new("transition_proposal_status");

        let from = proposal.status;
        let updated = saga.run("update proposal", || {
            Ok(proposal_repo::update(
                db,
                &ProposalRow {
                    status: target,
                    ..proposal.clone()
                },
            )?)
        })?;
        let restore = ProposalRow {
            version: updated.version,
            ..proposal
        };
        saga.on_undo("update proposal", move || {
            proposal_repo::update(db, &restore)?;
            Ok(())
        });

        if let Some((job, job_target)) = job_move {
            saga.run("update job", || {
                Ok(job_repo::update(
                    db,
                    &JobRow {
                        status: job_target,
                        ..job
                    },
                )?)
            })?;
        }

        info!(from = %from, to = %target, "Proposal status changed");
        Ok(updated)
    }

    // ─── Contracts ──────────────────────────────────────────────────────────

    pub fn update_contract_status(
        &self,
        contract_id: &str,
        target: ContractStatus,
    ) -> Result<ContractRow> {
        let _span = info_span!("workflow.update_contract_status",
            contract_id = %contract_id,
            to = %target,
        )
        .entered();

        let contract = self.contract(contract_id)?;
        check_transition(&contract.id, contract.status, target)?;

        let from = contract.status;
        let updated = contract_repo::update_status(&self.db, &contract, target)?;

        info!(from = %from, to = %target, "Contract status changed");
        Ok(updated)
    }

    // ─── Templates ──────────────────────────────────────────────────────────

    pub fn register_template(&self, new: NewTemplate) -> Result<TemplateRow> {
        let _span = info_span!("workflow.register_template", owner_id = %new.owner_id).entered();

        require("owner_id", &new.owner_id)?;
        require("name", &new.name)?;
        require("html", &new.html)?;

        let unknown = self.registry.unknown_keys(&new.fields);
        if !unknown.is_empty() {
            return Err(WorkflowError::UnknownMergeField(
                unknown.into_iter().map(str::to_string).collect(),
            ));
        }
        if directory_repo::find_user(&self.db, &new.owner_id)?.is_none() {
            return Err(WorkflowError::not_found("user", &new.owner_id));
        }

        let template = TemplateRow {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: new.owner_id,
            name: new.name,
            content: new.html,
            fields: new.fields,
            created_at: format_timestamp(Utc::now()),
        };
        template_repo::insert(&self.db, &template)?;

        info!(template_id = %template.id, "Template registered");
        Ok(template)
    }

    /// Fields a template may reference.
    pub fn available_merge_fields(&self) -> &[MergeField] {
        self.registry.fields()
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    pub fn job(&self, id: &str) -> Result<JobRow> {
        job_repo::find_by_id(&self.db, id)?.ok_or_else(|| WorkflowError::not_found("job", id))
    }

    pub fn proposal(&self, id: &str) -> Result<ProposalRow> {
        proposal_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| WorkflowError::not_found("proposal", id))
    }

    pub fn contract(&self, id: &str) -> Result<ContractRow> {
        contract_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| WorkflowError::not_found("contract", id))
    }

    pub fn template(&self, id: &str) -> Result<TemplateRow> {
        template_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| WorkflowError::not_found("template", id))
    }

    pub fn jobs(&self, filter: &JobFilter) -> Result<(Vec<JobRow>, u64)> {
        Ok(job_repo::query(&self.db, filter)?)
    }

    pub fn proposals(&self, filter: &ProposalFilter) -> Result<(Vec<ProposalRow>, u64)> {
        Ok(proposal_repo::query(&self.db, filter)?)
    }

    pub fn contracts(&self, filter: &ContractFilter) -> Result<(Vec<ContractRow>, u64)> {
        Ok(contract_repo::query(&self.db, filter)?)
    }

    pub fn templates(&self, filter: &TemplateFilter) -> Result<(Vec<TemplateRow>, u64)> {
        Ok(template_repo::query(&self.db, filter)?)
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(WorkflowError::MissingField(field))
    } else {
        Ok(())
    }
}

fn invalid_transition<S: StatusMachine>(id: &str, from: S, to: S) -> WorkflowError {
    WorkflowError::InvalidTransition {
        entity: S::ENTITY,
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn check_transition<S: StatusMachine>(id: &str, from: S, to: S) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid_transition(id, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::directory_repo::tests::seed_directory;
    use crate::document::combiner::tests::labelled_pdf;
    use crate::document::{PageFormat, TextRenderer};
    use tempfile::TempDir;

    fn engine() -> (TempDir, WorkflowEngine) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        seed_directory(&db);
        std::fs::write(dir.path().join("sow.pdf"), labelled_pdf(&["sow"])).unwrap();
        let merge = MailMerge::new(
            Box::new(TextRenderer::new(PageFormat::A4)),
            FileStorage::new(dir.path()),
        );
        (dir, WorkflowEngine::new(db, merge))
    }

    fn new_job() -> NewJob {
        NewJob {
            property_id: "prop-1".to_string(),
            client_id: "client-1".to_string(),
            request_details: "Replace the roof".to_string(),
            service_type: "Roofing".to_string(),
            vendor_id: None,
        }
    }

    fn template(engine: &WorkflowEngine) -> TemplateRow {
        engine
            .register_template(NewTemplate {
                owner_id: "client-1".to_string(),
                name: "Standard".to_string(),
                html: "<p>{{vendorName}} for {{clientName}}</p>".to_string(),
                fields: vec![],
            })
            .unwrap()
    }

    #[test]
    fn test_create_job_starts_pending() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.version, 1);
        assert_eq!(engine.job(&job.id).unwrap(), job);
    }

    #[test]
    fn test_create_job_requires_fields() {
        let (_dir, engine) = engine();
        let err = engine
            .create_job(NewJob {
                request_details: " ".to_string(),
                ..new_job()
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField("request_details")));
    }

    #[test]
    fn test_create_job_unknown_property() {
        let (_dir, engine) = engine();
        let err = engine
            .create_job(NewJob {
                property_id: "nope".to_string(),
                ..new_job()
            })
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { entity: "property", .. }));
    }

    #[test]
    fn test_create_proposal_links_job() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();

        let proposal = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();

        let job = engine.job(&job.id).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Submitted);
        assert_eq!(job.status, JobStatus::ProposalSubmitted);
        assert_eq!(job.proposal_id.as_deref(), Some(proposal.id.as_str()));
        assert_eq!(job.vendor_id.as_deref(), Some("vendor-1"));
    }

    #[test]
    fn test_create_proposal_requires_scope_of_work() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let err = engine.create_proposal(&job.id, "vendor-1", "").unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField("scope_of_work_path")));
    }

    #[test]
    fn test_resubmission_soft_deletes_previous_proposal() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let first = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();
        engine.request_proposal_revision(&job.id).unwrap();

        let second = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();

        assert_eq!(engine.proposal(&first.id).unwrap().status, ProposalStatus::Deleted);
        let job = engine.job(&job.id).unwrap();
        assert_eq!(job.proposal_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(job.status, JobStatus::ProposalSubmitted);
    }

    #[test]
    fn test_approve_proposal_drafts_contract() {
        let (dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let proposal = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();
        let template = template(&engine);

        let contract = engine.approve_proposal(&proposal.id, &template.id).unwrap();

        assert_eq!(contract.status, ContractStatus::Draft);
        assert_eq!(contract.template_id.as_deref(), Some(template.id.as_str()));
        assert_eq!(
            Path::new(&contract.merged_contract_pdf),
            dir.path().join(artifact_name(&proposal.id))
        );
        assert_eq!(engine.proposal(&proposal.id).unwrap().status, ProposalStatus::Approved);
        // Canonical approval leaves the job alone.
        assert_eq!(engine.job(&job.id).unwrap().status, JobStatus::ProposalSubmitted);
    }

    #[test]
    fn test_approve_requires_template_id() {
        let (_dir, engine) = engine();
        let err = engine.approve_proposal("p-1", "").unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField("template_id")));
    }

    #[test]
    fn test_approve_twice_is_invalid_transition() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let proposal = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();
        let template = template(&engine);
        engine.approve_proposal(&proposal.id, &template.id).unwrap();

        let err = engine.approve_proposal(&proposal.id, &template.id).unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidTransition { entity: "proposal", .. }));
        let (_, total) = engine.contracts(&ContractFilter::default()).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_transition_job_requires_proposal() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let err = engine
            .transition_job_status(&job.id, JobStatus::ProposalSubmitted)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NoProposal(_)));

        let cancelled = engine.transition_job_status(&job.id, JobStatus::Cancelled).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(cancelled.version, 2);
    }

    #[test]
    fn test_generic_approval_moves_job_without_contract() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let proposal = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();

        engine
            .transition_proposal_status(&proposal.id, ProposalStatus::Approved)
            .unwrap();

        assert_eq!(engine.job(&job.id).unwrap().status, JobStatus::ProposalApproved);
        let (_, total) = engine.contracts(&ContractFilter::default()).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_generic_transition_checks_job_first() {
        let (_dir, engine) = engine();
        let job = engine.create_job(new_job()).unwrap();
        let proposal = engine.create_proposal(&job.id, "vendor-1", "sow.pdf").unwrap();
        engine.transition_job_status(&job.id, JobStatus::Cancelled).unwrap();

        let err = engine
            .transition_proposal_status(&proposal.id, ProposalStatus::Approved)
            .unwrap_err();

        assert!(matches!(err, WorkflowError::InvalidTransition { entity: "job", .. }));
        assert_eq!(engine.proposal(&proposal.id).unwrap().status, ProposalStatus::Submitted);
    }

    #[test]
    fn test_register_template_rejects_unknown_fields() {
        let (_dir, engine) = engine();
        let err = engine
            .register_template(NewTemplate {
                owner_id: "client-1".to_string(),
                name: "Odd".to_string(),
                html: "<p>{{shoeSize}}</p>".to_string(),
                fields: vec!["vendorName".to_string(), "shoeSize".to_string()],
            })
            .unwrap_err();
        match err {
            WorkflowError::UnknownMergeField(keys) => assert_eq!(keys, vec!["shoeSize"]),
            other => panic!("expected UnknownMergeField, got {:?}", other),
        }
    }

    #[test]
    fn test_available_merge_fields() {
        let (_dir, engine) = engine();
        let keys: Vec<&str> = engine.available_merge_fields().iter().map(|f| f.key).collect();
        assert!(keys.contains(&"vendorName"));
        assert!(keys.contains(&"contractDate"));
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkflowEngine>();
    }
}
