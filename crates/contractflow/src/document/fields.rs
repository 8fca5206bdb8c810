//! Merge-field registry.
//!
//! The set of fields a template may reference is fixed and built once at
//! startup. Each entry names the record it is read from, the attribute and
//! how the value is formatted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::directory_repo::{PropertyRow, UserRow, VendorRow};
use crate::db::job_repo::JobRow;
use crate::db::proposal_repo::ProposalRow;
use crate::sanitize;

use super::template::FieldMap;

/// Value used for any field whose source attribute is absent or empty.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeEntity {
    Job,
    Proposal,
    Vendor,
    Client,
    Property,
    /// Values computed at merge time.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Identifier,
    /// Rendered as e.g. `March 4, 2026`.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeField {
    /// Placeholder name, used as `{{key}}`.
    pub key: &'static str,
    pub entity: MergeEntity,
    /// Attribute of the source record.
    pub field: &'static str,
    pub kind: FieldKind,
}

const fn field(
    key: &'static str,
    entity: MergeEntity,
    field: &'static str,
    kind: FieldKind,
) -> MergeField {
    MergeField {
        key,
        entity,
        field,
        kind,
    }
}

const STANDARD_FIELDS: &[MergeField] = &[
    field("jobId", MergeEntity::Job, "id", FieldKind::Identifier),
    field("requestDetails", MergeEntity::Job, "request_details", FieldKind::Text),
    field("serviceType", MergeEntity::Job, "service_type", FieldKind::Text),
    field("jobStatus", MergeEntity::Job, "status", FieldKind::Text),
    field("jobCreatedAt", MergeEntity::Job, "created_at", FieldKind::Date),
    field("proposalId", MergeEntity::Proposal, "id", FieldKind::Identifier),
    field("proposalCreatedAt", MergeEntity::Proposal, "created_at", FieldKind::Date),
    field("scopeOfWork", MergeEntity::Proposal, "scope_of_work_path", FieldKind::Text),
    field("vendorName", MergeEntity::Vendor, "name", FieldKind::Text),
    field("vendorEmail", MergeEntity::Vendor, "email", FieldKind::Text),
    field("vendorPhone", MergeEntity::Vendor, "phone", FieldKind::Text),
    field("vendorAddress", MergeEntity::Vendor, "address", FieldKind::Text),
    field("vendorServiceType", MergeEntity::Vendor, "service_type", FieldKind::Text),
    field("clientName", MergeEntity::Client, "name", FieldKind::Text),
    field("clientEmail", MergeEntity::Client, "email", FieldKind::Text),
    field("clientPhone", MergeEntity::Client, "phone", FieldKind::Text),
    field("propertyName", MergeEntity::Property, "name", FieldKind::Text),
    field("propertyAddress", MergeEntity::Property, "address", FieldKind::Text),
    field("contractDate", MergeEntity::System, "generated_at", FieldKind::Date),
];

/// The records a field map is built from. Directory records are optional;
/// their fields fall back to [`NOT_AVAILABLE`].
pub struct MergeSources<'a> {
    pub job: &'a JobRow,
    pub proposal: &'a ProposalRow,
    pub vendor: Option<&'a VendorRow>,
    pub client: Option<&'a UserRow>,
    pub property: Option<&'a PropertyRow>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MergeFieldRegistry {
    fields: Vec<MergeField>,
}

impl Default for MergeFieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl MergeFieldRegistry {
    pub fn standard() -> Self {
        Self {
            fields: STANDARD_FIELDS.to_vec(),
        }
    }

    pub fn fields(&self) -> &[MergeField] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&MergeField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Keys in `keys` that the registry does not know.
    pub fn unknown_keys<'k>(&self, keys: &'k [String]) -> Vec<&'k str> {
        keys.iter()
            .map(String::as_str)
            .filter(|k| self.get(k).is_none())
            .collect()
    }

    /// Builds the substitution map for a merge.
    ///
    /// With an empty `selected` list every registry field is included,
    /// otherwise only the selected keys are.
    pub fn build_field_map(&self, sources: &MergeSources<'_>, selected: &[String]) -> FieldMap {
        self.fields
            .iter()
            .filter(|f| selected.is_empty() || selected.iter().any(|s| s == f.key))
            .map(|f| {
                let value = resolve(f, sources)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| format_value(f.kind, v))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                (f.key.to_string(), value)
            })
            .collect()
    }
}

fn resolve(field: &MergeField, s: &MergeSources<'_>) -> Option<String> {
    match (field.entity, field.field) {
        (MergeEntity::Job, "id") => Some(s.job.id.clone()),
        (MergeEntity::Job, "request_details") => Some(s.job.request_details.clone()),
        (MergeEntity::Job, "service_type") => Some(s.job.service_type.clone()),
        (MergeEntity::Job, "status") => Some(s.job.status.to_string()),
        (MergeEntity::Job, "created_at") => Some(s.job.created_at.clone()),
        (MergeEntity::Proposal, "id") => Some(s.proposal.id.clone()),
        (MergeEntity::Proposal, "created_at") => Some(s.proposal.created_at.clone()),
        (MergeEntity::Proposal, "scope_of_work_path") => Some(sanitize::redact_path(
            std::path::Path::new(&s.proposal.scope_of_work_path),
        )),
        (MergeEntity::Vendor, attr) => s.vendor.and_then(|v| match attr {
            "name" => Some(v.name.clone()),
            "email" => v.email.clone(),
            "phone" => v.phone.clone(),
            "address" => v.address.clone(),
            "service_type" => v.service_type.clone(),
            _ => None,
        }),
        (MergeEntity::Client, attr) => s.client.and_then(|c| match attr {
            "name" => Some(c.name.clone()),
            "email" => c.email.clone(),
            "phone" => c.phone.clone(),
            _ => None,
        }),
        (MergeEntity::Property, attr) => s.property.and_then(|p| match attr {
            "name" => Some(p.name.clone()),
            "address" => p.address.clone(),
            _ => None,
        }),
        (MergeEntity::System, "generated_at") => Some(s.generated_at.to_rfc3339()),
        _ => None,
    }
}

fn format_value(kind: FieldKind, value: String) -> String {
    match kind {
        FieldKind::Date => DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.format("%B %-d, %Y").to_string())
            .unwrap_or(value),
        FieldKind::Text | FieldKind::Identifier => value,
    }
}
