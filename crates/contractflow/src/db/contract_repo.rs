//! Contract repository: CRUD operations for the `contracts` table.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{now_timestamp, Database, DatabaseError, WhereBuilder};
use crate::workflow::status::ContractStatus;

/// A contract row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRow {
    pub id: String,
    pub job_id: String,
    pub vendor_id: String,
    pub proposal_id: String,
    /// Template the contract was merged from.
    pub template_id: Option<String>,
    /// Scope-of-work PDF that was appended to the rendered template.
    pub scope_of_work_path: String,
    /// Path of the merged contract artifact.
    pub merged_contract_pdf: String,
    pub status: ContractStatus,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ContractRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            vendor_id: row.get("vendor_id")?,
            proposal_id: row.get("proposal_id")?,
            template_id: row.get("template_id")?,
            scope_of_work_path: row.get("scope_of_work_path")?,
            merged_contract_pdf: row.get("merged_contract_pdf")?,
            status: row.get("status")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for contract listing.
#[derive(Debug, Default, Clone)]
pub struct ContractFilter {
    pub job_id: Option<String>,
    pub proposal_id: Option<String>,
    pub vendor_id: Option<String>,
    pub status: Option<ContractStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new contract row.
///
/// A proposal carries at most one contract; inserting a second one for the
/// same proposal fails with [`DatabaseError::AlreadyClaimed`] on `proposals`.
pub fn insert(db: &Database, contract: &ContractRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO contracts (id, job_id, vendor_id, proposal_id, template_id,
             scope_of_work_path, merged_contract_pdf, status, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                contract.id,
                contract.job_id,
                contract.vendor_id,
                contract.proposal_id,
                contract.template_id,
                contract.scope_of_work_path,
                contract.merged_contract_pdf,
                contract.status,
                contract.version,
                contract.created_at,
                contract.updated_at,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(DatabaseError::AlreadyClaimed {
                    table: "proposals",
                    id: contract.proposal_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    })
}

/// Compare-and-swap status update. Every other column is immutable once
/// the contract exists.
pub fn update_status(
    db: &Database,
    contract: &ContractRow,
    status: ContractStatus,
) -> Result<ContractRow, DatabaseError> {
    let updated_at = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE contracts SET status=?3, updated_at=?4, version=version + 1
             WHERE id=?1 AND version=?2",
            params![contract.id, contract.version, status, updated_at],
        )?;
        if changed == 0 {
            return Err(DatabaseError::VersionConflict {
                table: "contracts",
                id: contract.id.clone(),
                expected: contract.version,
            });
        }
        Ok(())
    })?;

    Ok(ContractRow {
        status,
        version: contract.version + 1,
        updated_at,
        ..contract.clone()
    })
}

/// Removes a contract row. Only used to compensate a failed approval.
pub fn delete(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM contracts WHERE id = ?1", params![id])?;
        Ok(())
    })
}

/// Finds a contract by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ContractRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM contracts WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ContractRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries contracts with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &ContractFilter,
) -> Result<(Vec<ContractRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let status = filter.status.map(|s| s.as_str().to_string());
        let mut builder = WhereBuilder::new();
        builder.push("job_id", "=", filter.job_id.as_ref());
        builder.push("proposal_id", "=", filter.proposal_id.as_ref());
        builder.push("vendor_id", "=", filter.vendor_id.as_ref());
        builder.push("status", "=", status.as_ref());
        builder.fetch_page(
            conn,
            "contracts",
            filter.limit,
            filter.offset,
            ContractRow::from_row,
        )
    })
}
