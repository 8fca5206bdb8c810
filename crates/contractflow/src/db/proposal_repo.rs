//! Proposal repository: CRUD operations for the `proposals` table.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{now_timestamp, Database, DatabaseError, WhereBuilder};
use crate::workflow::status::ProposalStatus;

/// A proposal row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRow {
    pub id: String,
    pub job_id: String,
    pub vendor_id: String,
    /// Path of the vendor's scope-of-work PDF.
    pub scope_of_work_path: String,
    pub status: ProposalStatus,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ProposalRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            vendor_id: row.get("vendor_id")?,
            scope_of_work_path: row.get("scope_of_work_path")?,
            status: row.get("status")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for proposal listing.
#[derive(Debug, Default, Clone)]
pub struct ProposalFilter {
    pub job_id: Option<String>,
    pub vendor_id: Option<String>,
    pub status: Option<ProposalStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new proposal row.
pub fn insert(db: &Database, proposal: &ProposalRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO proposals (id, job_id, vendor_id, scope_of_work_path, status, version,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                proposal.id,
                proposal.job_id,
                proposal.vendor_id,
                proposal.scope_of_work_path,
                proposal.status,
                proposal.version,
                proposal.created_at,
                proposal.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Compare-and-swap update of the scope-of-work path and status.
pub fn update(db: &Database, proposal: &ProposalRow) -> Result<ProposalRow, DatabaseError> {
    let updated_at = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE proposals SET scope_of_work_path=?3, status=?4, updated_at=?5,
             version=version + 1
             WHERE id=?1 AND version=?2",
            params![
                proposal.id,
                proposal.version,
                proposal.scope_of_work_path,
                proposal.status,
                updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::VersionConflict {
                table: "proposals",
                id: proposal.id.clone(),
                expected: proposal.version,
            });
        }
        Ok(())
    })?;

    Ok(ProposalRow {
        version: proposal.version + 1,
        updated_at,
        ..proposal.clone()
    })
}

/// Removes a proposal row. Only used to compensate a failed creation.
pub fn delete(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM proposals WHERE id = ?1", params![id])?;
        Ok(())
    })
}

/// Finds a proposal by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ProposalRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM proposals WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ProposalRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries proposals with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &ProposalFilter,
) -> Result<(Vec<ProposalRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let status = filter.status.map(|s| s.as_str().to_string());
        let mut builder = WhereBuilder::new();
        builder.push("job_id", "=", filter.job_id.as_ref());
        builder.push("vendor_id", "=", filter.vendor_id.as_ref());
        builder.push("status", "=", status.as_ref());
        builder.fetch_page(
            conn,
            "proposals",
            filter.limit,
            filter.offset,
            ProposalRow::from_row,
        )
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::directory_repo::tests::seed_directory;
    use crate::db::job_repo;

    pub(crate) fn sample_proposal(id: &str, job_id: &str) -> ProposalRow {
        ProposalRow {
            id: id.to_string(),
            job_id: job_id.to_string(),
            vendor_id: "vendor-1".to_string(),
            scope_of_work_path: "/uploads/sow.pdf".to_string(),
            status: ProposalStatus::Submitted,
            version: 1,
            created_at: "2026-01-02T00:00:00+00:00".to_string(),
            updated_at: "2026-01-02T00:00:00+00:00".to_string(),
        }
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        seed_directory(&db);
        job_repo::insert(&db, &job_repo::tests::sample_job("job-1")).unwrap();
        db
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_proposal("p-1", "job-1")).unwrap();

        let found = find_by_id(&db, "p-1").unwrap().unwrap();
        assert_eq!(found.status, ProposalStatus::Submitted);
        assert_eq!(found.scope_of_work_path, "/uploads/sow.pdf");
    }

    #[test]
    fn test_update_is_compare_and_swap() {
        let db = test_db();
        let proposal = sample_proposal("p-2", "job-1");
        insert(&db, &proposal).unwrap();

        let mut approved = proposal.clone();
        approved.status = ProposalStatus::Approved;
        let stored = update(&db, &approved).unwrap();
        assert_eq!(stored.version, 2);

        let mut stale = proposal.clone();
        stale.status = ProposalStatus::Rejected;
        assert!(matches!(
            update(&db, &stale),
            Err(DatabaseError::VersionConflict { table: "proposals", .. })
        ));
        assert_eq!(
            find_by_id(&db, "p-2").unwrap().unwrap().status,
            ProposalStatus::Approved
        );
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        insert(&db, &sample_proposal("p-3", "job-1")).unwrap();
        delete(&db, "p-3").unwrap();
        assert!(find_by_id(&db, "p-3").unwrap().is_none());
        // Deleting a missing row is not an error.
        delete(&db, "p-3").unwrap();
    }

    #[test]
    fn test_query_by_job_and_status() {
        let db = test_db();
        insert(&db, &sample_proposal("p-a", "job-1")).unwrap();
        let mut deleted = sample_proposal("p-b", "job-1");
        deleted.status = ProposalStatus::Deleted;
        insert(&db, &deleted).unwrap();

        let (rows, total) = query(
            &db,
            &ProposalFilter {
                job_id: Some("job-1".to_string()),
                status: Some(ProposalStatus::Submitted),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "p-a");
    }
}
