//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{now_timestamp, Database, DatabaseError, WhereBuilder};
use crate::workflow::status::JobStatus;

/// A job row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub id: String,
    pub property_id: String,
    pub client_id: String,
    pub request_details: String,
    pub service_type: String,
    pub status: JobStatus,
    pub vendor_id: Option<String>,
    pub proposal_id: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            property_id: row.get("property_id")?,
            client_id: row.get("client_id")?,
            request_details: row.get("request_details")?,
            service_type: row.get("service_type")?,
            status: row.get("status")?,
            vendor_id: row.get("vendor_id")?,
            proposal_id: row.get("proposal_id")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub client_id: Option<String>,
    pub vendor_id: Option<String>,
    pub property_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, property_id, client_id, request_details, service_type,
             status, vendor_id, proposal_id, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.property_id,
                job.client_id,
                job.request_details,
                job.service_type,
                job.status,
                job.vendor_id,
                job.proposal_id,
                job.version,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Writes the mutable fields of `job` if the stored version still equals
/// `job.version`. Returns the stored row (new version, new `updated_at`).
pub fn update(db: &Database, job: &JobRow) -> Result<JobRow, DatabaseError> {
    let updated_at = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET request_details=?3, service_type=?4, status=?5, vendor_id=?6,
             proposal_id=?7, updated_at=?8, version=version + 1
             WHERE id=?1 AND version=?2",
            params![
                job.id,
                job.version,
                job.request_details,
                job.service_type,
                job.status,
                job.vendor_id,
                job.proposal_id,
                updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::VersionConflict {
                table: "jobs",
                id: job.id.clone(),
                expected: job.version,
            });
        }
        Ok(())
    })?;

    Ok(JobRow {
        version: job.version + 1,
        updated_at,
        ..job.clone()
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let status = filter.status.map(|s| s.as_str().to_string());
        let mut builder = WhereBuilder::new();
        builder.push("status", "=", status.as_ref());
        builder.push("client_id", "=", filter.client_id.as_ref());
        builder.push("vendor_id", "=", filter.vendor_id.as_ref());
        builder.push("property_id", "=", filter.property_id.as_ref());
        builder.fetch_page(conn, "jobs", filter.limit, filter.offset, JobRow::from_row)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::directory_repo::tests::seed_directory;

    pub(crate) fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            property_id: "prop-1".to_string(),
            client_id: "client-1".to_string(),
            request_details: "Replace the roof".to_string(),
            service_type: "Roofing".to_string(),
            status: JobStatus::Pending,
            vendor_id: None,
            proposal_id: None,
            version: 1,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        seed_directory(&db);
        db
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("job-1")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.request_details, "Replace the roof");
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.version, 1);
        assert!(found.proposal_id.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_update_bumps_version() {
        let db = test_db();
        let mut job = sample_job("job-2");
        insert(&db, &job).unwrap();

        job.status = JobStatus::ProposalSubmitted;
        job.proposal_id = Some("p-1".to_string());
        job.vendor_id = Some("vendor-1".to_string());
        let stored = update(&db, &job).unwrap();
        assert_eq!(stored.version, 2);

        let found = find_by_id(&db, "job-2").unwrap().unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.status, JobStatus::ProposalSubmitted);
        assert_eq!(found.proposal_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let db = test_db();
        let job = sample_job("job-3");
        insert(&db, &job).unwrap();

        let mut first = job.clone();
        first.status = JobStatus::Cancelled;
        update(&db, &first).unwrap();

        let mut second = job.clone();
        second.status = JobStatus::ProposalSubmitted;
        let err = update(&db, &second).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::VersionConflict { table: "jobs", expected: 1, .. }
        ));

        let found = find_by_id(&db, "job-3").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Cancelled);
    }

    #[test]
    fn test_update_missing_row_conflicts() {
        let db = test_db();
        let err = update(&db, &sample_job("ghost")).unwrap_err();
        assert!(matches!(err, DatabaseError::VersionConflict { .. }));
    }

    #[test]
    fn test_query_with_status_filter() {
        let db = test_db();
        insert(&db, &sample_job("s1")).unwrap();
        let mut cancelled = sample_job("s2");
        cancelled.status = JobStatus::Cancelled;
        insert(&db, &cancelled).unwrap();

        let (rows, total) = query(
            &db,
            &JobFilter {
                status: Some(JobStatus::Cancelled),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "s2");
    }

    #[test]
    fn test_query_pagination_newest_first() {
        let db = test_db();
        for i in 0..10 {
            let mut job = sample_job(&format!("p{}", i));
            job.created_at = format!("2026-01-{:02}T00:00:00+00:00", i + 1);
            insert(&db, &job).unwrap();
        }

        let (rows, total) = query(
            &db,
            &JobFilter {
                limit: Some(3),
                offset: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, "p8");
    }
}
