//! Directory records: users (clients), vendors and properties.
//!
//! These rows are referenced by jobs and proposals and supply merge fields.
//! They have no workflow of their own, so only insert and lookup exist.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub service_type: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRow {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub created_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl VendorRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            address: row.get("address")?,
            service_type: row.get("service_type")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl PropertyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            address: row.get("address")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert_user(db: &Database, user: &UserRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (id, name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.name, user.email, user.phone, user.created_at],
        )?;
        Ok(())
    })
}

pub fn insert_vendor(db: &Database, vendor: &VendorRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vendors (id, name, email, phone, address, service_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                vendor.id,
                vendor.name,
                vendor.email,
                vendor.phone,
                vendor.address,
                vendor.service_type,
                vendor.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn insert_property(db: &Database, property: &PropertyRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO properties (id, owner_id, name, address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                property.id,
                property.owner_id,
                property.name,
                property.address,
                property.created_at,
            ],
        )?;
        Ok(())
    })
}

fn find_one<T>(
    conn: &Connection,
    sql: &str,
    id: &str,
    map_row: fn(&Row<'_>) -> Result<T, rusqlite::Error>,
) -> Result<Option<T>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params![id], map_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

pub fn find_user(db: &Database, id: &str) -> Result<Option<UserRow>, DatabaseError> {
    db.with_conn(|conn| find_one(conn, "SELECT * FROM users WHERE id = ?1", id, UserRow::from_row))
}

pub fn find_vendor(db: &Database, id: &str) -> Result<Option<VendorRow>, DatabaseError> {
    db.with_conn(|conn| {
        find_one(
            conn,
            "SELECT * FROM vendors WHERE id = ?1",
            id,
            VendorRow::from_row,
        )
    })
}

pub fn find_property(db: &Database, id: &str) -> Result<Option<PropertyRow>, DatabaseError> {
    db.with_conn(|conn| {
        find_one(
            conn,
            "SELECT * FROM properties WHERE id = ?1",
            id,
            PropertyRow::from_row,
        )
    })
}
