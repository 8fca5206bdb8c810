//! Contract template repository.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError, WhereBuilder};

/// A contract template row. `fields` is stored as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// HTML with `{{fieldName}}` placeholders.
    pub content: String,
    /// Merge-field keys selected when the template was created.
    pub fields: Vec<String>,
    pub created_at: String,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let fields_json: String = row.get("fields")?;
        let fields = serde_json::from_str(&fields_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            content: row.get("content")?,
            fields,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct TemplateFilter {
    pub owner_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, template: &TemplateRow) -> Result<(), DatabaseError> {
    let fields = serde_json::to_string(&template.fields).map_err(|e| DatabaseError::Json {
        table: "contract_templates",
        column: "fields",
        source: e,
    })?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO contract_templates (id, owner_id, name, content, fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template.id,
                template.owner_id,
                template.name,
                template.content,
                fields,
                template.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TemplateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM contract_templates WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TemplateRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn query(
    db: &Database,
    filter: &TemplateFilter,
) -> Result<(Vec<TemplateRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut builder = WhereBuilder::new();
        builder.push("owner_id", "=", filter.owner_id.as_ref());
        builder.fetch_page(
            conn,
            "contract_templates",
            filter.limit,
            filter.offset,
            TemplateRow::from_row,
        )
    })
}
