use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::goal::GoalRecord;

#[derive(Debug, Clone)]
pub struct GoalRow {
    pub id: String,
    pub title: String,
    pub target_date: Option<String>,
    pub created_at: String,
}

impl GoalRow {
    pub fn from_record(record: &GoalRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            target_date: record.target_date.clone(),
            created_at: record.created_at.clone(),
        }
    }

    pub fn into_record(self) -> GoalRecord {
        GoalRecord {
            id: self.id,
            title: self.title,
            target_date: self.target_date,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for GoalRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            target_date: row.get("target_date")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct GoalRepository;

impl GoalRepository {
    pub fn insert(conn: &Connection, row: &GoalRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO goals (id, title, target_date, created_at)
                VALUES (:id, :title, :target_date, :created_at)
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":target_date": &row.target_date,
                ":created_at": &row.created_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<GoalRow>> {
        let mut stmt =
            conn.prepare("SELECT id, title, target_date, created_at FROM goals WHERE id = ?1")?;
        let row = stmt
            .query_row([id], |row| GoalRow::try_from(row))
            .optional()?;
        Ok(row)
    }
}
