//! SQLite-backed approval store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::ApprovalStore;
use super::types::{ApprovalError, ApprovalRequest, ApprovalStatus};

const COLUMNS: &str = "id, metric_category, metric_name, old_value, new_value, drift_pct, \
     severity, status, requested_by, reviewed_by, requested_at, reviewed_at, review_notes, \
     auto_applied";

/// SQLite-backed approval store.
pub struct SqliteApprovalStore {
    conn: Mutex<Connection>,
}

impl SqliteApprovalStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, ApprovalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApprovalError::Database(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, ApprovalError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ApprovalError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS approval_requests (
                id TEXT PRIMARY KEY,
                metric_category TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                old_value REAL NOT NULL,
                new_value REAL NOT NULL,
                drift_pct REAL NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                requested_by TEXT NOT NULL,
                reviewed_by TEXT,
                requested_at TEXT NOT NULL,
                reviewed_at TEXT,
                review_notes TEXT,
                auto_applied INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_approval_status ON approval_requests(status);
            CREATE INDEX IF NOT EXISTS idx_approval_requested_at ON approval_requests(requested_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApprovalError> {
        self.conn
            .lock()
            .map_err(|e| ApprovalError::Database(format!("connection lock poisoned: {e}")))
    }

    fn row_to_request(row: &rusqlite::Row) -> rusqlite::Result<RawRequest> {
        Ok(RawRequest {
            id: row.get(0)?,
            metric_category: row.get(1)?,
            metric_name: row.get(2)?,
            old_value: row.get(3)?,
            new_value: row.get(4)?,
            drift_pct: row.get(5)?,
            severity: row.get(6)?,
            status: row.get(7)?,
            requested_by: row.get(8)?,
            reviewed_by: row.get(9)?,
            requested_at: row.get(10)?,
            reviewed_at: row.get(11)?,
            review_notes: row.get(12)?,
            auto_applied: row.get(13)?,
        })
    }

    fn get_with(conn: &Connection, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError> {
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM approval_requests WHERE id = ?1"),
                params![id],
                Self::row_to_request,
            )
            .optional()?;
        raw.map(RawRequest::into_request).transpose()
    }
}

/// Row as stored, before enum and timestamp parsing.
struct RawRequest {
    id: String,
    metric_category: String,
    metric_name: String,
    old_value: f64,
    new_value: f64,
    drift_pct: f64,
    severity: String,
    status: String,
    requested_by: String,
    reviewed_by: Option<String>,
    requested_at: String,
    reviewed_at: Option<String>,
    review_notes: Option<String>,
    auto_applied: bool,
}

impl RawRequest {
    fn into_request(self) -> Result<ApprovalRequest, ApprovalError> {
        Ok(ApprovalRequest {
            severity: self.severity.parse()?,
            status: self.status.parse()?,
            requested_at: parse_time(&self.requested_at)?,
            reviewed_at: self.reviewed_at.as_deref().map(parse_time).transpose()?,
            id: self.id,
            metric_category: self.metric_category,
            metric_name: self.metric_name,
            old_value: self.old_value,
            new_value: self.new_value,
            drift_pct: self.drift_pct,
            requested_by: self.requested_by,
            reviewed_by: self.reviewed_by,
            review_notes: self.review_notes,
            auto_applied: self.auto_applied,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, ApprovalError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApprovalError::Database(format!("bad timestamp '{raw}': {e}")))
}

impl ApprovalStore for SqliteApprovalStore {
    fn create(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO approval_requests ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                request.id,
                request.metric_category,
                request.metric_name,
                request.old_value,
                request.new_value,
                request.drift_pct,
                request.severity.as_str(),
                request.status.as_str(),
                request.requested_by,
                request.reviewed_by,
                request.requested_at.to_rfc3339(),
                request.reviewed_at.map(|t| t.to_rfc3339()),
                request.review_notes,
                request.auto_applied,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError> {
        let conn = self.lock()?;
        Self::get_with(&conn, id)
    }

    fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let conn = self.lock()?;
        let raws = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM approval_requests WHERE status = ?1 \
                     ORDER BY requested_at ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map(params![status.as_str()], Self::row_to_request)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM approval_requests ORDER BY requested_at ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map([], Self::row_to_request)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        raws.into_iter().map(RawRequest::into_request).collect()
    }

    fn transition(
        &self,
        id: &str,
        to: ApprovalStatus,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if to == ApprovalStatus::Pending {
            return Err(ApprovalError::InvalidTransition(
                "a request cannot be moved back to pending".to_string(),
            ));
        }

        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE approval_requests \
             SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, review_notes = ?4 \
             WHERE id = ?5 AND status = 'pending'",
            params![to.as_str(), reviewer, Utc::now().to_rfc3339(), notes, id],
        )?;

        let current = Self::get_with(&conn, id)?;
        match (changed, current) {
            (_, None) => Err(ApprovalError::NotFound(id.to_string())),
            (0, Some(existing)) => Err(ApprovalError::AlreadyProcessed {
                id: id.to_string(),
                status: existing.status,
            }),
            (_, Some(updated)) => Ok(updated),
        }
    }
}
