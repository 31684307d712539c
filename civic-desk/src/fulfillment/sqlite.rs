//! Direct relational query backend.
//!
//! Inserts the query and routes it to the least-loaded active staff member
//! registered for its category, in one transaction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Assignment, QueryBackend, QueryReceipt, QuerySubmission};
use crate::error::DeskResult;
use crate::tracking;

/// Inserts tried before a tracking id collision is reported.
const MAX_ID_ATTEMPTS: u32 = 3;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS staff_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    whatsapp_number TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_staff_category ON staff_assignments(category_id, active);

CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    address TEXT NOT NULL,
    email TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    description TEXT NOT NULL,
    client_whatsapp TEXT NOT NULL,
    assigned_staff_id INTEGER REFERENCES staff_assignments(id),
    status TEXT NOT NULL DEFAULT 'open',
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteQueryBackend {
    db_path: PathBuf,
}

impl SqliteQueryBackend {
    /// Open (creating if needed) the database and its schema.
    pub fn open(path: impl AsRef<Path>) -> DeskResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { db_path })
    }

    /// Register a staff member for a category. Returns the row id.
    pub async fn add_staff(
        &self,
        category_id: u8,
        name: &str,
        email: Option<&str>,
        whatsapp_number: Option<&str>,
    ) -> DeskResult<i64> {
        let db_path = self.db_path.clone();
        let name = name.to_string();
        let email = email.map(str::to_string);
        let number = whatsapp_number.map(str::to_string);

        tokio::task::spawn_blocking(move || -> DeskResult<i64> {
            let conn = Connection::open(&db_path)?;
            conn.execute(
                "INSERT INTO staff_assignments (category_id, name, email, whatsapp_number) VALUES (?1, ?2, ?3, ?4)",
                params![category_id, name, email, number],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await?
    }

    /// Number of stored queries.
    pub async fn count_queries(&self) -> DeskResult<usize> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> DeskResult<usize> {
            let conn = Connection::open(&db_path)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await?
    }
}

#[async_trait]
impl QueryBackend for SqliteQueryBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn submit_query(&self, submission: &QuerySubmission) -> DeskResult<QueryReceipt> {
        let db_path = self.db_path.clone();
        let s = submission.clone();

        tokio::task::spawn_blocking(move || -> DeskResult<QueryReceipt> {
            let mut conn = Connection::open(&db_path)?;
            let mut tracking_id = s.tracking_id.clone();
            let mut attempt = 1;

            loop {
                match insert_query(&mut conn, &s, &tracking_id) {
                    Ok(staff) => {
                        return Ok(QueryReceipt {
                            accepted: true,
                            tracking_id,
                            assignment: staff,
                        });
                    }
                    Err(e) if is_duplicate_query_id(&e) && attempt < MAX_ID_ATTEMPTS => {
                        let fresh = tracking::redraw();
                        tracing::warn!(
                            taken = %tracking_id,
                            fresh = %fresh,
                            "Tracking id already stored, redrawing"
                        );
                        tracking_id = fresh;
                        attempt += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        })
        .await?
    }
}

/// Pick the assignee and insert the query in one transaction.
fn insert_query(
    conn: &mut Connection,
    s: &QuerySubmission,
    tracking_id: &str,
) -> rusqlite::Result<Option<Assignment>> {
    let tx = conn.transaction()?;

    let category_id = s.category.ordinal();
    let staff = tx
        .query_row(
            "SELECT s.id, s.name, s.email, s.whatsapp_number
             FROM staff_assignments s
             WHERE s.category_id = ?1 AND s.active = 1
             ORDER BY (
                 SELECT COUNT(*) FROM queries q
                 WHERE q.assigned_staff_id = s.id AND q.status = 'open'
             ), s.id
             LIMIT 1",
            params![category_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Assignment {
                        name: row.get(1)?,
                        email: row.get(2)?,
                        number: row.get(3)?,
                    },
                ))
            },
        )
        .optional()?;

    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO queries (query_id, full_name, address, email, category_id, description, client_whatsapp, assigned_staff_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tracking_id,
            s.full_name,
            s.address,
            s.email,
            category_id,
            s.description,
            s.client_whatsapp,
            staff.as_ref().map(|(id, _)| *id),
            now
        ],
    )?;
    tx.commit()?;

    Ok(staff.map(|(_, assignment)| assignment))
}

fn is_duplicate_query_id(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.contains("queries.query_id")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::error::DeskError;

    fn submission(tracking_id: &str, category: Category) -> QuerySubmission {
        QuerySubmission {
            full_name: "Jane Doe".into(),
            address: "12 Main St".into(),
            email: "jane@x.com".into(),
            category,
            description: "Need a permit".into(),
            tracking_id: tracking_id.into(),
            client_whatsapp: "263771234567".into(),
        }
    }

    #[tokio::test]
    async fn test_unassigned_when_no_staff() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteQueryBackend::open(dir.path().join("desk.db")).unwrap();

        let receipt = backend
            .submit_query(&submission("QR1W", Category::Tariffs))
            .await
            .unwrap();
        assert!(receipt.accepted);
        assert!(receipt.assignment.is_none());
        assert_eq!(backend.count_queries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_assigns_least_loaded_staff() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteQueryBackend::open(dir.path().join("desk.db")).unwrap();
        backend
            .add_staff(3, "Tino", Some("tino@example.org"), Some("263770000001"))
            .await
            .unwrap();
        backend
            .add_staff(3, "Rudo", Some("rudo@example.org"), None)
            .await
            .unwrap();
        backend.add_staff(9, "Other", None, None).await.unwrap();

        let first = backend
            .submit_query(&submission("QR1W", Category::DevelopmentPermit))
            .await
            .unwrap();
        let second = backend
            .submit_query(&submission("QR2W", Category::DevelopmentPermit))
            .await
            .unwrap();

        let first = first.assignment.unwrap();
        assert_eq!(first.name, "Tino");
        assert_eq!(first.number.as_deref(), Some("263770000001"));
        assert_eq!(second.assignment.unwrap().name, "Rudo");
    }

    #[tokio::test]
    async fn test_stored_tracking_id_is_redrawn() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("desk.db");

        {
            let backend = SqliteQueryBackend::open(&db).unwrap();
            backend
                .submit_query(&submission("QR7W", Category::Tariffs))
                .await
                .unwrap();
        }

        // Fresh process, same database, same draw
        let backend = SqliteQueryBackend::open(&db).unwrap();
        let receipt = backend
            .submit_query(&submission("QR7W", Category::Tariffs))
            .await
            .unwrap();
        assert!(receipt.accepted);
        assert_ne!(receipt.tracking_id, "QR7W");
        assert!(crate::tracking::is_tracking_id(&receipt.tracking_id));
        assert_eq!(backend.count_queries().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_other_constraint_failures_are_transport_errors() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("desk.db");
        let backend = SqliteQueryBackend::open(&db).unwrap();
        Connection::open(&db)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_all BEFORE INSERT ON queries
                 BEGIN SELECT RAISE(ABORT, 'read only'); END;",
            )
            .unwrap();

        let err = backend
            .submit_query(&submission("QR8W", Category::Tariffs))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Transport(_)));
        assert_eq!(backend.count_queries().await.unwrap(), 0);
    }
}
