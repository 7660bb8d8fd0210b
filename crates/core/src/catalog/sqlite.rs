//! SQLite-backed catalog store implementation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogError, CatalogStore, Chapter, Library, NewTitle, Title};
use crate::queue::JobKey;

const TITLE_COLUMNS: &str = "t.id, t.name, t.source, t.interval, t.created_at, t.updated_at, l.id, l.path";

/// SQLite-backed catalog store.
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Create a new SQLite catalog store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog store (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS libraries (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS titles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                source TEXT NOT NULL,
                interval TEXT NOT NULL,
                key_namespace TEXT NOT NULL UNIQUE,
                library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(library_id, name)
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title_id TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
                chapter_index INTEGER NOT NULL,
                filename TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(title_id, chapter_index)
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_title ON chapters(title_id);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_title(row: &rusqlite::Row) -> rusqlite::Result<Title> {
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        let library_path: String = row.get(7)?;

        Ok(Title {
            id: row.get(0)?,
            name: row.get(1)?,
            source: row.get(2)?,
            interval: row.get(3)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
            library: Library {
                id: row.get(6)?,
                path: PathBuf::from(library_path),
            },
        })
    }

    fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<Chapter> {
        let created_at: String = row.get(4)?;
        Ok(Chapter {
            id: row.get(0)?,
            title_id: row.get(1)?,
            index: row.get(2)?,
            filename: row.get(3)?,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn query_title(conn: &Connection, id: &str) -> Result<Option<Title>, CatalogError> {
        conn.query_row(
            &format!(
                "SELECT {TITLE_COLUMNS} FROM titles t JOIN libraries l ON l.id = t.library_id WHERE t.id = ?"
            ),
            params![id],
            Self::row_to_title,
        )
        .optional()
        .map_err(db_err)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert_library(&self, path: &str) -> Result<Library, CatalogError> {
        let conn = self.lock()?;

        let existing = conn
            .query_row(
                "SELECT id, path FROM libraries WHERE path = ?",
                params![path],
                |row| {
                    Ok(Library {
                        id: row.get(0)?,
                        path: PathBuf::from(row.get::<_, String>(1)?),
                    })
                },
            )
            .optional()
            .map_err(db_err)?;

        if let Some(library) = existing {
            return Ok(library);
        }

        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO libraries (id, path) VALUES (?, ?)",
            params![id, path],
        )
        .map_err(db_err)?;

        Ok(Library {
            id,
            path: PathBuf::from(path),
        })
    }

    async fn get_library(&self, id: &str) -> Result<Option<Library>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, path FROM libraries WHERE id = ?",
            params![id],
            |row| {
                Ok(Library {
                    id: row.get(0)?,
                    path: PathBuf::from(row.get::<_, String>(1)?),
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    async fn create_title(&self, request: NewTitle) -> Result<Title, CatalogError> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        // Job keys are derived from this, so it must be unique across libraries
        let namespace = JobKey::namespace(&request.name);

        let taken: Option<String> = conn
            .query_row(
                "SELECT name FROM titles WHERE key_namespace = ?",
                params![namespace],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if let Some(existing) = taken {
            return Err(CatalogError::Conflict(format!(
                "title '{}' shares job keys '{}' with existing title '{}'",
                request.name, namespace, existing
            )));
        }

        conn.execute(
            "INSERT INTO titles (id, name, source, interval, key_namespace, library_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.name,
                request.source,
                request.interval,
                namespace,
                request.library_id,
                now,
                now,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CatalogError::Conflict(format!(
                    "title '{}' already exists in library {} (or library is missing)",
                    request.name, request.library_id
                ))
            }
            other => db_err(other),
        })?;

        Self::query_title(&conn, &id)?.ok_or(CatalogError::NotFound(id))
    }

    async fn get_title(&self, id: &str) -> Result<Option<Title>, CatalogError> {
        let conn = self.lock()?;
        Self::query_title(&conn, id)
    }

    async fn list_titles(&self) -> Result<Vec<Title>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TITLE_COLUMNS} FROM titles t JOIN libraries l ON l.id = t.library_id ORDER BY t.name"
            ))
            .map_err(db_err)?;

        let rows = stmt.query_map([], Self::row_to_title).map_err(db_err)?;

        let mut titles = Vec::new();
        for row in rows {
            titles.push(row.map_err(db_err)?);
        }
        Ok(titles)
    }

    async fn update_interval(&self, id: &str, interval: &str) -> Result<Title, CatalogError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE titles SET interval = ?, updated_at = ? WHERE id = ?",
                params![interval, format_timestamp(Utc::now()), id],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        Self::query_title(&conn, id)?.ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    async fn delete_title(&self, id: &str) -> Result<Title, CatalogError> {
        let conn = self.lock()?;
        let title =
            Self::query_title(&conn, id)?.ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        // Chapters go with the title via ON DELETE CASCADE
        conn.execute("DELETE FROM titles WHERE id = ?", params![id])
            .map_err(db_err)?;

        Ok(title)
    }

    async fn find_chapters(&self, title_id: &str) -> Result<Vec<Chapter>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title_id, chapter_index, filename, created_at
                 FROM chapters WHERE title_id = ? ORDER BY chapter_index",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![title_id], Self::row_to_chapter)
            .map_err(db_err)?;

        let mut chapters = Vec::new();
        for row in rows {
            chapters.push(row.map_err(db_err)?);
        }
        Ok(chapters)
    }

    async fn delete_chapters(
        &self,
        title_id: &str,
        keep_indices: &[u32],
        keep_filenames: &[String],
    ) -> Result<u64, CatalogError> {
        let conn = self.lock()?;

        let mut sql = String::from("DELETE FROM chapters WHERE title_id = ?");
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(title_id.to_string())];

        if !keep_indices.is_empty() {
            sql.push_str(&format!(
                " AND chapter_index NOT IN ({})",
                placeholders(keep_indices.len())
            ));
            for index in keep_indices {
                sql_params.push(Box::new(*index));
            }
        }

        if !keep_filenames.is_empty() {
            sql.push_str(&format!(
                " AND filename NOT IN ({})",
                placeholders(keep_filenames.len())
            ));
            for filename in keep_filenames {
                sql_params.push(Box::new(filename.clone()));
            }
        }

        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();
        let deleted = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(db_err)?;

        Ok(deleted as u64)
    }

    async fn create_chapter(
        &self,
        title_id: &str,
        index: u32,
        filename: &str,
    ) -> Result<Chapter, CatalogError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO chapters (title_id, chapter_index, filename, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(title_id, chapter_index) DO NOTHING",
            params![title_id, index, filename, format_timestamp(Utc::now())],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CatalogError::NotFound(title_id.to_string())
            }
            other => db_err(other),
        })?;

        conn.query_row(
            "SELECT id, title_id, chapter_index, filename, created_at
             FROM chapters WHERE title_id = ? AND chapter_index = ?",
            params![title_id, index],
            Self::row_to_chapter,
        )
        .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> CatalogError {
    CatalogError::Database(e.to_string())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
