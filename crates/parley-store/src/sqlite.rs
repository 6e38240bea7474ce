use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use parley_types::models::{Message, User, Visibility};

use crate::{NewMessage, NewUser, Storage, StorageError, migrations};

/// Durable backend: SQLite in WAL mode. Filtering and ordering are delegated
/// to SQL so result sets match the volatile backend exactly. Every call runs
/// on the blocking pool; the connection lock is never held across an await
/// point.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(backend)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL").map_err(backend)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(backend)?;

        migrations::run(&conn)?;

        info!("sqlite storage opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::Backend(format!("connection lock poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("blocking task join error: {e}")))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (username, password, domain) VALUES (?1, ?2, ?3)",
                params![user.username, user.password, user.domain],
            )
            .map_err(map_sqlite_err)?;

            Ok(User {
                id: conn.last_insert_rowid(),
                username: user.username,
                password: user.password,
                domain: user.domain,
                is_admin: false,
            })
        })
        .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        self.with_conn(move |conn| query_user_by_id(conn, id)).await
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        let username = username.to_string();
        self.with_conn(move |conn| query_user_by_username(conn, &username))
            .await
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        self.with_conn(move |conn| {
            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO messages (author_id, content, visibility, domain, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.author_id,
                    message.content,
                    message.visibility.as_str(),
                    message.domain,
                    encode_timestamp(created_at),
                ],
            )
            .map_err(map_sqlite_err)?;

            Ok(Message {
                id: conn.last_insert_rowid(),
                author_id: message.author_id,
                content: message.content,
                visibility: message.visibility,
                domain: message.domain,
                created_at,
            })
        })
        .await
    }

    async fn get_messages(
        &self,
        visibility: Visibility,
        domain: Option<&str>,
    ) -> Result<Vec<Message>, StorageError> {
        // The rule table sends domain-scope reads without a domain nowhere.
        let domain = match (visibility, domain) {
            (Visibility::Domain, None) => return Ok(Vec::new()),
            (Visibility::Domain, Some(d)) => Some(d.to_string()),
            _ => None,
        };

        self.with_conn(move |conn| match &domain {
            Some(d) => query_messages(
                conn,
                "SELECT id, author_id, content, visibility, domain, created_at
                 FROM messages
                 WHERE visibility = ?1 AND domain = ?2
                 ORDER BY created_at DESC, id DESC",
                params![visibility.as_str(), d],
            ),
            None => query_messages(
                conn,
                "SELECT id, author_id, content, visibility, domain, created_at
                 FROM messages
                 WHERE visibility = ?1
                 ORDER BY created_at DESC, id DESC",
                params![visibility.as_str()],
            ),
        })
        .await
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT id, username, password, domain, is_admin FROM users WHERE id = ?1")
        .map_err(backend)?;

    stmt.query_row([id], user_from_row).optional().map_err(backend)
}

fn query_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, StorageError> {
    let mut stmt = conn
        .prepare("SELECT id, username, password, domain, is_admin FROM users WHERE username = ?1")
        .map_err(backend)?;

    stmt.query_row([username], user_from_row)
        .optional()
        .map_err(backend)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        domain: row.get(3)?,
        is_admin: row.get::<_, i64>(4)? != 0,
    })
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Message>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(backend)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(backend)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(backend)?;

    rows.into_iter()
        .map(|(id, author_id, content, visibility, domain, created_at)| {
            Ok(Message {
                id,
                author_id,
                content,
                visibility: Visibility::parse(&visibility).ok_or_else(|| {
                    StorageError::Backend(format!(
                        "corrupt visibility '{visibility}' on message {id}"
                    ))
                })?,
                domain,
                created_at: decode_timestamp(&created_at, id)?,
            })
        })
        .collect()
}

/// Fixed-width RFC 3339 so lexicographic TEXT ordering in SQL matches
/// chronological ordering.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str, message_id: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::Backend(format!(
                "corrupt created_at '{raw}' on message {message_id}: {e}"
            ))
        })
}

fn map_sqlite_err(e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::Constraint(e.to_string())
        }
        _ => StorageError::Backend(e.to_string()),
    }
}

fn backend(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}
