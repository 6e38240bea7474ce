pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use thiserror::Error;

use parley_types::models::{Message, User, Visibility};

#[derive(Debug, Error)]
pub enum StorageError {
    /// Uniqueness violated by the backing store (duplicate username).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Input for [`Storage::create_user`]. The id is assigned by the store and
/// the admin flag always starts false.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Argon2 hash, produced by the caller.
    pub password: String,
    pub domain: String,
}

/// Input for [`Storage::create_message`]. The caller is responsible for
/// validation and moderation; the store assigns the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub author_id: i64,
    pub content: String,
    pub visibility: Visibility,
    pub domain: Option<String>,
}

/// Persistence contract shared by the volatile and durable backends. The
/// backend is chosen once at process start; handlers only ever see
/// `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Assigns the next id, forces `is_admin = false`, persists, and returns
    /// the full record. `StorageError::Constraint` on duplicate username.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    /// Point lookup; absence is `Ok(None)`, not an error.
    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError>;

    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<User>, StorageError>;

    /// Assigns the next id, stamps the creation time, persists, and returns
    /// the full record.
    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError>;

    /// Messages matching the requested scope, newest first.
    ///
    /// - `Admin`: all admin-visibility messages
    /// - `Domain` + `Some(d)`: domain-visibility messages whose domain == d
    /// - `Domain` + `None`: nothing
    /// - `Public`: all public-visibility messages
    async fn get_messages(
        &self,
        visibility: Visibility,
        domain: Option<&str>,
    ) -> Result<Vec<Message>, StorageError>;
}
