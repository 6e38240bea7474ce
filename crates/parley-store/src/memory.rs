use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use parley_types::models::{Message, User, Visibility};

use crate::{NewMessage, NewUser, Storage, StorageError};

/// Volatile backend: all records live in process memory and are lost on
/// restart. Id allocation and map mutation happen under a single lock
/// acquisition, so concurrent submissions cannot mint duplicate ids or lose
/// writes. The lock is never held across an await point.
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

struct Inner {
    users: HashMap<i64, User>,
    messages: HashMap<i64, Message>,
    next_user_id: i64,
    next_message_id: i64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                users: HashMap::new(),
                messages: HashMap::new(),
                next_user_id: 1,
                next_message_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Backend(format!("state lock poisoned: {e}")))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut inner = self.lock()?;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::Constraint(format!(
                "username '{}' is already taken",
                user.username
            )));
        }

        let id = inner.next_user_id;
        inner.next_user_id += 1;

        let user = User {
            id,
            username: user.username,
            password: user.password,
            domain: user.domain,
            is_admin: false,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        let mut inner = self.lock()?;

        let id = inner.next_message_id;
        inner.next_message_id += 1;

        let message = Message {
            id,
            author_id: message.author_id,
            content: message.content,
            visibility: message.visibility,
            domain: message.domain,
            created_at: Utc::now(),
        };
        inner.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn get_messages(
        &self,
        visibility: Visibility,
        domain: Option<&str>,
    ) -> Result<Vec<Message>, StorageError> {
        let inner = self.lock()?;

        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| scope_matches(m, visibility, domain))
            .cloned()
            .collect();

        // Newest first; id breaks same-instant ties so the order is total
        // and matches the durable backend.
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages)
    }
}

fn scope_matches(message: &Message, visibility: Visibility, domain: Option<&str>) -> bool {
    match visibility {
        Visibility::Admin => message.visibility == Visibility::Admin,
        Visibility::Domain => match domain {
            Some(d) => {
                message.visibility == Visibility::Domain && message.domain.as_deref() == Some(d)
            }
            None => false,
        },
        Visibility::Public => message.visibility == Visibility::Public,
    }
}
