use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// In-memory user and per-module progress store. Swap-in boundary for a real
/// datastore; nothing here persists across restarts.
#[derive(Clone)]
pub struct ProgressStore {
    shared: Arc<StoreShared>,
}

struct StoreShared {
    inner: RwLock<StoreData>,
}

#[derive(Default)]
struct StoreData {
    users: HashMap<u32, User>,
    progress: HashMap<(u32, String), ProgressRecord>,
    next_user_id: u32,
    next_progress_id: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: u32,
    pub user_id: u32,
    pub module_id: String,
    pub completed: bool,
    pub completed_at: Option<u64>,
    pub time_spent: u32,
    pub assessment_data: Option<serde_json::Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Partial write applied to a module's progress record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUpdate {
    pub completed: Option<bool>,
    pub time_spent: Option<u32>,
    pub assessment_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    EmailTaken,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::EmailTaken => write!(f, "사용자가 이미 존재합니다"),
        }
    }
}

impl std::error::Error for RegisterError {}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(StoreShared {
                inner: RwLock::new(StoreData::default()),
            }),
        }
    }

    pub fn register(&self, new_user: NewUser) -> Result<User, RegisterError> {
        let mut guard = self.shared.inner.write();
        if guard
            .users
            .values()
            .any(|user| user.email == new_user.email)
        {
            return Err(RegisterError::EmailTaken);
        }
        guard.next_user_id += 1;
        let user = User {
            id: guard.next_user_id,
            username: new_user.username,
            email: new_user.email,
            password: new_user.password,
            created_at: now_ts(),
        };
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Plaintext comparison, matching the service this store fronts for.
    pub fn login(&self, email: &str, password: &str) -> Option<User> {
        let guard = self.shared.inner.read();
        guard
            .users
            .values()
            .find(|user| user.email == email && user.password == password)
            .cloned()
    }

    pub fn user(&self, id: u32) -> Option<User> {
        self.shared.inner.read().users.get(&id).cloned()
    }

    /// Every progress record belonging to a user.
    pub fn user_progress(&self, user_id: u32) -> Vec<ProgressRecord> {
        let guard = self.shared.inner.read();
        let mut rows: Vec<_> = guard
            .progress
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        rows
    }

    /// Creates the record on first write for a `(user, module)` pair and
    /// updates it in place afterwards. Records are never deleted.
    pub fn update_progress(
        &self,
        user_id: u32,
        module_id: &str,
        update: ProgressUpdate,
    ) -> ProgressRecord {
        let now = now_ts();
        let mut guard = self.shared.inner.write();
        let key = (user_id, module_id.to_string());
        if let Some(existing) = guard.progress.get_mut(&key) {
            if let Some(completed) = update.completed {
                existing.completed = completed;
                if completed && existing.completed_at.is_none() {
                    existing.completed_at = Some(now);
                }
            }
            if let Some(time_spent) = update.time_spent {
                existing.time_spent = time_spent;
            }
            if let Some(assessment) = update.assessment_data {
                existing.assessment_data = Some(assessment);
            }
            existing.updated_at = now;
            return existing.clone();
        }

        guard.next_progress_id += 1;
        let completed = update.completed.unwrap_or(false);
        let record = ProgressRecord {
            id: guard.next_progress_id,
            user_id,
            module_id: module_id.to_string(),
            completed,
            completed_at: completed.then_some(now),
            time_spent: update.time_spent.unwrap_or(0),
            assessment_data: update.assessment_data,
            created_at: now,
            updated_at: now,
        };
        guard.progress.insert(key, record.clone());
        record
    }

    pub fn module_progress(&self, user_id: u32, module_id: &str) -> Option<ProgressRecord> {
        let guard = self.shared.inner.read();
        guard
            .progress
            .get(&(user_id, module_id.to_string()))
            .cloned()
    }
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "kim".to_string(),
            email: email.to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn register_rejects_duplicate_emails() {
        let store = ProgressStore::new();
        store.register(new_user("kim@univ.ac.kr")).expect("first");
        let err = store.register(new_user("kim@univ.ac.kr")).unwrap_err();
        assert_eq!(err, RegisterError::EmailTaken);
    }

    #[test]
    fn login_checks_password() {
        let store = ProgressStore::new();
        let user = store.register(new_user("kim@univ.ac.kr")).expect("registered");
        assert_eq!(
            store.login("kim@univ.ac.kr", "secret").map(|u| u.id),
            Some(user.id)
        );
        assert!(store.login("kim@univ.ac.kr", "wrong").is_none());
        assert!(store.login("nobody@univ.ac.kr", "secret").is_none());
    }

    #[test]
    fn first_write_creates_the_record() {
        let store = ProgressStore::new();
        let record = store.update_progress(
            1,
            "delegation",
            ProgressUpdate {
                completed: Some(false),
                time_spent: Some(12),
                assessment_data: None,
            },
        );
        assert_eq!(record.id, 1);
        assert!(!record.completed);
        assert_eq!(record.time_spent, 12);
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn update_keeps_created_at_and_sets_completed_at() {
        let store = ProgressStore::new();
        let first = store.update_progress(1, "discernment", ProgressUpdate::default());
        let second = store.update_progress(
            1,
            "discernment",
            ProgressUpdate {
                completed: Some(true),
                time_spent: Some(30),
                assessment_data: Some(json!({ "score": 90 })),
            },
        );
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.completed);
        assert!(second.completed_at.is_some());
        assert_eq!(second.assessment_data, Some(json!({ "score": 90 })));
    }

    #[test]
    fn records_are_keyed_per_user_and_module() {
        let store = ProgressStore::new();
        store.update_progress(1, "delegation", ProgressUpdate::default());
        store.update_progress(1, "glossary", ProgressUpdate::default());
        store.update_progress(2, "delegation", ProgressUpdate::default());

        assert_eq!(store.user_progress(1).len(), 2);
        assert_eq!(store.user_progress(2).len(), 1);
        assert!(store.module_progress(1, "delegation").is_some());
        assert!(store.module_progress(2, "glossary").is_none());
    }
}
