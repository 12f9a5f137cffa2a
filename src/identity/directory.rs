//! In-memory user directory keyed by generated id.
//!
//! All state sits behind one lock, so every operation (including the
//! id-collision check in `create`) is atomic with respect to other callers.
//! Lookups hand out clones; the directory keeps sole ownership of its records.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::role::Role;
use super::user::{User, UserPatch};

#[derive(Debug)]
pub struct Directory {
    users: RwLock<HashMap<String, User>>,
    default_role: Role,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new(Role::default())
    }
}

// Wall clocks can repeat a reading; a mutation must still move the stamp forward.
fn advance(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > prev { now } else { prev + TimeDelta::nanoseconds(1) }
}

impl Directory {
    pub fn new(default_role: Role) -> Self {
        Self { users: RwLock::new(HashMap::new()), default_role }
    }

    /// Role assigned by `create` when the caller passes `None`.
    pub fn default_role(&self) -> Role {
        self.default_role
    }

    pub fn create(&self, name: impl Into<String>, email: impl Into<String>, role: Option<Role>) -> User {
        let now = Utc::now();
        let mut users = self.users.write();
        let mut id = Uuid::new_v4().to_string();
        while users.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        let user = User {
            id: id.clone(),
            name: name.into(),
            email: email.into(),
            role: role.unwrap_or(self.default_role),
            created_at: now,
            updated_at: now,
        };
        users.insert(id, user.clone());
        info!(target: "tessera::directory", "user.create id={} role={}", user.id, user.role);
        user
    }

    pub fn get(&self, id: &str) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    /// Apply `patch` and refresh `updated_at`, even when the patch is empty.
    pub fn update(&self, id: &str, patch: UserPatch) -> Option<User> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(id) else {
            debug!(target: "tessera::directory", "user.update miss id={}", id);
            return None;
        };
        patch.apply_to(user);
        user.updated_at = advance(user.updated_at);
        debug!(target: "tessera::directory", "user.update id={} updated_at={}", id, user.updated_at);
        Some(user.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = self.users.write().remove(id).is_some();
        if removed {
            info!(target: "tessera::directory", "user.delete id={}", id);
        }
        removed
    }

    /// All users, or those holding `role_filter`. Order is unspecified.
    pub fn list(&self, role_filter: Option<Role>) -> Vec<User> {
        self.users
            .read()
            .values()
            .filter(|u| role_filter.map_or(true, |r| u.role == r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod directory_tests;
