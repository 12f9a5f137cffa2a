use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn can_edit(&self) -> bool {
        self.role.can_edit()
    }
}

/// Partial update for a [`User`]. `None` leaves the attribute untouched.
///
/// Unknown keys are ignored both when deserializing and when building from
/// name/value pairs with [`UserPatch::from_fields`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }

    /// Build a patch from attribute-name/value pairs.
    /// Only `name`, `email` and `role` are mutable; every other key is skipped,
    /// as is a `role` value that does not name a known role.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut patch = Self::default();
        for (key, value) in fields {
            match key.as_ref() {
                "name" => patch.name = Some(value.into()),
                "email" => patch.email = Some(value.into()),
                "role" => {
                    let raw: String = value.into();
                    match raw.parse::<Role>() {
                        Ok(role) => patch.role = Some(role),
                        Err(e) => debug!(target: "tessera::directory", "patch: {}; field skipped", e),
                    }
                }
                other => debug!(target: "tessera::directory", "patch: ignoring unknown field '{}'", other),
            }
        }
        patch
    }

    pub(crate) fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name { user.name = name; }
        if let Some(email) = self.email { user.email = email; }
        if let Some(role) = self.role { user.role = role; }
    }
}
