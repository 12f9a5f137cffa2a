//! Runtime settings for the identity components.
//! Read from `TESSERA_*` environment variables or a JSON document; every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Role, UnknownRole, DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES};

pub const ENV_DEFAULT_ROLE: &str = "TESSERA_DEFAULT_ROLE";
pub const ENV_SESSION_TTL_SECS: &str = "TESSERA_SESSION_TTL_SECS";
pub const ENV_MAX_LOGIN_ATTEMPTS: &str = "TESSERA_MAX_LOGIN_ATTEMPTS";
pub const ENV_TOKEN_BYTES: &str = "TESSERA_TOKEN_BYTES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    Role { var: &'static str, source: UnknownRole },
    #[error("{var}: expected a non-negative integer, got '{value}'")]
    Number { var: &'static str, value: String },
    #[error("{field} must be at least {min}, got {value}")]
    OutOfRange { field: &'static str, min: u64, value: u64 },
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Role given to users created without an explicit one.
    #[serde(default)]
    pub default_role: Role,
    /// Session lifetime; `None` keeps sessions until replaced or logged out.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
    /// Consecutive failed password checks before an identity is locked.
    #[serde(default = "IdentityConfig::default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// Random bytes per session token, before base64url encoding.
    #[serde(default = "IdentityConfig::default_token_bytes")]
    pub token_bytes: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_role: Role::default(),
            session_ttl_secs: None,
            max_login_attempts: Self::default_max_login_attempts(),
            token_bytes: Self::default_token_bytes(),
        }
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::Number { var, value: raw.to_string() })
}

impl IdentityConfig {
    fn default_max_login_attempts() -> u32 { 5 }
    fn default_token_bytes() -> usize { DEFAULT_TOKEN_BYTES }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`IdentityConfig::from_env`] but reads through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();
        if let Some(v) = get(ENV_DEFAULT_ROLE) {
            cfg.default_role = v.parse::<Role>().map_err(|source| ConfigError::Role { var: ENV_DEFAULT_ROLE, source })?;
        }
        if let Some(v) = get(ENV_SESSION_TTL_SECS) {
            cfg.session_ttl_secs = Some(parse_number(ENV_SESSION_TTL_SECS, &v)?);
        }
        if let Some(v) = get(ENV_MAX_LOGIN_ATTEMPTS) {
            let n = parse_number(ENV_MAX_LOGIN_ATTEMPTS, &v)?;
            cfg.max_login_attempts = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(v) = get(ENV_TOKEN_BYTES) {
            let n = parse_number(ENV_TOKEN_BYTES, &v)?;
            cfg.token_bytes = usize::try_from(n).unwrap_or(usize::MAX);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_login_attempts < 1 {
            return Err(ConfigError::OutOfRange { field: "max_login_attempts", min: 1, value: 0 });
        }
        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(ConfigError::OutOfRange {
                field: "token_bytes",
                min: MIN_TOKEN_BYTES as u64,
                value: self.token_bytes as u64,
            });
        }
        Ok(())
    }
}
