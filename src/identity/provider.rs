use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::session::{RefreshToken, SessionAuthenticator, SessionToken};
use crate::error::{AppError, AppResult};
use crate::security::{hash_password, verify_password};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self { identity: identity.into(), password: password.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub identity: String,
    pub token: SessionToken,
    pub refresh_token: RefreshToken,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Password-checked login in front of a [`SessionAuthenticator`].
///
/// Holds `identity -> "<salt>$<digest>"` and a per-identity count of consecutive
/// failed checks; once the count reaches `max_login_attempts` the identity is
/// locked until [`LocalAuthProvider::unlock`] or a password reset.
pub struct LocalAuthProvider {
    sessions: Arc<SessionAuthenticator>,
    credentials: RwLock<HashMap<String, String>>,
    failures: Mutex<HashMap<String, u32>>,
    max_login_attempts: u32,
}

impl LocalAuthProvider {
    pub fn new(sessions: Arc<SessionAuthenticator>, max_login_attempts: u32) -> Self {
        Self {
            sessions,
            credentials: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            max_login_attempts: max_login_attempts.max(1),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionAuthenticator> {
        &self.sessions
    }

    pub fn register(&self, identity: &str, password: &str) -> AppResult<()> {
        if identity.is_empty() || password.is_empty() {
            return Err(AppError::user("missing_credentials", "identity and password are required"));
        }
        let mut creds = self.credentials.write();
        if creds.contains_key(identity) {
            return Err(AppError::conflict("identity_exists".to_string(), format!("'{}' is already registered", identity)));
        }
        creds.insert(identity.to_string(), hash_password(password));
        info!(target: "tessera::auth", "auth.register identity={}", identity);
        Ok(())
    }

    /// Replace the stored hash for a known identity and clear its failure count.
    pub fn set_password(&self, identity: &str, password: &str) -> bool {
        if password.is_empty() {
            return false;
        }
        {
            let mut creds = self.credentials.write();
            let Some(stored) = creds.get_mut(identity) else { return false; };
            *stored = hash_password(password);
        }
        self.failures.lock().remove(identity);
        info!(target: "tessera::auth", "auth.set_password identity={}", identity);
        true
    }

    /// Forget the credential and end any session held by `identity`.
    /// Identities this provider never registered are left alone.
    pub fn remove(&self, identity: &str) -> bool {
        let removed = self.credentials.write().remove(identity).is_some();
        if removed {
            self.failures.lock().remove(identity);
            self.sessions.logout(identity);
            info!(target: "tessera::auth", "auth.remove identity={}", identity);
        }
        removed
    }

    pub fn unlock(&self, identity: &str) {
        self.failures.lock().remove(identity);
    }

    pub fn failed_attempts(&self, identity: &str) -> u32 {
        self.failures.lock().get(identity).copied().unwrap_or(0)
    }

    pub fn is_locked(&self, identity: &str) -> bool {
        self.failed_attempts(identity) >= self.max_login_attempts
    }

    // Lock check, verification and counter update happen under the failures lock.
    fn check_password(&self, identity: &str, password: &str) -> AppResult<()> {
        let mut failures = self.failures.lock();
        if failures.get(identity).copied().unwrap_or(0) >= self.max_login_attempts {
            warn!(target: "tessera::auth", "auth.login locked identity={}", identity);
            return Err(AppError::locked("account_locked".to_string(), format!("'{}' is locked after repeated failures", identity)));
        }
        let stored = self.credentials.read().get(identity).cloned();
        let Some(stored) = stored else {
            warn!(target: "tessera::auth", "auth.login unknown identity={}", identity);
            return Err(AppError::auth("invalid_credentials", "invalid identity or password"));
        };
        if !verify_password(password, &stored) {
            let count = failures.entry(identity.to_string()).or_insert(0);
            *count += 1;
            warn!(target: "tessera::auth", "auth.login failed identity={} attempts={}", identity, count);
            return Err(AppError::auth("invalid_credentials", "invalid identity or password"));
        }
        failures.remove(identity);
        Ok(())
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        if req.identity.is_empty() || req.password.is_empty() {
            return Err(AppError::user("missing_credentials", "identity and password are required"));
        }
        self.check_password(&req.identity, &req.password)?;
        let pair = self
            .sessions
            .login_with_refresh(&req.identity, &req.password)
            .ok_or_else(|| AppError::internal("session_refused", "session could not be issued"))?;
        info!(target: "tessera::auth", "auth.login identity={}", req.identity);
        Ok(LoginResponse { identity: req.identity.clone(), token: pair.token, refresh_token: pair.refresh_token })
    }
}
