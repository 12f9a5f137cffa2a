use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::IdentityConfig;
use crate::security::random_token;

pub type SessionToken = String;
pub type RefreshToken = String;

pub const DEFAULT_TOKEN_BYTES: usize = 32;
pub const MIN_TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: String,
    pub token: SessionToken,
    pub refresh_token: RefreshToken,
    pub issued_at: Instant,
    pub expires_at: Option<Instant>,
}

impl Session {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Access token plus the refresh token that can rotate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: SessionToken,
    pub refresh_token: RefreshToken,
}

// All three maps change together under one lock:
// identity -> session, access token -> identity, refresh token -> identity.
#[derive(Debug, Default)]
struct SessionTable {
    by_identity: HashMap<String, Session>,
    by_token: HashMap<SessionToken, String>,
    by_refresh: HashMap<RefreshToken, String>,
}

impl SessionTable {
    fn remove_identity(&mut self, identity: &str) -> Option<Session> {
        let sess = self.by_identity.remove(identity)?;
        self.by_token.remove(&sess.token);
        self.by_refresh.remove(&sess.refresh_token);
        Some(sess)
    }

    fn is_taken(&self, candidate: &str) -> bool {
        self.by_token.contains_key(candidate) || self.by_refresh.contains_key(candidate)
    }

    fn fresh_token(&self, len: usize) -> String {
        let mut token = random_token(len);
        while self.is_taken(&token) {
            token = random_token(len);
        }
        token
    }
}

/// Issues one opaque token per identity key and answers whether a token is live.
///
/// `login` does not check credentials; see [`crate::identity::LocalAuthProvider`]
/// for a flow that verifies a stored password hash first.
#[derive(Debug)]
pub struct SessionAuthenticator {
    table: RwLock<SessionTable>,
    ttl: Option<Duration>,
    token_bytes: usize,
}

impl Default for SessionAuthenticator {
    fn default() -> Self {
        Self::new(None, DEFAULT_TOKEN_BYTES)
    }
}

impl SessionAuthenticator {
    pub fn new(ttl: Option<Duration>, token_bytes: usize) -> Self {
        Self {
            table: RwLock::new(SessionTable::default()),
            ttl,
            token_bytes: token_bytes.max(MIN_TOKEN_BYTES),
        }
    }

    pub fn from_config(cfg: &IdentityConfig) -> Self {
        Self::new(cfg.session_ttl(), cfg.token_bytes)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    // Replaces whatever `identity` held. A TTL too large to represent never expires.
    fn issue(&self, table: &mut SessionTable, identity: &str) -> TokenPair {
        let now = Instant::now();
        table.remove_identity(identity);
        let token = table.fresh_token(self.token_bytes);
        table.by_token.insert(token.clone(), identity.to_string());
        let refresh_token = table.fresh_token(self.token_bytes);
        table.by_refresh.insert(refresh_token.clone(), identity.to_string());
        let sess = Session {
            identity: identity.to_string(),
            token: token.clone(),
            refresh_token: refresh_token.clone(),
            issued_at: now,
            expires_at: self.ttl.and_then(|ttl| now.checked_add(ttl)),
        };
        table.by_identity.insert(identity.to_string(), sess);
        TokenPair { token, refresh_token }
    }

    /// Bind a fresh token to `identity`, replacing any previous one.
    /// Empty `identity` or `credential` is refused without touching existing state.
    pub fn login(&self, identity: &str, credential: &str) -> Option<SessionToken> {
        self.login_with_refresh(identity, credential).map(|pair| pair.token)
    }

    /// Same as [`SessionAuthenticator::login`], also returning the refresh token.
    pub fn login_with_refresh(&self, identity: &str, credential: &str) -> Option<TokenPair> {
        if identity.is_empty() || credential.is_empty() {
            debug!(target: "tessera::session", "session.login refused: empty identity or credential");
            return None;
        }
        let mut table = self.table.write();
        let replaced = table.by_identity.contains_key(identity);
        let pair = self.issue(&mut table, identity);
        info!(target: "tessera::session", "session.issue identity={} replaced={}", identity, replaced);
        Some(pair)
    }

    /// Exchange a refresh token for a new pair bound to the same identity.
    /// Both old tokens stop working. The refresh token is honoured until the
    /// binding is removed (logout, re-login, purge or pruning), even after the
    /// access token expired.
    pub fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
        let mut table = self.table.write();
        let Some(identity) = table.by_refresh.get(refresh_token).cloned() else {
            debug!(target: "tessera::session", "session.refresh unknown token");
            return None;
        };
        let pair = self.issue(&mut table, &identity);
        info!(target: "tessera::session", "session.refresh identity={}", identity);
        Some(pair)
    }

    pub fn logout(&self, identity: &str) {
        if self.table.write().remove_identity(identity).is_some() {
            info!(target: "tessera::session", "session.logout identity={}", identity);
        }
    }

    /// True when `token` is currently bound to any identity.
    pub fn validate(&self, token: &str) -> bool {
        self.identity_for(token).is_some()
    }

    /// Identity holding `token`, if the token is live. Expired entries are pruned.
    pub fn identity_for(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        let expired = {
            let table = self.table.read();
            let identity = table.by_token.get(token)?;
            match table.by_identity.get(identity) {
                Some(sess) if sess.is_live(now) => return Some(identity.clone()),
                _ => identity.clone(),
            }
        };
        let mut table = self.table.write();
        // re-check under the write lock; a concurrent login may have replaced it
        if table.by_token.get(token) == Some(&expired)
            && table.by_identity.get(&expired).is_some_and(|s| !s.is_live(now))
        {
            table.remove_identity(&expired);
            debug!(target: "tessera::session", "session.expired identity={}", expired);
        }
        None
    }

    pub fn session(&self, identity: &str) -> Option<Session> {
        let now = Instant::now();
        self.table.read().by_identity.get(identity).filter(|s| s.is_live(now)).cloned()
    }

    pub fn active_sessions(&self) -> usize {
        let now = Instant::now();
        self.table.read().by_identity.values().filter(|s| s.is_live(now)).count()
    }

    /// Drop every expired binding; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut table = self.table.write();
        let stale: Vec<String> = table
            .by_identity
            .values()
            .filter(|s| !s.is_live(now))
            .map(|s| s.identity.clone())
            .collect();
        for identity in &stale {
            table.remove_identity(identity);
        }
        if !stale.is_empty() {
            info!(target: "tessera::session", "session.purge count={}", stale.len());
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_are_refused() {
        let auth = SessionAuthenticator::default();
        assert!(auth.login("", "x").is_none());
        assert!(auth.login("a", "").is_none());
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn refused_login_keeps_existing_session() {
        let auth = SessionAuthenticator::default();
        let t = auth.login("a@x", "pw").unwrap();
        assert!(auth.login("a@x", "").is_none());
        assert!(auth.validate(&t));
    }

    #[test]
    fn login_validate_logout() {
        let auth = SessionAuthenticator::default();
        let t = auth.login("alice@example.com", "secret").unwrap();
        assert!(auth.validate(&t));
        assert_eq!(auth.identity_for(&t).as_deref(), Some("alice@example.com"));
        auth.logout("alice@example.com");
        assert!(!auth.validate(&t));
        // idempotent
        auth.logout("alice@example.com");
        auth.logout("never-seen");
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn relogin_orphans_previous_token() {
        let auth = SessionAuthenticator::default();
        let t1 = auth.login("k", "c1").unwrap();
        let t2 = auth.login("k", "c2").unwrap();
        assert_ne!(t1, t2);
        assert!(!auth.validate(&t1));
        assert!(auth.validate(&t2));
        assert_eq!(auth.active_sessions(), 1);
    }

    #[test]
    fn any_live_token_validates_regardless_of_holder() {
        let auth = SessionAuthenticator::default();
        let ta = auth.login("a", "x").unwrap();
        let tb = auth.login("b", "y").unwrap();
        auth.logout("a");
        assert!(!auth.validate(&ta));
        assert!(auth.validate(&tb));
        assert!(!auth.validate("garbage"));
    }

    #[test]
    fn token_length_follows_byte_count() {
        let auth = SessionAuthenticator::new(None, 48);
        assert_eq!(auth.login("a", "b").unwrap().len(), 64);
        // clamped to the minimum
        let auth = SessionAuthenticator::new(None, 1);
        assert_eq!(auth.login("a", "b").unwrap().len(), 22);
    }

    #[test]
    fn expired_sessions_fail_and_are_pruned() {
        let auth = SessionAuthenticator::new(Some(Duration::ZERO), DEFAULT_TOKEN_BYTES);
        let t = auth.login("a", "b").unwrap();
        assert!(!auth.validate(&t));
        assert!(auth.session("a").is_none());
        // the failed validation already removed it
        assert_eq!(auth.purge_expired(), 0);

        auth.login("c", "d").unwrap();
        auth.login("e", "f").unwrap();
        assert_eq!(auth.active_sessions(), 0);
        assert_eq!(auth.purge_expired(), 2);
    }

    #[test]
    fn unrepresentable_ttl_never_expires() {
        let auth = SessionAuthenticator::new(Some(Duration::from_secs(u64::MAX)), DEFAULT_TOKEN_BYTES);
        let t = auth.login("a", "b").unwrap();
        assert!(auth.validate(&t));
        assert!(auth.session("a").unwrap().expires_at.is_none());
        assert_eq!(auth.purge_expired(), 0);
    }

    #[test]
    fn refresh_rotates_both_tokens() {
        let auth = SessionAuthenticator::default();
        let first = auth.login_with_refresh("a@x", "pw").unwrap();
        let second = auth.refresh(&first.refresh_token).unwrap();
        assert_ne!(first.token, second.token);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(!auth.validate(&first.token));
        assert!(auth.validate(&second.token));
        assert_eq!(auth.identity_for(&second.token).as_deref(), Some("a@x"));
        // the spent refresh token cannot be replayed
        assert!(auth.refresh(&first.refresh_token).is_none());
        assert_eq!(auth.session("a@x").unwrap().refresh_token, second.refresh_token);
        assert_eq!(auth.active_sessions(), 1);
    }

    #[test]
    fn refresh_rejects_unknown_and_stale_tokens() {
        let auth = SessionAuthenticator::default();
        assert!(auth.refresh("nope").is_none());

        let pair = auth.login_with_refresh("k", "c1").unwrap();
        auth.login("k", "c2").unwrap();
        assert!(auth.refresh(&pair.refresh_token).is_none());

        let pair = auth.login_with_refresh("k", "c3").unwrap();
        auth.logout("k");
        assert!(auth.refresh(&pair.refresh_token).is_none());
        assert_eq!(auth.active_sessions(), 0);
    }

    #[test]
    fn refresh_revives_expired_session_until_pruned() {
        let auth = SessionAuthenticator::new(Some(Duration::ZERO), DEFAULT_TOKEN_BYTES);
        let pair = auth.login_with_refresh("a", "b").unwrap();
        let next = auth.refresh(&pair.refresh_token).unwrap();
        assert_ne!(next.token, pair.token);

        // a failed validation prunes the binding, refresh token included
        assert!(!auth.validate(&next.token));
        assert!(auth.refresh(&next.refresh_token).is_none());
    }

    #[test]
    fn long_ttl_keeps_session_live() {
        let auth = SessionAuthenticator::new(Some(Duration::from_secs(3600)), DEFAULT_TOKEN_BYTES);
        let t = auth.login("a", "b").unwrap();
        assert!(auth.validate(&t));
        let sess = auth.session("a").unwrap();
        assert_eq!(sess.token, t);
        assert!(sess.expires_at.unwrap() > sess.issued_at);
        assert_eq!(auth.purge_expired(), 0);
    }
}
