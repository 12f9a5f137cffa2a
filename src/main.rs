use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tessera::identity::{AuthProvider, LocalAuthProvider, LoginRequest};
use tessera::{Directory, IdentityConfig, Role, SessionAuthenticator};

fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = IdentityConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "tessera",
        "tessera starting: RUST_LOG='{}', default_role={}, session_ttl_secs={:?}, max_login_attempts={}",
        rust_log, cfg.default_role, cfg.session_ttl_secs, cfg.max_login_attempts
    );

    let directory = Directory::new(cfg.default_role);
    let sessions = Arc::new(SessionAuthenticator::from_config(&cfg));
    let provider = LocalAuthProvider::new(Arc::clone(&sessions), cfg.max_login_attempts);

    let alice = directory.create("Alice", "alice@example.com", Some(Role::Admin));
    let bob = directory.create("Bob", "bob@example.com", Some(Role::Guest));
    info!(target: "tessera", "alice can_edit={} bob can_edit={}", alice.can_edit(), bob.can_edit());

    let editors: Vec<String> = directory
        .list(None)
        .into_iter()
        .filter(|u| u.can_edit())
        .map(|u| u.name)
        .collect();
    info!(target: "tessera", "users with edit rights: {:?}", editors);

    provider.register(&alice.email, "correct horse battery staple")?;
    let resp = provider.login(&LoginRequest::new(alice.email.as_str(), "correct horse battery staple"))?;
    info!(target: "tessera", "login ok identity={} valid={}", resp.identity, sessions.validate(&resp.token));

    sessions.logout(&alice.email);
    info!(target: "tessera", "after logout valid={}", sessions.validate(&resp.token));
    Ok(())
}
