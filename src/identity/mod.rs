//! User directory, session tokens and password-checked login.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod user;
mod directory;
mod session;
mod provider;

pub use role::{Role, UnknownRole};
pub use user::{User, UserPatch};
pub use directory::Directory;
pub use session::{RefreshToken, Session, SessionAuthenticator, SessionToken, TokenPair, DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
