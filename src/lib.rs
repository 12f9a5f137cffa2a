pub mod config;
pub mod error;
pub mod identity;
pub mod security;

pub use config::IdentityConfig;
pub use error::{AppError, AppResult};
pub use identity::{Directory, Role, SessionAuthenticator, User, UserPatch};
