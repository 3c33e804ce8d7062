//! Data models exchanged with the UX laws API.
//!
//! - `User`: the signed-in account, also cached in the credential store
//! - `AuthResponse`: token plus user returned by login and registration
//! - `Progress`: which laws the user has completed

pub mod progress;
pub mod user;

pub use progress::Progress;
pub use user::{AuthResponse, User};
