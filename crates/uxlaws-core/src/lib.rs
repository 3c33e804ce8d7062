//! Core library for the UX laws learning app.
//!
//! - `storage`: credential store over the OS keychain or an obfuscated local file
//! - `api`: HTTP client that attaches the stored token and clears it on 401
//! - `auth`: login/logout session on top of both
//! - `config`: on-disk configuration with environment overrides
//! - `models`: user and progress records

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthState, Session};
pub use config::Config;
pub use models::{AuthResponse, Progress, User};
pub use storage::{open_store, CredentialStore, StorageBackend, TOKEN_KEY, USER_KEY};
