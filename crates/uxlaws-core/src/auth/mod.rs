//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `Session`: login, registration and logout on top of the API client
//! - `AuthState`: authenticated (with the cached user) or unauthenticated
//!
//! There is no client-side token refresh. A session ends on logout or when
//! the server answers 401.

pub mod session;

pub use session::{AuthError, AuthState, Session};
