//! REST API client module for the UX laws service.
//!
//! This module provides the `ApiClient` for signing in and for reading and
//! updating profile and progress data.
//!
//! The API uses bearer token authentication. The token lives in the
//! credential store and is attached to every outgoing request.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
