//! HTTP client for the vehicle registration lookup service.
//!
//! `ApiClient` decorates outbound requests with the current session
//! credentials and intercepts 401 responses on protected endpoints.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
