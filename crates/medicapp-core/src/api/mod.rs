//! REST API client module for the clinic administration backend.
//!
//! This module provides the `ApiClient` used by every screen to talk to the
//! API. Requests carry the stored access credential as a bearer token; an
//! expired credential is refreshed once per request through the
//! `/backendapi/token/refresh/` endpoint.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, RefreshPolicy};
pub use error::ApiError;
pub use request::PendingRequest;
