//! Core library for the MedicApp clinic administration client.
//!
//! - [`api`]: authenticated HTTP client with silent token refresh
//! - [`auth`]: session storage, route guard and redirect policy
//! - [`models`]: patients, doctors, categories and auth payloads
//! - [`navigation`]: the sink the session layer uses to move the viewer
//! - [`config`]: on-disk configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;
pub mod utils;

pub use api::{ApiClient, ApiError, PendingRequest, RefreshPolicy};
pub use auth::{GuardDecision, RouteGuard, Session, ViewerRole};
pub use config::Config;
pub use navigation::{NavigationLog, Navigator};
