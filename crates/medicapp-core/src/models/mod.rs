//! Data models for the clinic administration API.
//!
//! This module contains the data structures exchanged with the API:
//!
//! - Auth payloads: `TokenPair`, `LoginRequest`, `RefreshRequest`, admin
//!   verification and registration bodies
//! - `Patient`, `NewPatient`: patient records and their write body
//! - `Doctor`, `NewDoctor`, `DoctorStats`: doctor accounts
//! - `Category`, `NewCategory`: health-program categories
//! - `DashboardOverview`, `AdminOverview`: client-side summaries

pub mod auth;
pub mod category;
pub mod doctor;
pub mod overview;
pub mod patient;

pub use auth::{
    AdminRegistration, AdminVerification, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    RefreshResponse, TokenPair,
};
pub use category::{Category, NewCategory};
pub use doctor::{Doctor, DoctorStats, NewDoctor, PasswordResetRequest};
pub use overview::{AdminOverview, DashboardOverview};
pub use patient::{NewPatient, Patient, PatientsResponse};
