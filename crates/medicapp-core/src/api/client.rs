//! Authenticated API client for the clinic administration backend.
//!
//! Every call made through [`ApiClient::send`] has the stored access
//! credential attached. A 401 triggers one silent refresh followed by one
//! retry of the original call; if the refresh fails the session is torn down
//! and the viewer is sent back to their entry screen.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::{dashboard_for, entry_screen_for, Session, ViewerRole};
use crate::config::Config;
use crate::models::{
    AdminOverview, AdminRegistration, AdminVerification, Category, DashboardOverview, Doctor,
    DoctorStats, ForgotPasswordRequest, LoginRequest, NewCategory, NewDoctor, NewPatient,
    PasswordResetRequest, Patient, PatientsResponse, RefreshRequest, RefreshResponse, TokenPair,
};
use crate::navigation::Navigator;

use super::{ApiError, PendingRequest};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/backendapi/login/";
const TOKEN_REFRESH_PATH: &str = "/backendapi/token/refresh/";
const VERIFY_ADMIN_PATH: &str = "/backendapi/verify-admin/";
const REGISTER_ADMIN_PATH: &str = "/backendapi/register/";
const REGISTER_DOCTOR_PATH: &str = "/backendapi/register-doc/";
const FORGOT_PASSWORD_PATH: &str = "/forgot-password/";
const PATIENTS_PATH: &str = "/backendapi/patient/";
const DOCTORS_PATH: &str = "/backendapi/doctors/";
const DOCTOR_STATS_PATH: &str = "/backendapi/doctors/stats/";
const SEND_EMAIL_PATH: &str = "/backendapi/send-email/";
const CATEGORIES_PATH: &str = "/backendapi/categories/";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Message shown when the login endpoint rejects without saying why
const DEFAULT_LOGIN_ERROR: &str = "Invalid credentials";

/// How concurrent 401s are turned into refresh calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Every failing request issues its own refresh call.
    #[default]
    Independent,
    /// Refreshes are serialized; a request that waited reuses a credential
    /// another request already obtained.
    SingleFlight,
}

/// API client for the clinic backend.
/// Clone is cheap - reqwest::Client and the session store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
    navigator: Arc<dyn Navigator>,
    refresh_policy: RefreshPolicy,
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        base_url: impl Into<String>,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::build(
            base_url.into(),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            session,
            navigator,
        )
    }

    /// Create a client from the loaded configuration
    pub fn from_config(
        config: &Config,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Ok(Self::build(config.api_base_url(), config.request_timeout(), session, navigator)?
            .with_refresh_policy(config.refresh_policy))
    }

    fn build(
        base_url: String,
        timeout: Duration,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
            refresh_policy: RefreshPolicy::default(),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Request pipeline =====

    /// Attach the stored access credential, if there is one.
    fn authorize(&self, request: PendingRequest) -> Result<PendingRequest, ApiError> {
        match self.session.access_token() {
            Some(token) => request.with_bearer(&token),
            None => Ok(request),
        }
    }

    async fn dispatch(&self, request: &PendingRequest) -> Result<Response, ApiError> {
        debug!(
            method = %request.method,
            path = %request.path,
            attempt = request.attempt,
            authorized = request.bearer().is_some(),
            "Dispatching request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Send a request with the stored credential, recovering once from an
    /// expired access credential.
    pub async fn send(&self, request: PendingRequest) -> Result<Response, ApiError> {
        let request = self.authorize(request)?;
        let response = self.dispatch(&request).await?;

        if response.status() == StatusCode::UNAUTHORIZED && !request.is_retry() {
            let original = Self::check_response(response)
                .await
                .err()
                .unwrap_or(ApiError::Unauthorized);
            return self.recover(request, original).await;
        }

        Self::check_response(response).await
    }

    /// Refresh the access credential and re-dispatch `request` exactly once.
    async fn recover(&self, request: PendingRequest, original: ApiError) -> Result<Response, ApiError> {
        let token = match self.refresh_access_token(request.bearer()).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(path = %request.path, "Session already ended by a concurrent refresh");
                return Err(original);
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "Token refresh failed, ending session");
                self.force_logout();
                return Err(original);
            }
        };

        let retry = request.into_retry(&token)?;
        let response = self.dispatch(&retry).await?;
        // A second 401 lands here as an ordinary error; no further refresh.
        Self::check_response(response).await
    }

    /// `Ok(None)` means another request already failed to refresh and ended
    /// the session while this one waited.
    async fn refresh_access_token(&self, sent_with: Option<&str>) -> Result<Option<String>, ApiError> {
        match self.refresh_policy {
            RefreshPolicy::Independent => self.request_refresh().await.map(Some),
            RefreshPolicy::SingleFlight => {
                let _guard = self.refresh_lock.lock().await;
                match (self.session.access_token(), sent_with) {
                    (Some(current), sent) if sent != Some(current.as_str()) => {
                        debug!("Access token already refreshed by another request");
                        Ok(Some(current))
                    }
                    (None, Some(_)) => Ok(None),
                    _ => self.request_refresh().await.map(Some),
                }
            }
        }
    }

    /// Call the refresh endpoint and persist the new access credential.
    async fn request_refresh(&self) -> Result<String, ApiError> {
        let refresh = self.session.refresh_token().ok_or(ApiError::Unauthorized)?;

        // Goes out without the bearer header: the access credential is the expired one.
        let request = PendingRequest::post(TOKEN_REFRESH_PATH).json(&RefreshRequest { refresh: &refresh })?;
        let response = Self::check_response(self.dispatch(&request).await?).await?;
        let refreshed: RefreshResponse = Self::parse_json(response).await?;

        if refreshed.access.is_empty() {
            return Err(ApiError::InvalidResponse("Refresh response carried no access token".to_string()));
        }

        self.session.replace_access_token(&refreshed.access)?;
        info!("Access token refreshed");
        Ok(refreshed.access)
    }

    /// Clear the session and send the viewer to their entry screen.
    fn force_logout(&self) {
        let role = self.session.role();
        if let Err(e) = self.session.destroy() {
            error!(error = %e, "Failed to clear session storage");
        }
        self.navigator.navigate(entry_screen_for(role));
    }

    /// Send a request that bypasses credential attachment and refresh.
    async fn send_public(&self, request: PendingRequest) -> Result<Response, ApiError> {
        Self::check_response(self.dispatch(&request).await?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        Self::parse_json(self.send(PendingRequest::get(path)).await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        Self::parse_json(self.send(PendingRequest::post(path).json(body)?).await?).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        Self::parse_json(self.send(PendingRequest::put(path).json(body)?).await?).await
    }

    /// POST whose response body is not needed.
    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.send(PendingRequest::post(path).json(body)?).await?;
        Ok(())
    }

    // ===== Account =====

    /// Sign in through the portal for `role` and establish the session.
    /// Returns the dashboard the viewer was navigated to.
    pub async fn login(&self, username: &str, password: &str, role: ViewerRole) -> Result<&'static str> {
        let request = PendingRequest::post(LOGIN_PATH).json(&LoginRequest { username, password })?;
        let response = self
            .dispatch(&request)
            .await
            .context("Failed to send login request")?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = ApiError::payload_message(&body).unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string());
            return Err(ApiError::Rejected(message).into());
        }

        let tokens: TokenPair = Self::parse_json(response)
            .await
            .context("Failed to parse login response")?;
        self.session
            .establish(&tokens, role)
            .context("Failed to store session")?;

        let landing = dashboard_for(role);
        self.navigator.navigate(landing);
        Ok(landing)
    }

    /// End the session explicitly. Returns the entry screen navigated to.
    pub fn logout(&self) -> Result<&'static str> {
        let role = self.session.destroy().context("Failed to clear session")?;
        let entry = entry_screen_for(role);
        self.navigator.navigate(entry);
        Ok(entry)
    }

    /// First step of admin registration.
    pub async fn verify_admin(&self, verification: &AdminVerification) -> Result<()> {
        let request = PendingRequest::post(VERIFY_ADMIN_PATH).json(verification)?;
        self.send_public(request)
            .await
            .context("Admin verification failed")?;
        Ok(())
    }

    /// Complete admin registration; the admin then signs in at the admin entry.
    pub async fn register_admin(&self, registration: &AdminRegistration) -> Result<&'static str> {
        let request = PendingRequest::post(REGISTER_ADMIN_PATH).json(registration)?;
        self.send_public(request).await.context("Registration failed")?;
        let next = entry_screen_for(ViewerRole::SystemAdmin);
        self.navigator.navigate(next);
        Ok(next)
    }

    /// Public doctor self-registration; credentials are emailed by the API.
    pub async fn register_doctor(&self, doctor: &NewDoctor) -> Result<&'static str> {
        let request = PendingRequest::post(REGISTER_DOCTOR_PATH).json(doctor)?;
        self.send_public(request).await.context("Registration failed")?;
        let next = entry_screen_for(ViewerRole::Regular);
        self.navigator.navigate(next);
        Ok(next)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let request = PendingRequest::post(FORGOT_PASSWORD_PATH).json(&ForgotPasswordRequest { email })?;
        self.send_public(request)
            .await
            .context("Failed to reset password")?;
        Ok(())
    }

    // ===== Patients =====

    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let response: PatientsResponse = self
            .get(PATIENTS_PATH)
            .await
            .context("Error fetching patients")?;
        debug!("Fetched {} patients", response.patients.len());
        Ok(response.patients)
    }

    pub async fn create_patient(&self, patient: &NewPatient) -> Result<()> {
        self.post_ack(PATIENTS_PATH, patient)
            .await
            .context("Error adding patient")
    }

    /// Update an existing patient, addressed by its clinic patient number.
    pub async fn update_patient(&self, pat_id: i64, patient: &NewPatient) -> Result<()> {
        let path = format!("{}{}/credentials/", PATIENTS_PATH, pat_id);
        self.post_ack(&path, patient)
            .await
            .context("Error updating patient")
    }

    // ===== Doctors =====

    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        self.get(DOCTORS_PATH).await.context("Error fetching doctors")
    }

    pub async fn doctor_stats(&self) -> Result<DoctorStats> {
        self.get(DOCTOR_STATS_PATH)
            .await
            .context("Error fetching doctor statistics")
    }

    /// Add a doctor from the admin dashboard (authenticated).
    pub async fn add_doctor(&self, doctor: &NewDoctor) -> Result<()> {
        self.post_ack(REGISTER_DOCTOR_PATH, doctor)
            .await
            .context("Error adding doctor")
    }

    pub async fn send_password_reset(&self, employee_id: &str, email: &str) -> Result<()> {
        self.post_ack(SEND_EMAIL_PATH, &PasswordResetRequest { employee_id, email })
            .await
            .context("Error sending password reset email")
    }

    // ===== Categories =====

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.get(CATEGORIES_PATH)
            .await
            .context("Error fetching categories")
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<Category> {
        self.post(CATEGORIES_PATH, category)
            .await
            .context("Error adding category")
    }

    pub async fn update_category(&self, id: i64, category: &NewCategory) -> Result<Category> {
        let path = format!("{}{}/", CATEGORIES_PATH, id);
        self.put(&path, category)
            .await
            .context("Error updating category")
    }

    pub async fn delete_category(&self, id: i64) -> Result<()> {
        let path = format!("{}{}/", CATEGORIES_PATH, id);
        self.send(PendingRequest::delete(path))
            .await
            .context("Error deleting category")?;
        Ok(())
    }

    // ===== Overviews =====

    pub async fn dashboard_overview(&self) -> Result<DashboardOverview> {
        let patients = self.list_patients().await?;
        Ok(DashboardOverview::from_patients(patients))
    }

    /// Fetch patients, doctor statistics and categories concurrently.
    pub async fn admin_overview(&self) -> Result<AdminOverview> {
        let (patients, doctor_stats, categories) = futures::try_join!(
            self.list_patients(),
            self.doctor_stats(),
            self.list_categories()
        )?;
        Ok(AdminOverview::new(patients, doctor_stats, categories.len()))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("refresh_policy", &self.refresh_policy)
            .finish()
    }
}
