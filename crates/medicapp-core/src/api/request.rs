use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// An outbound call captured so it can be re-dispatched after a refresh.
///
/// `attempt` is 0 for the original dispatch and 1 for the single retry that
/// follows a successful refresh. A request with `attempt >= 1` is never
/// refreshed again.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub attempt: u32,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            attempt: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    /// Set (or replace) the bearer authorization header.
    pub fn with_bearer(mut self, token: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidRequest("Access token is not a valid header value".to_string()))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// The copy dispatched after a successful refresh, carrying the new credential.
    pub fn into_retry(mut self, token: &str) -> Result<Self, ApiError> {
        self.attempt += 1;
        self.with_bearer(token)
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_has_no_auth() {
        let req = PendingRequest::get("/backendapi/patient/");
        assert_eq!(req.attempt, 0);
        assert!(!req.is_retry());
        assert_eq!(req.bearer(), None);
    }

    #[test]
    fn test_into_retry_bumps_attempt_and_replaces_token() {
        let req = PendingRequest::post("/backendapi/categories/")
            .json(&serde_json::json!({"name": "TB", "description": ""}))
            .unwrap()
            .with_bearer("old")
            .unwrap();
        assert_eq!(req.bearer(), Some("old"));

        let retry = req.into_retry("new").unwrap();
        assert!(retry.is_retry());
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.bearer(), Some("new"));
        assert_eq!(retry.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(retry.body.unwrap()["name"], "TB");
    }

    #[test]
    fn test_invalid_token_characters_are_rejected() {
        let req = PendingRequest::get("/x");
        assert!(req.with_bearer("bad\ntoken").is_err());
    }
}
