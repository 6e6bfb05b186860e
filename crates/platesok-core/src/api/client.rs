//! API client for the vehicle registration lookup service.
//!
//! This module provides the `ApiClient` struct, which decorates every
//! outbound request with the current session credentials: protected
//! endpoints get `Authorization: Bearer <token>` (and `X-User-Id`),
//! state-changing auth endpoints get a fresh `X-XSRF-TOKEN`. A 401 on a
//! protected endpoint expires the shared session before the error reaches
//! the caller; login, register and the CSRF fetch are not protected
//! endpoints and never touch an existing session.

use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::SessionHandle;
use crate::models::{DetailedVehicleData, SearchHistoryItem, SimpleVehicleData};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow registry responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the anti-forgery token on state-changing requests.
const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Header carrying the user id alongside the bearer token.
const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

/// API client for the lookup service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the session handle is shared by design.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionHandle,
}

impl ApiClient {
    /// Create a new API client reading its bearer token from `session`
    /// at dispatch time.
    pub fn new(base_url: &str, session: SessionHandle) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Auth Endpoints =====

    /// Fetch a fresh anti-forgery token. Required before any
    /// state-changing request.
    pub async fn fetch_csrf_token(&self) -> Result<String, ApiError> {
        let response = self.client.get(self.url("/api/csrf")).send().await?;
        let response = Self::check_response(response).await?;
        let csrf: CsrfResponse = Self::parse_json(response).await?;
        Ok(csrf.token)
    }

    /// Submit credentials. A rejection is returned as-is; the current
    /// session, if any, is not affected.
    pub(crate) async fn submit_login(
        &self,
        username: &str,
        password: &str,
        csrf_token: &str,
    ) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .header(XSRF_HEADER, csrf_token)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    /// Submit a registration. Does not log in.
    pub(crate) async fn submit_register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        csrf_token: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .header(XSRF_HEADER, csrf_token)
            .json(&RegisterRequest {
                username,
                password,
                email,
            })
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// Lightweight authenticated probe used to detect token expiry.
    pub async fn probe_auth(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(self.url("/api/test-auth"))
            .headers(self.auth_headers()?)
            .send()
            .await?;

        self.intercept(response).await?;
        Ok(())
    }

    // ===== Lookup Endpoints =====

    /// Normalize a plate for lookup: separators stripped, uppercased.
    pub fn normalize_plate(plate: &str) -> String {
        plate
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_uppercase()
    }

    /// Fetch the basic registration record for a plate.
    pub async fn fetch_vehicle_simple(&self, plate: &str) -> Result<SimpleVehicleData, ApiError> {
        let plate = Self::normalize_plate(plate);
        debug!(plate = %plate, "simple vehicle lookup");
        self.get_protected(&format!("/api/vehicle/simple/{}", plate))
            .await
    }

    /// Fetch the full registration record for a plate.
    pub async fn fetch_vehicle_detailed(
        &self,
        plate: &str,
    ) -> Result<DetailedVehicleData, ApiError> {
        let plate = Self::normalize_plate(plate);
        debug!(plate = %plate, "detailed vehicle lookup");
        self.get_protected(&format!("/api/vehicle/detailed/{}", plate))
            .await
    }

    /// Fetch every user's search history (admin endpoint), newest first.
    pub async fn fetch_history_all(&self) -> Result<Vec<SearchHistoryItem>, ApiError> {
        let mut history: Vec<SearchHistoryItem> = self.get_protected("/api/history/all").await?;
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }

    /// Fetch one user's search history, newest first.
    pub async fn fetch_user_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<SearchHistoryItem>, ApiError> {
        let mut history: Vec<SearchHistoryItem> = self
            .get_protected(&format!("/api/history/user/{}", user_id))
            .await?;
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }

    // ===== Request Plumbing =====

    /// Bearer and user-id headers from the current session snapshot. An
    /// empty map when unauthenticated; the service rejects the request.
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(session) = self.session.snapshot() {
            let bearer = format!("Bearer {}", session.token);
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&bearer)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
            );
            headers.insert(
                USER_ID_HEADER,
                header::HeaderValue::from_str(&session.user_id)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    async fn get_protected<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.auth_headers()?)
            .send()
            .await?;

        let response = self.intercept(response).await?;
        Self::parse_json(response).await
    }

    /// A 401 on a protected endpoint expires the session before the error
    /// propagates; logout is idempotent, so racing interceptors are safe.
    async fn intercept(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status() == StatusCode::UNAUTHORIZED {
            if self.session.clear() {
                info!("bearer token rejected, session cleared");
            }
            return Err(ApiError::Unauthorized);
        }
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Parse a JSON body, rejecting payloads that do not match the
    /// declared shape.
    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;
    use crate::auth::SessionData;

    fn authenticated_session() -> SessionHandle {
        let session = SessionHandle::new(Box::new(MemoryCredentialStore::new()));
        session
            .set(SessionData {
                username: "alice".into(),
                user_id: "U".into(),
                token: "T".into(),
            })
            .unwrap();
        session
    }

    fn empty_session() -> SessionHandle {
        SessionHandle::new(Box::new(MemoryCredentialStore::new()))
    }

    const SIMPLE_VEHICLE_JSON: &str = r#"{
        "vehicleId": "V-1",
        "licensePlate": "AB12345",
        "make": "Volvo",
        "model": "V70",
        "typeDesignation": "BW",
        "fuelType": "Diesel",
        "color": "Black"
    }"#;

    #[test]
    fn test_normalize_plate() {
        assert_eq!(ApiClient::normalize_plate("ab 123-45"), "AB12345");
        assert_eq!(ApiClient::normalize_plate("AB12345"), "AB12345");
        assert_eq!(ApiClient::normalize_plate(" ab-123 45 "), "AB12345");
        assert_eq!(ApiClient::normalize_plate(""), "");
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"token": "T", "userId": "U"}"#;
        let parsed: LoginResponse = serde_json::from_str(json).expect("login response");
        assert_eq!(parsed.token, "T");
        assert_eq!(parsed.user_id, "U");

        // userId must be present
        assert!(serde_json::from_str::<LoginResponse>(r#"{"token": "T"}"#).is_err());
    }

    #[tokio::test]
    async fn test_protected_request_carries_session_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/vehicle/simple/AB12345")
            .match_header("authorization", "Bearer T")
            .match_header("x-user-id", "U")
            .with_status(200)
            .with_body(SIMPLE_VEHICLE_JSON)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), authenticated_session()).unwrap();
        // the raw user input is normalized before dispatch
        let vehicle = client.fetch_vehicle_simple("ab 123-45").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vehicle.license_plate, "AB12345");
    }

    #[tokio::test]
    async fn test_unauthenticated_request_sends_no_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/test-auth")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), empty_session()).unwrap();
        let err = client.probe_auth().await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_unauthorized_response_clears_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/test-auth")
            .with_status(401)
            .create_async()
            .await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();

        let err = client.probe_auth().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_rejection_leaves_session_alone() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/auth/login")
            .with_status(401)
            .with_body("bad credentials")
            .create_async()
            .await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();

        let err = client
            .submit_login("mallory", "wrong", "csrf")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        // login is not a protected endpoint; the existing session survives
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_csrf_header_sent_on_login() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/auth/login")
            .match_header("x-xsrf-token", "csrf-123")
            .with_status(200)
            .with_body(r#"{"token": "T", "userId": "U"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), empty_session()).unwrap();
        let response = client.submit_login("alice", "pw", "csrf-123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.token, "T");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/vehicle/simple/AB12345")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();

        let err = client.fetch_vehicle_simple("AB12345").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        // a malformed payload is transient, not a session expiry
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_history_sorted_newest_first() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/history/all")
            .with_status(200)
            .with_body(
                r#"[
                    {"id": 1, "userId": "U", "licensePlate": "AB12345", "timestamp": "2024-11-01T10:00:00Z"},
                    {"id": 2, "userId": "U", "licensePlate": "CD67890", "timestamp": "2024-11-02T10:00:00Z"}
                ]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), authenticated_session()).unwrap();
        let history = client.fetch_history_all().await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, 2);
        assert_eq!(history[1].id, 1);
    }
}
