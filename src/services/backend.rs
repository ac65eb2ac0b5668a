use crate::models::{
    ErrorResponse, MatchRequest, MatchResponse, PreferencesResponse, SavePreferencesRequest,
    UsageSummary, Weights,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Gate codes the backend tags failures with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LoginRequired,
    UpgradeRequired,
}

impl ErrorCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "LOGIN_REQUIRED" => Some(ErrorCode::LoginRequired),
            "UPGRADE_REQUIRED" => Some(ErrorCode::UpgradeRequired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LoginRequired => "LOGIN_REQUIRED",
            ErrorCode::UpgradeRequired => "UPGRADE_REQUIRED",
        }
    }
}

/// Errors that can occur when talking to the ranking backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Login required")]
    AuthRequired { message: Option<String> },

    #[error("Upgrade required")]
    QuotaExceeded { message: Option<String> },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend error: {0}")]
    Transient(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiError::AuthRequired { .. } => Some(ErrorCode::LoginRequired),
            ApiError::QuotaExceeded { .. } => Some(ErrorCode::UpgradeRequired),
            _ => None,
        }
    }

    /// Server supplied message for gate errors
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::AuthRequired { message } | ApiError::QuotaExceeded { message } => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
            _ => None,
        }
    }

    /// Network or unknown backend failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Request(_) | ApiError::Transient(_))
    }

    /// Build an error from a failed response's status and body
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let parsed: ErrorResponse = serde_json::from_slice(body).unwrap_or_default();
        let code = parsed.code.clone();
        let message = parsed.detail();

        match code.as_deref().and_then(ErrorCode::parse) {
            Some(ErrorCode::LoginRequired) => return ApiError::AuthRequired { message },
            Some(ErrorCode::UpgradeRequired) => return ApiError::QuotaExceeded { message },
            None => {}
        }

        match status {
            StatusCode::UNAUTHORIZED => ApiError::AuthRequired { message },
            StatusCode::PAYMENT_REQUIRED => ApiError::QuotaExceeded { message },
            _ => ApiError::Transient(format!(
                "{}: {}",
                status,
                message.unwrap_or_else(|| "no details".to_string())
            )),
        }
    }
}

/// Who the engine is acting for
///
/// Passed explicitly into the backend and session instead of being looked
/// up from ambient storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    /// Usage feature key the ranking operation is metered under
    pub feature: String,
}

impl SessionContext {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.access_token = Some(access_token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// The ranking oracle and its companion endpoints
#[async_trait]
pub trait MatchBackend: Send + Sync {
    /// `POST /match`
    async fn rank(&self, request: &MatchRequest) -> Result<MatchResponse, ApiError>;

    /// `GET /usage/{feature}`
    async fn usage(&self, feature: &str) -> Result<UsageSummary, ApiError>;

    /// `GET /preferences`, `None` when nothing is stored yet
    async fn load_preferences(&self) -> Result<Option<Weights>, ApiError>;

    /// `PUT /preferences`
    async fn save_preferences(&self, weights: &Weights) -> Result<(), ApiError>;
}

/// HTTP implementation of [`MatchBackend`]
pub struct HttpBackend {
    base_url: String,
    client: Client,
    context: SessionContext,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        context: SessionContext,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            context,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("X-Request-Id", uuid::Uuid::new_v4().to_string());
        match &self.context.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body);
        tracing::debug!("Backend responded {}: {}", status, err);
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }
}

#[async_trait]
impl MatchBackend for HttpBackend {
    async fn rank(&self, request: &MatchRequest) -> Result<MatchResponse, ApiError> {
        let response = self
            .authorize(self.client.post(self.url("/match")))
            .json(request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Self::decode(response, "match response").await
    }

    async fn usage(&self, feature: &str) -> Result<UsageSummary, ApiError> {
        let url = self.url(&format!("/usage/{}", urlencoding::encode(feature)));
        let response = self.authorize(self.client.get(&url)).send().await?;

        let response = Self::check(response).await?;
        Self::decode(response, "usage summary").await
    }

    async fn load_preferences(&self) -> Result<Option<Weights>, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("/preferences")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response).await?;
        let prefs: PreferencesResponse = Self::decode(response, "preferences").await?;
        Ok(prefs.weights.map(Weights::normalized))
    }

    async fn save_preferences(&self, weights: &Weights) -> Result<(), ApiError> {
        let body = SavePreferencesRequest {
            weights: weights.clone(),
        };
        let response = self
            .authorize(self.client.put(self.url("/preferences")))
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_backend_creation() {
        let backend = HttpBackend::new(
            "https://api.test/v1/",
            Duration::from_secs(5),
            SessionContext::new("university-match"),
        )
        .unwrap();

        assert_eq!(backend.base_url(), "https://api.test/v1");
        assert_eq!(backend.url("/match"), "https://api.test/v1/match");
    }

    #[test]
    fn test_error_code_from_body_wins() {
        let body = br#"{"code":"UPGRADE_REQUIRED","message":"Out of matches"}"#;
        let err = ApiError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.code(), Some(ErrorCode::UpgradeRequired));
        assert_eq!(err.server_message(), Some("Out of matches"));
    }

    #[test]
    fn test_error_code_survives_error_and_message_fields() {
        let body = br#"{"error":"Forbidden","code":"UPGRADE_REQUIRED","message":"Out of matches"}"#;
        let err = ApiError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.code(), Some(ErrorCode::UpgradeRequired));
        assert_eq!(err.server_message(), Some("Out of matches"));

        let body = br#"{"error":"Sign in first","code":"LOGIN_REQUIRED"}"#;
        let err = ApiError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err.code(), Some(ErrorCode::LoginRequired));
        assert_eq!(err.server_message(), Some("Sign in first"));
    }

    #[test]
    fn test_error_code_from_status() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, b"");
        assert_eq!(err.code(), Some(ErrorCode::LoginRequired));
        assert_eq!(err.server_message(), None);

        let err = ApiError::from_status(StatusCode::PAYMENT_REQUIRED, b"not json");
        assert_eq!(err.code(), Some(ErrorCode::UpgradeRequired));
    }

    #[test]
    fn test_unknown_failure_is_transient() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, br#"{"error":"upstream down"}"#);
        assert!(err.is_transient());
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_session_context() {
        let ctx = SessionContext::new("university-match");
        assert!(!ctx.is_authenticated());
        let ctx = ctx.with_user("u1", "token");
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
    }
}
