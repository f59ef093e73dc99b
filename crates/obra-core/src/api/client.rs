//! API client for the dashboard's users/auth service.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::UserIdentity;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    email: &'a str,
    #[serde(rename = "verificationCode")]
    verification_code: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

/// Body of `POST /auth/login`. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Session lifetime in milliseconds
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

/// Everything `SessionManager::login` needs.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: String,
    pub user: UserIdentity,
    pub expires_in: chrono::Duration,
}

/// API client for the users/auth service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Authentication =====

    /// Exchange credentials for a token and its lifetime.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let url = self.url("auth/login");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        let login: LoginResponse = response.json().await.context("Failed to parse login response")?;

        if login.token.is_empty() || login.expires_in <= 0 {
            return Err(ApiError::InvalidResponse(format!(
                "login returned an unusable session (expiresIn = {})",
                login.expires_in
            ))
            .into());
        }
        Ok(login)
    }

    /// Fetch the identity behind a token.
    pub async fn me(&self, token: &str) -> Result<UserIdentity> {
        self.with_token(token.to_string()).get(&self.url("users/me")).await
    }

    /// Full login flow: credentials, then the current user, in sequence.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Authenticated> {
        let login = self.login(email, password).await?;
        let user = self.me(&login.token).await?;
        info!(user_id = user.id, role = %user.role, "Authenticated");

        Ok(Authenticated {
            token: login.token,
            user,
            expires_in: chrono::Duration::milliseconds(login.expires_in),
        })
    }

    // ===== Password recovery =====

    /// Ask the backend to email a verification code.
    pub async fn send_reset_code(&self, email: &str) -> Result<()> {
        let url = self.url("auth/send-reset-code");
        let response = self
            .client
            .post(&url)
            .query(&[("email", email)])
            .send()
            .await
            .context("Failed to send reset code request")?;
        Self::check_response(response).await?;
        debug!("Reset code requested");
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, verification_code: &str, new_password: &str) -> Result<()> {
        let url = self.url("auth/reset-password");
        let body = ResetPasswordRequest {
            email,
            verification_code,
            new_password,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send reset password request")?;
        Self::check_response(response).await?;
        info!("Password reset");
        Ok(())
    }

    // ===== Plumbing =====

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}
