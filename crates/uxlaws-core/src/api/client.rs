//! API client for the UX laws service.
//!
//! Every call goes through one pipeline: the stored bearer token is attached
//! on the way out, and a 401 on the way back purges the stored credentials
//! before the error reaches the caller.

use std::sync::Arc;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{AuthResponse, Progress, User};
use crate::storage::{purge_credentials, CredentialStore, TOKEN_KEY};

use super::ApiError;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// API client for the UX laws service.
/// Clone is cheap - reqwest::Client and the store are both reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl ApiClient {
    /// Create a client for the configured base URL
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url().to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Pipeline =====

    /// Attach the stored bearer token, if any.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.get(TOKEN_KEY).await {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => {
                debug!("No stored token, sending request unauthenticated");
                request
            }
        }
    }

    /// Inspect the response status. A 401 clears the stored credentials.
    async fn intercept(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Server rejected credentials, clearing session");
            purge_credentials(self.store.as_ref()).await;
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    /// Send a request through the pipeline.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = self
            .authorize(request.header(header::ACCEPT, "application/json"))
            .await;
        let response = request.send().await?;
        self.intercept(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Self::parse(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        Self::parse(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.delete(self.url(path))).await?;
        Self::parse(response).await
    }

    // ===== Authentication =====

    /// Exchange email and password for a token. Does not store anything.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self
            .post("auth/login", &LoginRequest { email, password })
            .await?;
        info!(user_id = %auth.user.id, "Login accepted");
        Ok(auth)
    }

    /// Create an account. Does not store anything.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self
            .post(
                "auth/register",
                &RegisterRequest {
                    name,
                    email,
                    password,
                },
            )
            .await?;
        info!(user_id = %auth.user.id, "Registration accepted");
        Ok(auth)
    }

    // ===== Profile and progress =====

    pub async fn fetch_profile(&self) -> Result<User, ApiError> {
        self.get("users/me").await
    }

    pub async fn fetch_progress(&self) -> Result<Progress, ApiError> {
        self.get("progress").await
    }

    /// Mark a law as learned and return the updated progress
    pub async fn complete_law(&self, law_id: &str) -> Result<Progress, ApiError> {
        if !is_valid_law_id(law_id) {
            return Err(ApiError::InvalidRequest(format!("invalid law id '{}'", law_id)));
        }
        self.post(&format!("progress/{}", law_id), &serde_json::json!({}))
            .await
    }

    pub async fn reset_progress(&self) -> Result<Progress, ApiError> {
        self.delete("progress").await
    }
}

/// Law ids are slugs like `fitts-law`.
fn is_valid_law_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
