use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthResponse, User};
use crate::storage::{purge_credentials, CredentialStore, TOKEN_KEY, USER_KEY};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Name is required")]
    MissingName,

    #[error("Not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unauthenticated => None,
        }
    }
}

/// Signed-in session: the API client plus the credentials it stores.
#[derive(Clone)]
pub struct Session {
    api: ApiClient,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.api.store()
    }

    /// Authenticate and persist the token and user
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let auth = self.api.login(email, password).await?;
        Ok(self.persist(auth).await)
    }

    /// Create an account and sign in with it
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let auth = self.api.register(name, email, password).await?;
        Ok(self.persist(auth).await)
    }

    async fn persist(&self, auth: AuthResponse) -> User {
        self.store().set(TOKEN_KEY, &auth.token).await;
        self.cache_user(&auth.user).await;
        info!(user_id = %auth.user.id, "Session started");
        auth.user
    }

    async fn cache_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.store().set(USER_KEY, &json).await,
            Err(e) => warn!(error = %e, "Failed to serialize user for caching"),
        }
    }

    /// Forget the stored token and user
    pub async fn logout(&self) {
        purge_credentials(self.store().as_ref()).await;
        info!("Signed out");
    }

    /// Cached user, if one is stored and parses
    pub async fn cached_user(&self) -> Option<User> {
        let json = self.store().get(USER_KEY).await?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Cached user is unreadable, ignoring it");
                None
            }
        }
    }

    /// Authenticated only when both a token and a readable cached user exist
    pub async fn state(&self) -> AuthState {
        let has_token = self
            .store()
            .get(TOKEN_KEY)
            .await
            .is_some_and(|t| !t.is_empty());
        if !has_token {
            return AuthState::Unauthenticated;
        }
        match self.cached_user().await {
            Some(user) => AuthState::Authenticated(user),
            None => AuthState::Unauthenticated,
        }
    }

    /// Re-fetch the profile from the server and update the cached copy
    pub async fn refresh_profile(&self) -> Result<User, AuthError> {
        if !self.state().await.is_authenticated() {
            return Err(AuthError::NotSignedIn);
        }
        let user = self.api.fetch_profile().await?;
        self.cache_user(&user).await;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemoryStore;

    fn offline_session() -> (Session, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let api = ApiClient::new(&Config::default(), store.clone()).unwrap();
        (Session::new(api), store)
    }

    fn ada() -> User {
        User {
            id: "u1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected_before_request() {
        let (session, _) = offline_session();
        assert!(matches!(
            session.login("  ", "secret").await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            session.login("ada@example.com", "").await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            session.register("", "ada@example.com", "secret").await,
            Err(AuthError::MissingName)
        ));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (session, store) = offline_session();
        assert_eq!(session.state().await, AuthState::Unauthenticated);

        let user = session
            .persist(AuthResponse {
                token: "abc123".to_string(),
                user: ada(),
            })
            .await;
        assert_eq!(user, ada());
        assert_eq!(session.state().await, AuthState::Authenticated(ada()));
        assert_eq!(store.get(TOKEN_KEY).await.as_deref(), Some("abc123"));

        session.logout().await;
        assert_eq!(session.state().await, AuthState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_token_without_user_is_unauthenticated() {
        let (session, store) = offline_session();
        store.set(TOKEN_KEY, "abc123").await;
        assert_eq!(session.state().await, AuthState::Unauthenticated);

        store.set(USER_KEY, "not json").await;
        assert_eq!(session.cached_user().await, None);
        assert_eq!(session.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_refresh_profile_requires_session() {
        let (session, _) = offline_session();
        assert!(matches!(
            session.refresh_profile().await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
