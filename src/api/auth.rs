//! Auth endpoints: login, signup and token refresh.

use super::{
    send_json,
    types::{LoginRequest, RefreshRequest},
    ApiClient, ApiError, AuthResponse, Employer, RefreshResponse,
};
use crate::session::AuthApi;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

impl ApiClient {
    /// Exchanges email and password for a token pair.
    ///
    /// # Errors
    /// Returns an error if the request fails or the credentials are rejected.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthResponse, ApiError> {
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        send_json(self.post("/auth/login").json(&body)).await
    }

    /// Creates an employer account and returns its first token pair.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server refuses the account.
    #[instrument(skip(self, employer), fields(email = %employer.email))]
    pub async fn register(&self, employer: &Employer) -> Result<AuthResponse, ApiError> {
        send_json(self.post("/auth/signup").json(employer)).await
    }

    /// Exchanges a refresh credential for a new access token.
    ///
    /// # Errors
    /// Returns an error if the request fails or the credential is rejected.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshResponse, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        };
        send_json(self.post("/auth/refresh").json(&body)).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshResponse, ApiError> {
        ApiClient::refresh(self, refresh_token).await
    }
}
