use reqwest::Method;

use pennote_shared::{HealthStatus, LoginRequest, RegisterRequest, TokenResponse};

use crate::config::ClientConfig;
use crate::store::{check, read_json, Backend, StoreError};

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

/// Unauthenticated endpoints: health probe, login and registration.
#[derive(Clone, Debug)]
pub struct AuthClient {
    backend: Backend,
}

impl AuthClient {
    pub fn new(config: &ClientConfig) -> Result<Self, StoreError> {
        Ok(Self {
            backend: Backend::new(config)?,
        })
    }

    pub async fn health(&self) -> Result<HealthStatus, StoreError> {
        let response = self.backend.request(Method::GET, "/api/health").send().await?;
        let response = check(response, "backend unavailable").await?;
        read_json(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, StoreError> {
        let response = self
            .backend
            .request(Method::POST, "/api/auth/login")
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let response = check(response, "login failed").await?;
        let token: TokenResponse = read_json(response).await?;
        tracing::info!(%email, "logged in");
        Ok(token)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, StoreError> {
        let response = self
            .backend
            .request(Method::POST, "/api/auth/register")
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await?;
        let response = check(response, "registration failed").await?;
        read_json(response).await
    }
}
