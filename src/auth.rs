use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use log::{trace, warn};
use serde::Deserialize;

use crate::error::{internal_error, DocshareError};
use crate::types::Session;
use crate::users::UsersApi;

/// Identity asserted by the identity provider for a session token
#[derive(Deserialize, Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, token: &str) -> Result<Identity, DocshareError>;
}

/// Asks an external auth endpoint who owns the token. The endpoint gets the
/// token as a bearer credential and answers 200 with an `Identity`.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    auth_url: String,
}

impl HttpIdentityProvider {
    pub fn new(auth_url: String) -> Result<Self, DocshareError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(internal_error)?;
        Ok(Self { client, auth_url })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn identify(&self, token: &str) -> Result<Identity, DocshareError> {
        let res = self
            .client
            .post(&self.auth_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| {
                warn!("auth: identity provider unreachable: {}", err);
                DocshareError::upstream("Identity provider unavailable")
            })?;
        let status = res.status();
        if status.is_server_error() {
            warn!("auth: identity provider responded with {}", status);
            return Err(DocshareError::upstream(
                "Identity provider unavailable",
            ));
        }
        if status != reqwest::StatusCode::OK {
            return Err(DocshareError::auth_failed("Authentication failed"));
        }
        let Ok(identity) = res.json::<Identity>().await else {
            return Err(DocshareError::auth_failed("Authentication failed"));
        };
        Ok(identity)
    }
}

/// Resolves bearer tokens into sessions, creating the user row on first
/// sign-in.
#[derive(Clone)]
pub struct Authenticator {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<UsersApi>,
}

impl Authenticator {
    pub fn new(provider: Arc<dyn IdentityProvider>, users: Arc<UsersApi>) -> Self {
        Self { provider, users }
    }

    pub async fn authenticate(&self, token: &str) -> Result<Session, DocshareError> {
        let identity = self.provider.identify(token).await?;
        if identity.email.trim().is_empty() {
            return Err(DocshareError::auth_failed("Authentication failed"));
        }
        let session = self.users.sign_in(&identity).await?;
        trace!("auth: authorized {} as {}", session.email, session.user_id);
        Ok(session)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
