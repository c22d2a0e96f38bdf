use std::sync::Arc;

use log::info;

use crate::auth::Identity;
use crate::error::DocshareError;
use crate::repository::Repository;
use crate::types::{Session, UserInfo};

pub struct UsersApi {
    repo: Arc<dyn Repository>,
}

impl UsersApi {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Upserts the user asserted by the identity provider
    pub async fn sign_in(&self, identity: &Identity) -> Result<Session, DocshareError> {
        let email = identity.email.trim().to_lowercase();
        let user = self
            .repo
            .upsert_user(&email, identity.name.as_deref())
            .await?;
        Ok(Session::from(user))
    }

    pub async fn me(&self, session: &Session) -> Result<UserInfo, DocshareError> {
        match self.repo.find_user(session.user_id).await? {
            Some(user) => Ok(UserInfo::from(user)),
            None => Err(DocshareError::auth_failed("User no longer exists")),
        }
    }

    pub async fn get_user(&self, email: &str) -> Result<UserInfo, DocshareError> {
        let email = email.trim().to_lowercase();
        match self.repo.find_user_by_email(&email).await? {
            Some(user) => Ok(UserInfo::from(user)),
            None => Err(DocshareError::not_found("User not found")),
        }
    }

    pub async fn set_admin(
        &self,
        email: &str,
        is_admin: bool,
    ) -> Result<UserInfo, DocshareError> {
        let email = email.trim().to_lowercase();
        match self.repo.set_admin(&email, is_admin).await? {
            Some(user) => {
                info!("users: {} admin={}", user.email, user.is_admin);
                Ok(UserInfo::from(user))
            }
            None => Err(DocshareError::not_found("User not found")),
        }
    }
}
