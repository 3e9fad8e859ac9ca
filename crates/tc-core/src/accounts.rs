//! # Accounts
//!
//! Signup, login and profile management. Credentials live with the
//! [`IdentityProvider`]; the profile document lives in the `users` collection.

use std::sync::Arc;

use tracing::{info, warn};

use crate::directory::RegionDirectory;
use crate::document::{from_document, to_document, FieldChange};
use crate::error::{AppError, Result};
use crate::models::collections::USERS;
use crate::models::{Identity, Session, UserProfile};
use crate::traits::{DocumentStore, IdentityProvider, ObjectStorage};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const PROFILE_BUCKET: &str = "profiles";

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub region_code: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    media: Arc<dyn ObjectStorage>,
    regions: Arc<RegionDirectory>,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn ObjectStorage>,
        regions: Arc<RegionDirectory>,
    ) -> Self {
        Self {
            identity,
            store,
            media,
            regions,
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Session> {
        let (email, name) = (email.trim(), name.trim());
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(AppError::Validation(
                "Email, password and name are required".into(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let identity = self.identity.sign_up(email, password, name).await?;
        let profile = UserProfile {
            uid: identity.uid.clone(),
            email: email.to_string(),
            name: identity.name.clone(),
            region_code: None,
            photo_url: None,
        };
        self.store
            .set(USERS, &profile.uid, to_document(&profile)?)
            .await?;

        let token = self.identity.issue_token(&identity).await?;
        info!(uid = %identity.uid, "Account created");
        Ok(Session {
            user_id: identity.uid,
            name: identity.name,
            token,
        })
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Email and password are required".into()));
        }

        let identity = self.identity.sign_in(email, password).await?;
        let profile = self.profile(&identity.uid).await?;
        let token = self.identity.issue_token(&identity).await?;

        info!(uid = %profile.uid, "Logged in");
        Ok(Session {
            user_id: profile.uid,
            name: profile.name,
            token,
        })
    }

    pub async fn log_out(&self, token: &str) -> Result<()> {
        self.identity.revoke(token).await?;
        Ok(())
    }

    /// Resolves a bearer token to its caller.
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        if token.is_empty() {
            return Err(AppError::Unauthorized("missing token".into()));
        }
        self.identity.verify(token).await.map_err(|err| {
            warn!(error = %err, "Token rejected");
            err.into()
        })
    }

    pub async fn profile(&self, uid: &str) -> Result<UserProfile> {
        match self.store.get(USERS, uid).await? {
            Some(doc) => Ok(from_document(doc)?),
            None => Err(AppError::not_found("user", uid)),
        }
    }

    pub async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> Result<UserProfile> {
        let mut changes = Vec::new();
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("name must not be empty".into()));
            }
            changes.push(FieldChange::set("name", name));
        }
        if let Some(code) = update.region_code {
            let region = self
                .regions
                .by_code(code.trim())
                .ok_or_else(|| AppError::not_found("region", code.trim()))?;
            changes.push(FieldChange::set("regionCode", region.code.as_str()));
        }
        if changes.is_empty() {
            return Err(AppError::Validation("nothing to update".into()));
        }

        let doc = self.store.update(USERS, uid, changes).await?;
        info!(uid, "Profile updated");
        Ok(from_document(doc)?)
    }

    pub async fn set_profile_photo(
        &self,
        uid: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<UserProfile> {
        if data.is_empty() {
            return Err(AppError::Validation("photo is required".into()));
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "unsupported photo type {content_type}"
            )));
        }
        self.profile(uid).await?;

        let url = self
            .media
            .upload(PROFILE_BUCKET, uid, data, content_type)
            .await
            .map_err(|err| AppError::Internal(err.to_string()))?;
        let doc = self
            .store
            .update(USERS, uid, vec![FieldChange::set("photoUrl", url)])
            .await?;
        Ok(from_document(doc)?)
    }
}
