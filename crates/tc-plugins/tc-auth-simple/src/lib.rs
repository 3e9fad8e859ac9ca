//! # tc-auth-simple
//!
//! Argon2 + JWT implementation of `IdentityProvider`.
//! Password hashes live in the document store's `credentials` collection,
//! keyed by lower-cased email; sessions are stateless HS256 tokens with an
//! in-memory revocation list for logout.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tc_core::document::{from_document, to_document, WriteOp};
use tc_core::error::{IdentityError, StoreError};
use tc_core::models::Identity;
use tc_core::traits::{DocumentStore, IdentityProvider};
use tracing::{debug, info};
use uuid::Uuid;

pub const CREDENTIALS: &str = "credentials";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    uid: String,
    email: String,
    name: String,
    password_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    email: Option<String>,
    iat: i64,
    exp: i64,
    /// Unique per token; the revocation list is keyed by it.
    jti: String,
}

pub struct SimpleIdentityProvider {
    store: Arc<dyn DocumentStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
    /// jti -> exp of logged-out tokens that have not expired yet
    revoked: DashMap<String, i64>,
}

fn backend(err: StoreError) -> IdentityError {
    IdentityError::Backend(err.into())
}

impl SimpleIdentityProvider {
    /// Accepts the HMAC secret (e.g., from configuration) and the session lifetime.
    pub fn new(store: Arc<dyn DocumentStore>, secret: &[u8], token_ttl: Duration) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            token_ttl,
            revoked: DashMap::new(),
        }
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, IdentityError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|err| IdentityError::InvalidToken(err.to_string()))?;
        Ok(data.claims)
    }
}

async fn hash_password(password: String) -> Result<String, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow::anyhow!("hashing password: {err}"))
    })
    .await
    .map_err(|err| IdentityError::Backend(err.into()))?
    .map_err(IdentityError::Backend)
}

/// Verifies if a provided password matches a stored Argon2 hash.
async fn verify_password(password: String, hash: String) -> Result<bool, IdentityError> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|err| IdentityError::Backend(err.into()))
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, IdentityError> {
        let email_key = email.to_lowercase();
        let credential = Credential {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash: hash_password(password.to_string()).await?,
        };

        let doc = to_document(&credential).map_err(backend)?;
        self.store
            .commit(vec![WriteOp::create(CREDENTIALS, &email_key, doc)])
            .await
            .map_err(|err| match err {
                StoreError::AlreadyExists { .. } => IdentityError::EmailTaken(email.to_string()),
                other => backend(other),
            })?;

        info!(uid = %credential.uid, "Identity registered");
        Ok(Identity {
            uid: credential.uid,
            name: credential.name,
            email: Some(credential.email),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let doc = self
            .store
            .get(CREDENTIALS, &email.to_lowercase())
            .await
            .map_err(backend)?
            .ok_or(IdentityError::InvalidCredentials)?;
        let credential: Credential = from_document(doc).map_err(backend)?;

        if !verify_password(password.to_string(), credential.password_hash.clone()).await? {
            debug!(uid = %credential.uid, "Password mismatch");
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(Identity {
            uid: credential.uid,
            name: credential.name,
            email: Some(credential.email),
        })
    }

    async fn issue_token(&self, identity: &Identity) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.uid.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| IdentityError::Backend(err.into()))
    }

    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let claims = self.decode_claims(token)?;
        if self.revoked.contains_key(&claims.jti) {
            return Err(IdentityError::InvalidToken("token has been revoked".into()));
        }
        Ok(Identity {
            uid: claims.sub,
            name: claims.name,
            email: claims.email,
        })
    }

    async fn revoke(&self, token: &str) -> Result<(), IdentityError> {
        let claims = self.decode_claims(token)?;
        let now = Utc::now().timestamp();
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(claims.jti, claims.exp);
        debug!(uid = %claims.sub, "Token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_store_memory::MemoryDocumentStore;

    fn provider() -> SimpleIdentityProvider {
        SimpleIdentityProvider::new(
            Arc::new(MemoryDocumentStore::new()),
            b"test-secret",
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let auth = provider();
        let created = auth.sign_up("Tani@Example.com", "rahasia", "Pak Tani").await.unwrap();

        let signed_in = auth.sign_in("tani@example.com", "rahasia").await.unwrap();
        assert_eq!(signed_in.uid, created.uid);
        assert_eq!(signed_in.name, "Pak Tani");

        let err = auth.sign_in("tani@example.com", "salah!!").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let auth = provider();
        auth.sign_up("a@b.c", "rahasia", "A").await.unwrap();
        let err = auth.sign_up("A@B.C", "rahasia", "B").await.unwrap_err();
        assert!(matches!(err, IdentityError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn test_revoked_token_no_longer_verifies() {
        let auth = provider();
        let identity = auth.sign_up("a@b.c", "rahasia", "A").await.unwrap();
        let token = auth.issue_token(&identity).await.unwrap();

        assert_eq!(auth.verify(&token).await.unwrap(), identity);

        auth.revoke(&token).await.unwrap();
        assert!(matches!(
            auth.verify(&token).await.unwrap_err(),
            IdentityError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn test_foreign_token_is_invalid() {
        let other = SimpleIdentityProvider::new(
            Arc::new(MemoryDocumentStore::new()),
            b"another-secret",
            Duration::hours(1),
        );
        let identity = Identity {
            uid: "u1".into(),
            name: "A".into(),
            email: None,
        };
        let token = other.issue_token(&identity).await.unwrap();

        assert!(matches!(
            provider().verify(&token).await.unwrap_err(),
            IdentityError::InvalidToken(_)
        ));
        assert!(provider().verify("not-a-jwt").await.is_err());
    }
}
