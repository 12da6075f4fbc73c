//! User identities and login tokens.
//!
//! Identity records live in the `identities` collection keyed by lowercased
//! email. Passwords are stored as Argon2id PHC strings. Login tokens are
//! HS256 JWTs carrying the identity uid as `sub`.

use crate::storage::{self, DocumentStore, IDENTITIES};
use crate::{Error, Result};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity uid
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies login tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_minutes: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    /// Issue a token for `uid` valid from `now` for the configured TTL.
    pub fn issue_at(&self, uid: &str, email: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: uid.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn issue(&self, uid: &str, email: &str) -> Result<String> {
        self.issue_at(uid, email, Utc::now())
    }

    /// Verify signature and expiry.
    ///
    /// Every failure maps to `Error::Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected token");
                Error::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

/// A stored identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub uid: String,
    pub email: String,

    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Argon2 PHC string; salt and parameters are embedded
    #[serde(rename = "passwordHash")]
    password_hash: String,

    #[serde(rename = "dateCreated")]
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    fn new(email: &str, password: &str, display_name: Option<&str>) -> Result<Self> {
        Ok(Self {
            uid: storage::generate_id(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        })
    }

    /// Check a candidate password against the stored hash.
    ///
    /// A stored hash that does not parse never matches.
    pub fn password_matches(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!(uid = %self.uid, error = %e, "Stored password hash is malformed");
                false
            }
        }
    }
}

/// Hash a password with Argon2id under a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| Error::Other(format!("Failed to generate salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn identity_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account management and token issuance behind `/api/register`,
/// `/api/login` and the `/tasks` guard.
pub trait IdentityProvider: Send + Sync {
    /// Provision a new identity. Fails with `Error::Conflict` if the email
    /// is already registered.
    fn create_user(
        &self,
        store: &mut dyn DocumentStore,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<IdentityRecord>;

    fn get_user_by_email(&self, store: &dyn DocumentStore, email: &str)
    -> Result<Option<IdentityRecord>>;

    /// Check credentials. Unknown emails and wrong passwords both fail with
    /// `Error::Unauthorized`.
    fn authenticate(
        &self,
        store: &dyn DocumentStore,
        email: &str,
        password: &str,
    ) -> Result<IdentityRecord>;

    fn issue_token(&self, identity: &IdentityRecord) -> Result<String>;

    fn verify_token(&self, token: &str) -> Result<Claims>;
}

/// Identity provider backed by the service's own document store.
#[derive(Debug, Clone)]
pub struct StoreIdentityProvider {
    issuer: TokenIssuer,
}

impl StoreIdentityProvider {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl IdentityProvider for StoreIdentityProvider {
    fn create_user(
        &self,
        store: &mut dyn DocumentStore,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<IdentityRecord> {
        let key = identity_key(email);
        let record = IdentityRecord::new(&key, password, display_name)?;
        store
            .create(IDENTITIES, &key, storage::to_document(&record)?)
            .map_err(|e| match e {
                Error::Conflict(_) => Error::Conflict(
                    "The email address is already in use by another account.".to_string(),
                ),
                other => other,
            })?;
        debug!(uid = %record.uid, "Created identity");
        Ok(record)
    }

    fn get_user_by_email(
        &self,
        store: &dyn DocumentStore,
        email: &str,
    ) -> Result<Option<IdentityRecord>> {
        store
            .get(IDENTITIES, &identity_key(email))?
            .map(storage::from_document)
            .transpose()
    }

    fn authenticate(
        &self,
        store: &dyn DocumentStore,
        email: &str,
        password: &str,
    ) -> Result<IdentityRecord> {
        match self.get_user_by_email(store, email)? {
            Some(record) if record.password_matches(password) => Ok(record),
            _ => Err(Error::Unauthorized("Invalid credentials".to_string())),
        }
    }

    fn issue_token(&self, identity: &IdentityRecord) -> Result<String> {
        self.issuer.issue(&identity.uid, &identity.email)
    }

    fn verify_token(&self, token: &str) -> Result<Claims> {
        self.issuer.verify(token)
    }
}
