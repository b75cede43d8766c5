use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn admin(valid_for: Duration) -> Self {
        let now = Utc::now();
        let exp = now + valid_for;

        Self {
            sub: ADMIN_SUBJECT.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Signs and checks the admin-session token kept in the browser's preferences.
#[derive(Clone)]
pub struct AdminTokens {
    secret: String,
    valid_for: Duration,
}

impl AdminTokens {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            valid_for: Duration::days(30),
        }
    }

    pub fn create_token(&self) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::default(),
            &Claims::admin(self.valid_for),
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
    }

    pub fn verify_token(&self, token: &str) -> bool {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims.sub == ADMIN_SUBJECT)
        .unwrap_or(false)
    }
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Compares a secret with the stored admin credential. Stored values written by this
/// service are bcrypt hashes; anything else is a legacy plain-text value.
pub fn credential_matches(secret: &str, stored: &str) -> bool {
    let hashed = BCRYPT_PREFIXES.iter().any(|prefix| stored.starts_with(prefix));
    match hashed.then(|| bcrypt::verify(secret, stored)) {
        Some(Ok(matches)) => matches,
        // Not a well-formed hash after all.
        Some(Err(_)) | None => secret == stored,
    }
}
