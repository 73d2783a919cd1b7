//! Authentication: salted password hashing, HMAC-signed bearer tokens and
//! one-time secrets for password resets.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use compliance_core::{ComplianceError, ComplianceResult, Role};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Iterated, salted SHA-256 password hasher.
///
/// Stored format: `rounds$salt_hex$digest_hex`.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    rounds: u32,
}

impl PasswordHasher {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: [u8; 16] = rand::thread_rng().gen();
        let digest = derive(&salt, password, self.rounds);
        format!("{}${}${}", self.rounds, hex::encode(salt), hex::encode(digest))
    }

    /// Check `password` against a stored hash. Malformed hashes never match.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        let (Some(rounds), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Ok(rounds) = rounds.parse::<u32>() else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
            return false;
        };
        let actual = derive(&salt, password, rounds);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

fn derive(salt: &[u8], password: &str, rounds: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..rounds {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .finalize()
            .into();
    }
    digest
}

pub fn validate_password(password: &str) -> ComplianceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ComplianceError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Random 12-character password handed to users created by an admin.
pub fn generate_temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

/// Random URL-safe secret (32 bytes, hex encoded).
pub fn generate_secret_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// SHA-256 of a secret token; only this digest is ever stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    /// Organization id.
    pub org: Uuid,
    pub role: Role,
    #[serde(default)]
    pub branch: Option<Uuid>,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies `base64url(claims).base64url(hmac)` tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        branch_id: Option<Uuid>,
        email: &str,
    ) -> ComplianceResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            org: organization_id,
            role,
            branch: branch_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    pub fn sign(&self, claims: &Claims) -> ComplianceResult<String> {
        let payload = serde_json::to_vec(claims)?;
        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str) -> ComplianceResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> ComplianceResult<Claims> {
        let invalid = || ComplianceError::Unauthorized("invalid or expired bearer token".into());

        let (payload_b64, sig_b64) = token.split_once('.').ok_or_else(invalid)?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| invalid())?;
        let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        if mac.verify_slice(&signature).is_err() {
            debug!("Bearer token signature mismatch");
            return Err(invalid());
        }

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.exp <= now.timestamp() {
            return Err(invalid());
        }
        Ok(claims)
    }

    fn mac(&self) -> ComplianceResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ComplianceError::Config(format!("token key rejected: {e}")))
    }
}
