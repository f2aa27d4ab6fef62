/// Refresh Token Records
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings with no structure
/// - Tied to one session: every rotation keeps the session identifier
/// - Single-use: a record is invalidated when it is exchanged
/// - Hashed with SHA-256 before durable storage

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

use crate::auth::session::SessionId;

const REFRESH_TOKEN_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Opaque token value handed to the client
    pub token: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_valid: bool,
}

impl RefreshTokenRecord {
    /// New valid record with a freshly generated value.
    pub fn issue(user_id: &str, session_id: &SessionId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: generate_refresh_token(),
            user_id: user_id.to_string(),
            session_id: session_id.clone(),
            expires_at: now + ttl,
            created_at: now,
            is_valid: true,
        }
    }

    /// Next link of the chain: same owner and session, new value and expiry.
    pub fn successor(&self, ttl: Duration) -> Self {
        Self::issue(&self.user_id, &self.session_id, ttl)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Draw a new token value, keeping everything else.
    pub fn regenerate(&mut self) {
        self.token = generate_refresh_token();
    }
}

/// Generate a new refresh token value from the thread-local CSPRNG.
///
/// 64 base62 characters, about 380 bits of entropy.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256
///
/// Durable stores key rows by this digest, never by the plaintext.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
