/// Access token claims
///
/// Payload of the signed access token: user identity, role and the
/// per-login session identifier (`jti`) shared with the refresh token chain.

use serde::{Deserialize, Serialize};

use crate::auth::session::SessionId;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Username
    pub name: String,
    /// Primary role, absent when the user has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Session identifier
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    /// Build claims expiring `ttl_seconds` from now.
    pub fn new(
        user_id: &str,
        username: &str,
        role: Option<String>,
        session_id: &SessionId,
        ttl_seconds: i64,
        issuer: &str,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            name: username.to_string(),
            role,
            jti: session_id.to_string(),
            exp: now + ttl_seconds,
            iat: now,
            iss: issuer.to_string(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::from(self.jti.as_str())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}
