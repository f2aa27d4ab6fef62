/// Access Token Encoding and Parsing
///
/// `ClaimsEncoder` signs and verifies HS256 access tokens. It is built from an
/// explicit secret and issuer; nothing here reads global configuration.

use std::fmt;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;

use crate::auth::claims::Claims;
use crate::auth::session::SessionId;
use crate::configuration::JwtSettings;
use crate::error::TokenError;
use crate::identity::User;

/// Identity recovered from a structurally valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub user_id: String,
    pub session_id: SessionId,
}

/// Claims as they appear on the wire, before required fields are checked.
#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    jti: Option<String>,
}

#[derive(Clone)]
pub struct ClaimsEncoder {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl ClaimsEncoder {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(&settings.secret, settings.issuer.clone())
    }

    /// Sign an access token for `user` in session `session_id`, expiring at `now + ttl`.
    ///
    /// # Errors
    /// Only `TokenError::Encoding`, which indicates a key configuration fault.
    pub fn issue(
        &self,
        user: &User,
        role: Option<&str>,
        session_id: &SessionId,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(
            &user.id,
            &user.username,
            role.map(str::to_string),
            session_id,
            ttl.num_seconds(),
            &self.issuer,
        );

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature and structure, ignoring expiry.
    ///
    /// Used on the refresh path, where a lapsed access token still names the
    /// session it belongs to.
    pub fn parse(&self, token: &str) -> Result<ParsedToken, TokenError> {
        let mut validation = self.validation();
        validation.validate_exp = false;

        let raw = decode::<RawClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)?;

        let user_id = raw
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::MissingClaim("sub".to_string()))?;
        let session_id = raw
            .jti
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenError::MissingClaim("jti".to_string()))?;

        Ok(ParsedToken {
            user_id,
            session_id: SessionId::from(session_id),
        })
    }

    /// Fully validate an access token, expiry included, and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;
        validation
    }
}

impl fmt::Debug for ClaimsEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsEncoder")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn encoder() -> ClaimsEncoder {
        ClaimsEncoder::new(SECRET, "test")
    }

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            username: "villa@example.com".to_string(),
        }
    }

    #[test]
    fn test_issue_and_parse_round_trip() {
        let encoder = encoder();
        let session = SessionId::generate();

        let token = encoder
            .issue(&user(), Some("admin"), &session, Duration::minutes(5))
            .expect("Failed to issue token");
        let parsed = encoder.parse(&token).expect("Failed to parse token");

        assert_eq!(parsed.user_id, "user-1");
        assert_eq!(parsed.session_id, session);
    }

    #[test]
    fn test_verify_returns_full_claims() {
        let encoder = encoder();
        let session = SessionId::generate();
        let token = encoder
            .issue(&user(), Some("customer"), &session, Duration::minutes(5))
            .unwrap();

        let claims = encoder.verify(&token).expect("Failed to verify token");
        assert_eq!(claims.name, "villa@example.com");
        assert_eq!(claims.role.as_deref(), Some("customer"));
        assert_eq!(claims.jti, session.to_string());
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_parse_ignores_expiry_but_verify_does_not() {
        let encoder = encoder();
        let session = SessionId::generate();
        let token = encoder
            .issue(&user(), None, &session, Duration::minutes(-10))
            .unwrap();

        assert_eq!(encoder.parse(&token).unwrap().session_id, session);
        assert_eq!(encoder.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_malformed_token() {
        assert_eq!(encoder().parse("invalid.token.here"), Err(TokenError::Malformed));
        assert_eq!(encoder().parse(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let encoder = encoder();
        let token = encoder
            .issue(&user(), None, &SessionId::generate(), Duration::minutes(5))
            .unwrap();

        let tampered = format!("{}X", token);
        assert!(encoder.parse(&tampered).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let token = encoder()
            .issue(&user(), None, &SessionId::generate(), Duration::minutes(5))
            .unwrap();
        let other = ClaimsEncoder::new("another-secret-key-at-least-32-characters", "test");

        assert_eq!(other.parse(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = encoder()
            .issue(&user(), None, &SessionId::generate(), Duration::minutes(5))
            .unwrap();
        let other = ClaimsEncoder::new(SECRET, "wrong-issuer");

        assert_eq!(other.parse(&token), Err(TokenError::InvalidIssuer));
    }

    #[test]
    fn test_missing_session_claim() {
        #[derive(serde::Serialize)]
        struct NoJti {
            sub: String,
            exp: i64,
            iss: String,
        }

        let claims = NoJti {
            sub: "user-1".to_string(),
            exp: chrono::Utc::now().timestamp() + 60,
            iss: "test".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            encoder().parse(&token),
            Err(TokenError::MissingClaim("jti".to_string()))
        );
    }
}
