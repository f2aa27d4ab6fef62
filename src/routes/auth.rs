/// Authentication Routes
///
/// Thin HTTP surface over `TokenLifecycleManager`: login, refresh, revoke and
/// the current session's identity.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, SessionId, TokenLifecycleManager, TokenPair};
use crate::error::AppError;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token pair presented for refresh or revocation
#[derive(Deserialize)]
pub struct TokenPairRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, manager: &TokenLifecycleManager) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: manager.access_token_ttl().num_seconds(),
        }
    }
}

/// Identity carried by the presented access token
#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub username: String,
    pub role: Option<String>,
    pub session_id: SessionId,
}

/// One link of a rotation chain; token values are never exposed
#[derive(Serialize)]
pub struct ChainEntry {
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
    pub is_valid: bool,
}

/// POST /auth/login
///
/// # Errors
/// - 401: Unknown user or wrong password (indistinguishable)
/// - 503: Store unavailable
pub async fn login(
    form: web::Json<LoginRequest>,
    manager: web::Data<TokenLifecycleManager>,
) -> Result<HttpResponse, AppError> {
    let pair = manager.login(&form.username, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, manager.get_ref())))
}

/// POST /auth/refresh
///
/// Rotates the refresh token. Replaying an already-rotated token revokes the
/// whole session.
///
/// # Errors
/// - 401: Unknown, expired, replayed, or mismatched token pair
pub async fn refresh(
    form: web::Json<TokenPairRequest>,
    manager: web::Data<TokenLifecycleManager>,
) -> Result<HttpResponse, AppError> {
    let pair = manager.refresh(&form.access_token, &form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, manager.get_ref())))
}

/// POST /auth/revoke
///
/// Always 204 for a well-formed request, whether or not anything was revoked.
pub async fn revoke(
    form: web::Json<TokenPairRequest>,
    manager: web::Data<TokenLifecycleManager>,
) -> Result<HttpResponse, AppError> {
    manager.revoke(&form.access_token, &form.refresh_token).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// **Requires valid JWT access token**; claims are injected by `JwtMiddleware`.
pub async fn current_session(claims: web::ReqData<Claims>) -> HttpResponse {
    let claims = claims.into_inner();
    let session_id = claims.session_id();
    HttpResponse::Ok().json(SessionResponse {
        user_id: claims.sub,
        username: claims.name,
        role: claims.role,
        session_id,
    })
}

/// GET /api/admin/sessions/{session_id}
///
/// Rotation history of a session, oldest first. Requires the `admin` role.
pub async fn session_history(
    path: web::Path<String>,
    manager: web::Data<TokenLifecycleManager>,
) -> Result<HttpResponse, AppError> {
    let session_id = SessionId::from(path.into_inner());
    let chain = manager.session_chain(&session_id).await?;

    let entries: Vec<ChainEntry> = chain
        .into_iter()
        .map(|record| ChainEntry {
            user_id: record.user_id,
            created_at: record.created_at.to_rfc3339(),
            expires_at: record.expires_at.to_rfc3339(),
            is_valid: record.is_valid,
        })
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}
