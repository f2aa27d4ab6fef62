/// Token Lifecycle Management
///
/// Login, refresh and revoke over a rotation chain of refresh tokens.
///
/// # Token Rotation Security
/// - Each refresh exchanges the presented record for a successor in the same session
/// - Presenting an already-rotated token revokes the whole session chain
/// - An access token naming another user or session invalidates the presented record
/// - Every failure is reported to the caller as the same `Unauthorized`

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, instrument, warn};

use crate::auth::jwt::{ClaimsEncoder, ParsedToken};
use crate::auth::refresh_token::RefreshTokenRecord;
use crate::auth::session::SessionId;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError, StoreError};
use crate::identity::{primary_role, IdentityProvider, User};
use crate::store::{RefreshTokenStore, Rotation};

/// Token pair handed back on login and refresh
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenLifecycleManager {
    encoder: ClaimsEncoder,
    store: Arc<dyn RefreshTokenStore>,
    identity: Arc<dyn IdentityProvider>,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl TokenLifecycleManager {
    pub fn new(
        encoder: ClaimsEncoder,
        store: Arc<dyn RefreshTokenStore>,
        identity: Arc<dyn IdentityProvider>,
        access_token_ttl: Duration,
        refresh_token_ttl: Duration,
    ) -> Self {
        Self {
            encoder,
            store,
            identity,
            access_token_ttl,
            refresh_token_ttl,
        }
    }

    /// Build from validated JWT settings.
    ///
    /// # Errors
    /// Returns error if the settings fail [`JwtSettings::validate`]
    pub fn from_settings(
        settings: &JwtSettings,
        store: Arc<dyn RefreshTokenStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::new(
            ClaimsEncoder::from_settings(settings),
            store,
            identity,
            settings.access_token_ttl(),
            settings.refresh_token_ttl(),
        ))
    }

    pub fn encoder(&self) -> &ClaimsEncoder {
        &self.encoder
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Authenticate and open a new session: the root of a fresh rotation chain.
    ///
    /// Unknown user and wrong password fail identically, each after one bcrypt round.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.identity.find_by_username(username).await? {
            Some(user) => user,
            None => {
                self.identity.spend_credential_check(password).await?;
                warn!("Login failed: unknown username");
                return Err(AppError::unauthorized());
            }
        };

        if !self.identity.verify_credential(&user, password).await? {
            warn!(user_id = %user.id, "Login failed: invalid password");
            return Err(AppError::unauthorized());
        }

        let session_id = SessionId::generate();
        let access_token = self.issue_access_token(&user, &session_id).await?;
        let root = RefreshTokenRecord::issue(&user.id, &session_id, self.refresh_token_ttl);
        let root = self.create_record(root).await?;

        info!(user_id = %user.id, session_id = %session_id, "User logged in");

        Ok(TokenPair {
            access_token,
            refresh_token: root.token,
        })
    }

    /// Exchange a refresh token (and the access token issued with it) for a new pair.
    ///
    /// Checks run in order and stop at the first failure:
    /// 1. unknown refresh token: reject
    /// 2. access token fails to parse: reject
    /// 3. access token names another user or session: invalidate the record, reject
    /// 4. record already invalid (replay): invalidate the whole chain, reject
    /// 5. record expired: invalidate the record, reject
    /// 6. rotate; losing the rotation race is handled as step 4
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AppError> {
        let record = match self.store.find_by_value(refresh_token).await? {
            Some(record) => record,
            None => {
                warn!("Refresh rejected: unknown refresh token");
                return Err(AppError::unauthorized());
            }
        };

        let parsed = match self.encoder.parse(access_token) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(session_id = %record.session_id, error = %e, "Refresh rejected: unreadable access token");
                return Err(AppError::unauthorized());
            }
        };

        if !correlates(&parsed, &record) {
            warn!(
                session_id = %record.session_id,
                user_id = %record.user_id,
                "Refresh rejected: access token does not match refresh token, record invalidated"
            );
            self.store.invalidate(&record).await?;
            return Err(AppError::unauthorized());
        }

        if !record.is_valid {
            return self.revoke_on_replay(&record).await;
        }

        if record.is_expired() {
            info!(session_id = %record.session_id, "Refresh rejected: refresh token expired");
            self.store.invalidate(&record).await?;
            return Err(AppError::unauthorized());
        }

        let user = match self.identity.find_by_id(&record.user_id).await? {
            Some(user) => user,
            None => {
                warn!(user_id = %record.user_id, "Refresh rejected: user no longer exists");
                self.store.invalidate(&record).await?;
                return Err(AppError::unauthorized());
            }
        };

        let access_token = self.issue_access_token(&user, &record.session_id).await?;
        let successor = match self.rotate_record(&record).await? {
            Some(successor) => successor,
            None => return self.revoke_on_replay(&record).await,
        };

        info!(user_id = %user.id, session_id = %record.session_id, "Refresh token rotated");

        Ok(TokenPair {
            access_token,
            refresh_token: successor.token,
        })
    }

    /// Log out everywhere: invalidate the session chain of a valid, matching pair.
    ///
    /// Unknown, invalid, or mismatched pairs are ignored without error so the
    /// endpoint cannot be used to inspect token state.
    #[instrument(skip_all)]
    pub async fn revoke(&self, access_token: &str, refresh_token: &str) -> Result<(), AppError> {
        let Some(record) = self.store.find_by_value(refresh_token).await? else {
            debug!("Revoke ignored: unknown refresh token");
            return Ok(());
        };

        let Ok(parsed) = self.encoder.parse(access_token) else {
            debug!(session_id = %record.session_id, "Revoke ignored: unreadable access token");
            return Ok(());
        };

        if !correlates(&parsed, &record) || !record.is_valid {
            debug!(session_id = %record.session_id, "Revoke ignored: token pair not current");
            return Ok(());
        }

        let invalidated = self.store.invalidate_chain(&record.session_id).await?;
        info!(
            user_id = %record.user_id,
            session_id = %record.session_id,
            invalidated,
            "Session revoked"
        );
        Ok(())
    }

    /// Rotation history of a session, oldest first.
    pub async fn session_chain(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        Ok(self.store.find_by_session(session_id).await?)
    }

    async fn issue_access_token(
        &self,
        user: &User,
        session_id: &SessionId,
    ) -> Result<String, AppError> {
        let roles = self.identity.roles_of(user).await?;
        let token = self
            .encoder
            .issue(user, primary_role(&roles), session_id, self.access_token_ttl)?;
        Ok(token)
    }

    async fn revoke_on_replay(&self, record: &RefreshTokenRecord) -> Result<TokenPair, AppError> {
        let invalidated = self.store.invalidate_chain(&record.session_id).await?;
        warn!(
            user_id = %record.user_id,
            session_id = %record.session_id,
            invalidated,
            "Refresh token replay detected, session chain revoked"
        );
        Err(AppError::unauthorized())
    }

    /// Insert `record`, drawing a new value once if the first one collides.
    async fn create_record(
        &self,
        mut record: RefreshTokenRecord,
    ) -> Result<RefreshTokenRecord, AppError> {
        let created = self.store.create(&record).await;
        match created {
            Err(StoreError::Conflict) => {
                warn!(session_id = %record.session_id, "Refresh token value collision, regenerating");
                record.regenerate();
                self.store.create(&record).await?;
            }
            other => other?,
        }
        Ok(record)
    }

    /// Swap `presented` for a successor. `None` when another call rotated it first.
    async fn rotate_record(
        &self,
        presented: &RefreshTokenRecord,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let mut successor = presented.successor(self.refresh_token_ttl);

        let attempt = self.store.rotate(&presented.token, &successor).await;
        let rotation = match attempt {
            Err(StoreError::Conflict) => {
                warn!(session_id = %presented.session_id, "Refresh token value collision, regenerating");
                successor.regenerate();
                self.store.rotate(&presented.token, &successor).await?
            }
            other => other?,
        };

        Ok(match rotation {
            Rotation::Rotated => Some(successor),
            Rotation::Stale => None,
        })
    }
}

fn correlates(parsed: &ParsedToken, record: &RefreshTokenRecord) -> bool {
    parsed.user_id == record.user_id && parsed.session_id == record.session_id
}
