use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RefreshTokenStore, Rotation, StoreResult};
use crate::auth::{hash_token, RefreshTokenRecord, SessionId};

type RecordRow = (String, String, String, DateTime<Utc>, DateTime<Utc>, bool);

/// Postgres-backed store over the `refresh_tokens` table.
///
/// Rows are keyed by the SHA-256 digest of the token value. Records loaded by
/// value carry the presented plaintext; records loaded by session carry the
/// digest in `token`, since the plaintext is never persisted.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Take the per-session advisory lock, held until `tx` ends.
///
/// Chain invalidation and rotation of one session run one at a time, so each
/// statement after the lock sees every successor committed before it.
async fn lock_session(
    tx: &mut Transaction<'_, Postgres>,
    session_id: &SessionId,
) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
        .bind(session_id.as_str())
        .execute(&mut *tx)
        .await?;
    Ok(())
}

fn into_record(row: RecordRow, token: String) -> RefreshTokenRecord {
    let (_, user_id, session_id, expires_at, created_at, is_valid) = row;
    RefreshTokenRecord {
        token,
        user_id,
        session_id: SessionId::from(session_id),
        expires_at,
        created_at,
        is_valid,
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn find_by_value(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT token_hash, user_id, session_id, expires_at, created_at, is_valid
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| into_record(row, token.to_string())))
    }

    async fn find_by_session(&self, session_id: &SessionId) -> StoreResult<Vec<RefreshTokenRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT token_hash, user_id, session_id, expires_at, created_at, is_valid
            FROM refresh_tokens
            WHERE session_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let digest = row.0.clone();
                into_record(row, digest)
            })
            .collect())
    }

    async fn create(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, token_hash, user_id, session_id, expires_at, created_at, is_valid)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(&record.token))
        .bind(&record.user_id)
        .bind(record.session_id.as_str())
        .bind(record.expires_at)
        .bind(record.created_at)
        .bind(record.is_valid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_valid = false, invalidated_at = COALESCE(invalidated_at, $1)
            WHERE token_hash = $2
            "#,
        )
        .bind(Utc::now())
        .bind(hash_token(&record.token))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate_chain(&self, session_id: &SessionId) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        lock_session(&mut tx, session_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_valid = false, invalidated_at = $1
            WHERE session_id = $2 AND is_valid = true
            "#,
        )
        .bind(Utc::now())
        .bind(session_id.as_str())
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            invalidated = result.rows_affected(),
            "Refresh token chain invalidated"
        );
        Ok(result.rows_affected())
    }

    async fn rotate(&self, presented: &str, successor: &RefreshTokenRecord) -> StoreResult<Rotation> {
        let mut tx = self.pool.begin().await?;
        lock_session(&mut tx, &successor.session_id).await?;

        let flipped = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_valid = false, invalidated_at = $1
            WHERE token_hash = $2 AND is_valid = true
            "#,
        )
        .bind(Utc::now())
        .bind(hash_token(presented))
        .execute(&mut tx)
        .await?;

        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(Rotation::Stale);
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, token_hash, user_id, session_id, expires_at, created_at, is_valid)
            VALUES ($1, $2, $3, $4, $5, $6, true)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(&successor.token))
        .bind(&successor.user_id)
        .bind(successor.session_id.as_str())
        .bind(successor.expires_at)
        .bind(successor.created_at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(Rotation::Rotated)
    }
}
