/// Refresh token persistence
///
/// The store is the only shared mutable state of the service. Each operation is
/// individually atomic; `rotate` is the compare-and-swap primitive that lets
/// concurrent refreshes of one token agree on a single winner.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::auth::{RefreshTokenRecord, SessionId};
use crate::error::StoreError;

pub use memory::InMemoryRefreshTokenStore;
pub use postgres::PgRefreshTokenStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of [`RefreshTokenStore::rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Presented record flipped to invalid and successor inserted.
    Rotated,
    /// Presented record was already invalid (or gone); nothing was written.
    Stale,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_value(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Every record of a rotation chain, oldest first.
    async fn find_by_session(&self, session_id: &SessionId) -> StoreResult<Vec<RefreshTokenRecord>>;

    /// Insert a new record.
    ///
    /// # Errors
    /// `StoreError::Conflict` if the token value already exists.
    async fn create(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    /// Mark one record invalid. Idempotent.
    async fn invalidate(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    /// Mark every record sharing `session_id` invalid, returning how many changed.
    ///
    /// Serialized against `rotate` on the same session: a successor inserted by a
    /// concurrent rotation is either visible here and invalidated, or never inserted.
    async fn invalidate_chain(&self, session_id: &SessionId) -> StoreResult<u64>;

    /// Atomically invalidate `presented` if it is still valid and insert `successor`.
    ///
    /// # Errors
    /// `StoreError::Conflict` if the successor's value already exists; the
    /// presented record is left untouched in that case.
    async fn rotate(&self, presented: &str, successor: &RefreshTokenRecord) -> StoreResult<Rotation>;
}
