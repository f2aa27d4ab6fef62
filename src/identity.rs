/// Identity provider capability
///
/// Users, credentials and role assignments belong to an external identity
/// provider. The token service only needs to resolve a user, check a password
/// and list roles.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::auth::{hash_password, verify_password};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Case-insensitive username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn verify_credential(&self, user: &User, password: &str) -> Result<bool, AppError>;

    /// Do the bcrypt work of one `verify_credential` call without a user.
    ///
    /// Login calls this when no user matched, so an unknown username takes as
    /// long to reject as a wrong password.
    async fn spend_credential_check(&self, password: &str) -> Result<(), AppError>;

    async fn roles_of(&self, user: &User) -> Result<BTreeSet<String>, AppError>;
}

/// The role carried in the access token: the first assigned role in sorted order.
pub fn primary_role(roles: &BTreeSet<String>) -> Option<&str> {
    roles.iter().next().map(String::as_str)
}

struct StoredUser {
    user: User,
    password_hash: String,
    roles: BTreeSet<String>,
}

/// Fixed user table for tests and local development.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    users: RwLock<HashMap<String, StoredUser>>,
    bcrypt_cost: Option<u32>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash seeded passwords at `cost` instead of bcrypt's default.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = Some(cost);
        self
    }

    pub fn with_user<I, S>(
        mut self,
        id: &str,
        username: &str,
        password: &str,
        roles: I,
    ) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stored = StoredUser {
            user: User {
                id: id.to_string(),
                username: username.to_string(),
            },
            password_hash: hash_password(password, self.bcrypt_cost)?,
            roles: roles.into_iter().map(Into::into).collect(),
        };
        self.users.get_mut().insert(id.to_string(), stored);
        Ok(self)
    }

    /// Drop a user, as the identity provider would on account deletion.
    pub fn remove_user(&self, user_id: &str) {
        self.users.write().remove(user_id);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|stored| stored.user.username.eq_ignore_ascii_case(username))
            .map(|stored| stored.user.clone()))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().get(user_id).map(|stored| stored.user.clone()))
    }

    async fn verify_credential(&self, user: &User, password: &str) -> Result<bool, AppError> {
        let hash = self
            .users
            .read()
            .get(&user.id)
            .map(|stored| stored.password_hash.clone());

        match hash {
            Some(hash) => verify_password(password, &hash),
            None => Ok(false),
        }
    }

    async fn spend_credential_check(&self, password: &str) -> Result<(), AppError> {
        hash_password(password, self.bcrypt_cost).map(|_| ())
    }

    async fn roles_of(&self, user: &User) -> Result<BTreeSet<String>, AppError> {
        Ok(self
            .users
            .read()
            .get(&user.id)
            .map(|stored| stored.roles.clone())
            .unwrap_or_default())
    }
}

/// Reads the identity provider's `users` and `user_roles` tables.
#[derive(Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
    bcrypt_cost: Option<u32>,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bcrypt_cost: None,
        }
    }

    /// Cost the stored hashes were made with, when not bcrypt's default.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = Some(cost);
        self
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, username FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username)| User { id, username }))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, username FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username)| User { id, username }))
    }

    async fn verify_credential(&self, user: &User, password: &str) -> Result<bool, AppError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(&user.id)
            .fetch_optional(&self.pool)
            .await?;

        match hash {
            Some(hash) => verify_password(password, &hash),
            None => Ok(false),
        }
    }

    async fn spend_credential_check(&self, password: &str) -> Result<(), AppError> {
        hash_password(password, self.bcrypt_cost).map(|_| ())
    }

    async fn roles_of(&self, user: &User) -> Result<BTreeSet<String>, AppError> {
        let roles = sqlx::query_scalar::<_, String>("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(&user.id)
            .fetch_all(&self.pool)
            .await?;

        Ok(roles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::new()
            .with_bcrypt_cost(4)
            .with_user("u1", "Owner@Villa.com", "SecurePass123", ["customer", "admin"])
            .unwrap()
    }

    #[tokio::test]
    async fn username_lookup_is_case_insensitive() {
        let provider = provider();
        let user = provider.find_by_username("owner@villa.com").await.unwrap();

        assert_eq!(user.map(|u| u.id), Some("u1".to_string()));
        assert!(provider.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verifies_credentials() {
        let provider = provider();
        let user = provider.find_by_id("u1").await.unwrap().unwrap();

        assert!(provider.verify_credential(&user, "SecurePass123").await.unwrap());
        assert!(!provider.verify_credential(&user, "WrongPass123").await.unwrap());
    }

    #[tokio::test]
    async fn credential_check_without_user_costs_a_bcrypt_round() {
        let provider = InMemoryIdentityProvider::new().with_bcrypt_cost(10);
        let started = std::time::Instant::now();

        provider.spend_credential_check("WrongPass123").await.unwrap();

        // Cost 10 takes tens of milliseconds; a plain map miss takes microseconds
        assert!(started.elapsed() >= std::time::Duration::from_millis(5));
    }

    #[tokio::test]
    async fn primary_role_is_first_sorted() {
        let provider = provider();
        let user = provider.find_by_id("u1").await.unwrap().unwrap();
        let roles = provider.roles_of(&user).await.unwrap();

        assert_eq!(primary_role(&roles), Some("admin"));
        assert_eq!(primary_role(&BTreeSet::new()), None);
    }
}
