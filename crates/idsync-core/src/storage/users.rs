//! Repository for user profile database operations.
//!
//! Rows are keyed by the provider's identity id; the unique constraint on
//! `clerk_id` is both the lookup index and the conflict target for
//! upserts.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{ClerkId, NewUser, User, UserId},
};

/// Repository for user profile database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Finds a user by external identity id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails. A missing row is `Ok(None)`.
    pub async fn find_by_clerk_id(&self, clerk_id: &ClerkId) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, clerk_id, username, email, image_url, created_at, updated_at
            FROM users
            WHERE clerk_id = $1
            ",
        )
        .bind(clerk_id.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(user)
    }

    /// Inserts a new user record.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails, including a constraint violation
    /// when the identity id already exists.
    pub async fn create(&self, user: &NewUser) -> Result<UserId> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO users (clerk_id, username, email, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user.clerk_id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.image_url)
        .fetch_one(&*self.pool)
        .await?;

        Ok(UserId(id))
    }

    /// Inserts or updates a user record keyed by external identity id.
    ///
    /// Re-sent events for the same identity converge on a single row
    /// instead of accumulating duplicates.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub async fn upsert(&self, user: &NewUser) -> Result<UserId> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO users (clerk_id, username, email, image_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (clerk_id) DO UPDATE
            SET username = EXCLUDED.username,
                email = EXCLUDED.email,
                image_url = EXCLUDED.image_url,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user.clerk_id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.image_url)
        .fetch_one(&*self.pool)
        .await?;

        Ok(UserId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repository_can_be_created() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://test").unwrap();
        let _repo = Repository::new(Arc::new(pool));
    }
}
