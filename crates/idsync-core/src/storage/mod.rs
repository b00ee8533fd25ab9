//! Database access layer for user synchronization.
//!
//! The repository layer translates between domain models and the database
//! schema. All database operations go through these repositories; the
//! webhook handlers never issue SQL directly.
//!
//! The [`UserStore`] trait is the seam the HTTP layer depends on. The
//! production implementation is [`Storage`] over PostgreSQL; tests provide
//! in-memory implementations for deterministic behavior validation without
//! a database. These accessors are internal: only the webhook dispatcher,
//! itself gated by signature verification, invokes them.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

pub mod users;

use crate::{
    error::Result,
    models::{ClerkId, NewUser, User, UserId},
};

/// Store operations required by the webhook dispatcher.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fetches a user record by external identity id.
    ///
    /// Absence is a normal outcome, not an error.
    async fn find_by_clerk_id(&self, clerk_id: &ClerkId) -> Result<Option<User>>;

    /// Inserts a new user record, returning once durably written.
    ///
    /// # Errors
    ///
    /// Constraint violations (duplicate identity id) propagate as write
    /// failures.
    async fn create(&self, user: &NewUser) -> Result<UserId>;

    /// Inserts or updates a user record keyed by external identity id.
    async fn upsert(&self, user: &NewUser) -> Result<UserId>;

    /// Verifies the store is reachable. Used by readiness probes.
    async fn health_check(&self) -> Result<()>;
}

/// Container for repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for user profile operations.
    pub users: Arc<users::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self { users: Arc::new(users::Repository::new(pool)) }
    }
}

#[async_trait]
impl UserStore for Storage {
    async fn find_by_clerk_id(&self, clerk_id: &ClerkId) -> Result<Option<User>> {
        self.users.find_by_clerk_id(clerk_id).await
    }

    async fn create(&self, user: &NewUser) -> Result<UserId> {
        self.users.create(user).await
    }

    async fn upsert(&self, user: &NewUser) -> Result<UserId> {
        self.users.upsert(user).await
    }

    async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.users.pool()).await?;

        Ok(())
    }
}
