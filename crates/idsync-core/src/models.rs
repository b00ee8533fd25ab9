//! Domain models and strongly-typed identifiers.
//!
//! Defines the stored user record, its write model, and newtype ID
//! wrappers for compile-time type safety. The external identity id is the
//! sole correlation key between inbound provider events and stored rows,
//! so it gets its own type rather than passing bare strings around.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed surrogate identifier for a stored user row.
///
/// Wraps a UUID to prevent mixing with other ID types. This id is local to
/// the store; correlation with the identity provider always goes through
/// [`ClerkId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for UserId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for UserId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for UserId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// External identity id issued by the identity provider.
///
/// Never generated locally. Uniqueness is enforced by the store, and every
/// inbound event correlates with stored data through this key alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClerkId(pub String);

impl ClerkId {
    /// Wraps a provider-issued identity id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClerkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClerkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClerkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl sqlx::Type<PgDb> for ClerkId {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for ClerkId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <String as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for ClerkId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// A stored user profile, synchronized from provider events.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Surrogate primary key.
    pub id: UserId,

    /// External identity id (unique).
    pub clerk_id: ClerkId,

    /// Display name, composed from the provider's first and last name.
    pub username: String,

    /// Primary email address.
    pub email: String,

    /// Avatar URL.
    pub image_url: String,

    /// When this row was first written.
    pub created_at: DateTime<Utc>,

    /// When this row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Write model for creating or updating a user profile.
///
/// Carries the four synchronized attributes; timestamps and the surrogate
/// key are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// External identity id (unique key).
    pub clerk_id: ClerkId,

    /// Display name.
    pub username: String,

    /// Primary email address.
    pub email: String,

    /// Avatar URL.
    pub image_url: String,
}
