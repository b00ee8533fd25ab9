//! Core domain models for identity webhook synchronization.
//!
//! Provides the typed event union for provider deliveries, strongly-typed
//! identifiers, the error taxonomy, and the user storage layer. The API
//! crate depends on these foundational types for type safety and
//! consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod models;
pub mod storage;

pub use error::{CoreError, Result};
pub use event::{ClerkEvent, EmailAddress, UserPayload};
pub use models::{ClerkId, NewUser, User, UserId};
pub use storage::{Storage, UserStore};
