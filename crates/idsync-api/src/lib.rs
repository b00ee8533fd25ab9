//! Idsync HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;
pub mod verify;

pub use config::Config;
pub use server::{AppState, create_router, start_server};
pub use verify::{SignatureVerifier, SvixVerifier, VerificationError};
