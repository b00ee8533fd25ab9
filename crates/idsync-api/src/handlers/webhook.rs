//! Clerk webhook intake and dispatch.
//!
//! Accepts provider deliveries, verifies signatures, and routes on event
//! kind. Each request is handled single-shot: verify, dispatch, respond.
//! Nothing is persisted across calls, and the store is never touched for
//! a delivery that fails verification.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use idsync_core::{ClerkEvent, CoreError, UserPayload, UserStore as _};
use tracing::{error, info, instrument, warn};

use crate::{server::AppState, verify::SignatureVerifier as _};

/// Response body for deliveries that fail verification.
pub const VALIDATION_FAILED_BODY: &str = "Could not Validate Clerk Payload";

/// Maximum accepted delivery size. Provider events are a few KB; anything
/// near this limit is garbage.
const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Ingests one Clerk webhook delivery.
///
/// The body is taken as raw bytes: the signature was computed over the
/// exact payload, so it must not be re-serialized before verification.
///
/// Responses:
/// - `400` with a short diagnostic body when verification fails
/// - `500` when a store operation fails, so the provider retries
/// - `200` with empty body for every verified delivery, including
///   unsupported kinds
#[instrument(
    name = "clerk_webhook",
    skip(state, headers, body),
    fields(
        svix_id = headers.get("svix-id").and_then(|v| v.to_str().ok()).unwrap_or("none"),
        payload_size = body.len(),
    )
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > MAX_PAYLOAD_SIZE {
        warn!(limit = MAX_PAYLOAD_SIZE, "Delivery exceeds size limit");
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let event = match state.verifier.verify(&body, &headers) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Clerk webhook could not be verified");
            return (StatusCode::BAD_REQUEST, VALIDATION_FAILED_BODY).into_response();
        },
    };

    info!(kind = event.kind(), "Verified Clerk delivery");

    match event {
        ClerkEvent::UserCreated(user) => handle_user_created(&state, &user).await,
        ClerkEvent::UserUpdated(user) => handle_user_updated(&state, &user).await,
        ClerkEvent::Unsupported(kind) => {
            info!(kind = %kind, "Clerk webhook event not supported");
            StatusCode::OK.into_response()
        },
    }
}

/// Handles `user.created`: lookup and log only.
///
/// Profile data converges when the provider sends the follow-up
/// `user.updated` event, so creation itself does not write.
async fn handle_user_created(state: &AppState, user: &UserPayload) -> Response {
    let clerk_id = user.clerk_id();

    match state.users.find_by_clerk_id(&clerk_id).await {
        Ok(Some(_)) => {
            info!(%clerk_id, "User already exists, update would occur");
        },
        Ok(None) => {
            info!(%clerk_id, "User not found, creation would occur");
        },
        Err(e) => {
            error!(%clerk_id, error = %e, "User lookup failed");
            return store_error_response(&e);
        },
    }

    StatusCode::OK.into_response()
}

/// Handles `user.updated`: upsert the profile keyed by identity id.
async fn handle_user_updated(state: &AppState, user: &UserPayload) -> Response {
    let Some(profile) = user.profile() else {
        // Verified but incomplete; retries would carry the same payload,
        // so this is soft-ignored rather than failed
        warn!(clerk_id = %user.id, "Delivery carries no usable profile, skipping");
        return StatusCode::OK.into_response();
    };

    match state.users.upsert(&profile).await {
        Ok(user_id) => {
            info!(%user_id, clerk_id = %profile.clerk_id, "User profile synchronized");
            StatusCode::OK.into_response()
        },
        Err(e) => {
            error!(clerk_id = %profile.clerk_id, error = %e, "User profile write failed");
            store_error_response(&e)
        },
    }
}

/// Maps a store failure to a server-error response.
///
/// Returning success for a failed write would make the provider consider
/// the event delivered and never retry it.
fn store_error_response(error: &CoreError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}
