//! Typed model for inbound identity-provider events.
//!
//! Clerk delivers events as a JSON envelope of `{"type": ..., "data": ...}`.
//! The open-ended provider event space is modeled as a closed tagged union
//! with an explicit default arm, so unsupported kinds are a visible case in
//! every match rather than a stringly-typed fallthrough.

use serde::Deserialize;

use crate::models::{ClerkId, NewUser};

/// Raw delivery envelope before kind dispatch.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// One email address entry from the provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailAddress {
    /// The address itself.
    pub email_address: String,
}

/// User attributes carried by `user.created` and `user.updated` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserPayload {
    /// Provider-issued identity id.
    pub id: String,

    /// Given name, when the provider has one.
    #[serde(default)]
    pub first_name: Option<String>,

    /// Family name, when the provider has one.
    #[serde(default)]
    pub last_name: Option<String>,

    /// Avatar URL.
    #[serde(default)]
    pub image_url: String,

    /// Email addresses in provider order; the first entry is primary.
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
}

impl UserPayload {
    /// Display name composed from first and last name.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Primary email address, taken from the first entry of the address
    /// list.
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses.first().map(|e| e.email_address.as_str())
    }

    /// The identity id as a typed key.
    pub fn clerk_id(&self) -> ClerkId {
        ClerkId::new(self.id.clone())
    }

    /// Builds the write model for this payload.
    ///
    /// Returns `None` when the payload cannot produce a well-formed record
    /// (empty identity id, or no email address to take as primary).
    pub fn profile(&self) -> Option<NewUser> {
        if self.id.is_empty() {
            return None;
        }
        let email = self.primary_email().filter(|e| !e.is_empty())?;

        Some(NewUser {
            clerk_id: self.clerk_id(),
            username: self.display_name(),
            email: email.to_string(),
            image_url: self.image_url.clone(),
        })
    }
}

/// A validated provider event, dispatched by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClerkEvent {
    /// A user was created on the provider side.
    UserCreated(UserPayload),

    /// A user was updated on the provider side.
    UserUpdated(UserPayload),

    /// Any recognized-but-unhandled event kind; carries the kind string
    /// for diagnostics.
    Unsupported(String),
}

impl ClerkEvent {
    /// Parses a raw delivery payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error when the envelope is not valid JSON
    /// or a handled kind carries a malformed `data` object. Unknown kinds
    /// are not an error; they parse to [`ClerkEvent::Unsupported`].
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(payload)?;

        Ok(match envelope.kind.as_str() {
            "user.created" => Self::UserCreated(serde_json::from_value(envelope.data)?),
            "user.updated" => Self::UserUpdated(serde_json::from_value(envelope.data)?),
            _ => Self::Unsupported(envelope.kind),
        })
    }

    /// The provider's event kind string.
    pub fn kind(&self) -> &str {
        match self {
            Self::UserCreated(_) => "user.created",
            Self::UserUpdated(_) => "user.updated",
            Self::Unsupported(kind) => kind,
        }
    }
}
