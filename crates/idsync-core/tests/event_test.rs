//! Tests for provider event parsing and kind dispatch.
//!
//! Exercises the closed tagged union over delivery payloads: handled
//! kinds, the explicit default arm, and the field mapping from provider
//! attributes to the stored write model.

use idsync_core::{ClerkEvent, ClerkId};

#[test]
fn user_created_parses_to_typed_event() {
    let payload = br#"{
        "type": "user.created",
        "data": {
            "id": "user_29w",
            "first_name": "Ann",
            "last_name": "Lee",
            "image_url": "http://img/u1",
            "email_addresses": [{"email_address": "ann@x.com"}]
        }
    }"#;

    let event = ClerkEvent::parse(payload).unwrap();

    match event {
        ClerkEvent::UserCreated(user) => {
            assert_eq!(user.id, "user_29w");
            assert_eq!(user.clerk_id(), ClerkId::new("user_29w"));
            assert_eq!(user.display_name(), "Ann Lee");
            assert_eq!(user.primary_email(), Some("ann@x.com"));
        },
        other => panic!("expected user.created, got {other:?}"),
    }
}

#[test]
fn user_updated_maps_to_write_model() {
    let payload = br#"{
        "type": "user.updated",
        "data": {
            "id": "u1",
            "first_name": "Ann",
            "last_name": "Lee",
            "image_url": "http://img/u1",
            "email_addresses": [
                {"email_address": "ann@x.com"},
                {"email_address": "backup@x.com"}
            ]
        }
    }"#;

    let ClerkEvent::UserUpdated(user) = ClerkEvent::parse(payload).unwrap() else {
        panic!("expected user.updated");
    };

    let profile = user.profile().expect("payload carries a full profile");
    assert_eq!(profile.clerk_id, ClerkId::new("u1"));
    assert_eq!(profile.username, "Ann Lee");
    assert_eq!(profile.email, "ann@x.com");
    assert_eq!(profile.image_url, "http://img/u1");
}

#[test]
fn unknown_kind_falls_to_default_arm() {
    let payload = br#"{"type": "session.created", "data": {"id": "sess_1"}}"#;

    let event = ClerkEvent::parse(payload).unwrap();

    assert_eq!(event, ClerkEvent::Unsupported("session.created".to_string()));
    assert_eq!(event.kind(), "session.created");
}

#[test]
fn handled_kind_with_malformed_data_is_an_error() {
    // `data` must be an object for handled kinds
    let payload = br#"{"type": "user.updated", "data": 42}"#;

    assert!(ClerkEvent::parse(payload).is_err());
}

#[test]
fn invalid_json_is_an_error() {
    assert!(ClerkEvent::parse(b"not json").is_err());
}

#[test]
fn missing_optional_fields_default() {
    let payload = br#"{
        "type": "user.created",
        "data": {"id": "user_30x"}
    }"#;

    let ClerkEvent::UserCreated(user) = ClerkEvent::parse(payload).unwrap() else {
        panic!("expected user.created");
    };

    assert_eq!(user.display_name(), "");
    assert_eq!(user.primary_email(), None);
    assert!(user.profile().is_none());
}
