//! Scenario tests for the keyring password scheme.
//!
//! The process-default credential store is replaced with keyring's mock
//! store so no test ever touches a real keychain. Mock entries start empty
//! and the scheme constructs its own entry per lookup, so these tests cover
//! the failure surface; lookup hits need a real store.

use mailout_core::{PasswordContext, resolve_password};
use serde_json::json;
use std::sync::Once;

static INSTALL_MOCK: Once = Once::new();

fn with_mock_keyring() {
    INSTALL_MOCK.call_once(|| {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    });
}

#[test]
fn test_missing_entry_names_service_and_username() {
    with_mock_keyring();
    let err = resolve_password(
        &json!({"keyring": {"service": "imap.example.com", "username": "alice"}}),
        PasswordContext::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid password configuration: Could not find password for service \
         'imap.example.com', username 'alice' in keyring"
    );
}

#[test]
fn test_service_and_username_default_to_the_context() {
    with_mock_keyring();
    let context = PasswordContext {
        host: Some("mx.example.com"),
        username: Some("bob"),
        configpath: None,
    };
    let err = resolve_password(&json!({"keyring": {}}), context).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid password configuration: Could not find password for service \
         'mx.example.com', username 'bob' in keyring"
    );
}

#[test]
fn test_missing_service_is_rejected() {
    with_mock_keyring();
    let err = resolve_password(
        &json!({"keyring": {"username": "alice"}}),
        PasswordContext::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid password configuration: no service specified for keyring lookup"
    );
}

#[test]
fn test_missing_username_is_rejected() {
    with_mock_keyring();
    let err = resolve_password(
        &json!({"keyring": {"service": "imap.example.com"}}),
        PasswordContext::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid password configuration: no username specified for keyring lookup"
    );
}

#[test]
fn test_non_object_specifier_is_rejected() {
    with_mock_keyring();
    let err = resolve_password(
        &json!({"keyring": "imap.example.com"}),
        PasswordContext::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid password configuration: 'keyring' password specifier must be an object"
    );
}
