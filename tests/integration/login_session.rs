//! Integration tests for token login and session persistence.
//!
//! Exercises the full login flow (nonce → authorization URL → id token →
//! derived identity → saved session) and the session file lifecycle.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

use toad::chain::memory::InMemoryChain;
use toad::identity::{
    IdentityError, IdentitySource, LoginSession, SessionStore, authorization_url,
    derive_login_address, generate_nonce,
};
use toad::store::BoardStore;
use toad::sync::SyncSettings;
use toad_proto::contract::Contract;
use toad_proto::object::ObjectId;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn id_token(sub: &str, aud: &str) -> String {
    let payload = format!(r#"{{"iss":"https://accounts.google.com","sub":"{sub}","aud":"{aud}","email":"dev@example.com"}}"#);
    format!("eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload))
}

/// A session path in a fresh directory under the system temp dir.
fn temp_session_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("toad-test-{}", Uuid::now_v7()))
        .join("session.json")
}

// ===========================================================================
// Login flow
// ===========================================================================

#[test]
fn nonce_round_trips_through_authorization_url() {
    let nonce = generate_nonce();
    let url = authorization_url("client-42", "http://localhost:5173/auth/callback", &nonce).unwrap();

    let sent = url
        .query_pairs()
        .find(|(k, _)| k == "nonce")
        .map(|(_, v)| v.into_owned());
    assert_eq!(sent, Some(nonce));
    assert!(
        url.query_pairs()
            .any(|(k, v)| k == "redirect_uri" && v == "http://localhost:5173/auth/callback")
    );
}

#[test]
fn nonces_are_unique() {
    let a = generate_nonce();
    let b = generate_nonce();
    assert_ne!(a, b);
}

#[test]
fn derivation_is_deterministic_and_salted() {
    let jwt = id_token("1234567890", "client-42");

    let first = derive_login_address(&jwt, "salt-a").unwrap();
    let again = derive_login_address(&jwt, "salt-a").unwrap();
    let other_salt = derive_login_address(&jwt, "salt-b").unwrap();
    let other_user = derive_login_address(&id_token("999", "client-42"), "salt-a").unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other_salt);
    assert_ne!(first, other_user);
    assert_eq!(first.as_str().len(), 42);
    assert!(first.as_str().starts_with("0x"));
    assert!(first.as_str()[2..].bytes().all(|b| b.is_ascii_hexdigit()));
}

#[test]
fn completed_login_yields_token_identity() {
    let jwt = id_token("1234567890", "client-42");
    let session = LoginSession::complete(&jwt, "n0nce").unwrap();

    let identity = session.identity();
    assert_eq!(identity.source, IdentitySource::TokenLogin);
    assert_eq!(identity.address, derive_login_address(&jwt, "n0nce").unwrap());
    assert_eq!(session.salt, "n0nce");
}

#[test]
fn garbage_token_is_rejected() {
    assert!(matches!(
        LoginSession::complete("not-a-token", "n"),
        Err(IdentityError::MalformedToken(_))
    ));
    assert!(matches!(
        LoginSession::complete("a.!!!.c", "n"),
        Err(IdentityError::MalformedToken(_))
    ));
}

// ===========================================================================
// Session persistence
// ===========================================================================

#[test]
fn session_survives_save_and_load() {
    let store = SessionStore::new(temp_session_path());
    assert!(!store.is_active());

    let session = LoginSession::complete(&id_token("42", "client-42"), "salt").unwrap();
    store.save(&session).unwrap();

    assert!(store.is_active());
    assert_eq!(store.load(), Some(session));

    store.clear().unwrap();
    assert!(!store.is_active());
    // Clearing twice is fine.
    store.clear().unwrap();

    let _ = std::fs::remove_dir_all(store.path().parent().unwrap());
}

#[test]
fn corrupt_session_file_is_ignored() {
    let store = SessionStore::new(temp_session_path());
    let dir = store.path().parent().unwrap().to_path_buf();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(store.path(), "{ not json").unwrap();

    assert_eq!(store.load(), None);
    assert!(!store.is_active());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn session_identity_connects_to_the_store() {
    let session = LoginSession::complete(&id_token("42", "client-42"), "salt").unwrap();
    let contract = Contract::new(ObjectId::new("0xpkg"), ObjectId::new("0xreg"));
    let chain = Arc::new(InMemoryChain::new(contract.clone(), session.address.clone()));
    let board = chain.seed_board(&session.address, "Mine", &[], &[]);
    let store = BoardStore::new(
        chain,
        contract,
        SyncSettings {
            rpc_timeout: Duration::from_secs(1),
            ..SyncSettings::default()
        },
    );

    store.connect(session.identity()).await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.identity().map(|i| i.source), Some(IdentitySource::TokenLogin));
    assert_eq!(snap.boards().len(), 1);
    assert_eq!(snap.boards()[0].id, board);
}
