//! Integration tests for identity and session types.

use chrono::{DateTime, Duration};
use portico_core::{CredentialIdentity, Session};

#[test]
fn test_session_key_is_stable_across_clones() {
    let id = CredentialIdentity::new("alice", "pw", "https://portal.example.com").unwrap();
    assert_eq!(id.session_key(), id.clone().session_key());
}

#[test]
fn test_session_serialization_roundtrip_keeps_expiry() {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let session = Session::new("JSESSIONID=a; tenant=t", "alice", now);

    let json = serde_json::to_string(&session).unwrap();
    let parsed: Session = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, session);
    assert!(parsed.is_expired(now + Duration::minutes(30), Duration::minutes(30)));
}
