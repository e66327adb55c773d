//! End-to-end portal flows against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use portico_core::{Attachment, CredentialIdentity};
use portico_fetch::{
    BreakerConfig, CircuitState, FetchContext, FetchError, FetchSettings, HttpMethod, ManualClock,
    PortalResponse, RetryConfig, ScriptedTransport,
};
use portico_providers::portal::{PortalChat, PortalProfile, SessionEmulator};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

const LOGIN: &str = "/wise/wiseadm/s/login";
const PORTAL: &str = "/wise/wiseadm/s/portal";
const FORM: &str = "/wise/wiseadm/s/portal/form";
const UPLOAD: &str = "/portal/form/upload";
const SUBMIT: &str = "/portal/form/submit";
const EXECUTE: &str = "/api/form/execute";
const RUN: &str = "/api/v1/forms/";

fn identity() -> CredentialIdentity {
    CredentialIdentity::new("alice", "secret", "https://ai.example.com").unwrap()
}

fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig::new(attempts)
        .with_base_delay(Duration::ZERO)
        .with_jitter(Duration::ZERO)
}

fn context(transport: &Arc<ScriptedTransport>, clock: &Arc<ManualClock>) -> FetchContext {
    let settings = FetchSettings::default()
        .with_retry(fast_retry(1))
        .with_breaker(BreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(30),
        });
    FetchContext::builder()
        .http(transport.clone())
        .clock(clock.clone())
        .settings(settings)
        .build()
        .unwrap()
}

fn profile() -> PortalProfile {
    PortalProfile {
        candidate_attempts: 1,
        ..PortalProfile::default()
    }
}

fn login_page() -> PortalResponse {
    PortalResponse::new(200)
        .with_header("set-cookie", "AWSALB=lb1; Path=/; Expires=Wed, 01 Jan 2031 00:00:00 GMT")
        .with_header("set-cookie", "tracking=t1; Path=/")
        .with_body(r#"<form class="login-form"><input name="loginName"><input name="intumitPswd"></form>"#)
}

fn login_redirect() -> PortalResponse {
    PortalResponse::new(302)
        .with_header("location", "https://ai.example.com/wise/wiseadm/s/portal")
        .with_header("set-cookie", "JSESSIONID=sess1; Path=/wise; HttpOnly")
}

fn portal_page() -> PortalResponse {
    PortalResponse::new(200).with_body(r#"<div class="portal-container"><a href="/logout">Logout</a></div>"#)
}

fn form_page() -> PortalResponse {
    PortalResponse::new(200)
        .with_header("set-cookie", "XSRF-TOKEN=x1; Path=/")
        .with_body(r#"<form><input type="hidden" name="_token" value="csrf-1"><div data-api-key="key-1"></div></form>"#)
}

/// Login, access check and form page all succeed.
fn scripted_portal() -> Arc<ScriptedTransport> {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, login_redirect())
        .on_get(PORTAL, portal_page())
        .on_get(FORM, form_page());
    transport
}

// ============================================================================
// Session Emulator
// ============================================================================

#[tokio::test]
async fn test_login_within_ttl_posts_once() {
    let transport = scripted_portal();
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);
    let emulator = SessionEmulator::new(profile());

    let first = emulator.login(&ctx, &identity()).await.unwrap();
    clock.advance(Duration::from_secs(29 * 60));
    let second = emulator.login(&ctx, &identity()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 1);
    assert_eq!(
        first.cookie_header,
        "JSESSIONID=sess1; AWSALB=lb1; tenantUuid=default"
    );
}

#[tokio::test]
async fn test_login_again_after_ttl() {
    let transport = scripted_portal();
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);
    let emulator = SessionEmulator::new(profile());

    emulator.login(&ctx, &identity()).await.unwrap();
    clock.advance(Duration::from_secs(30 * 60));
    emulator.login(&ctx, &identity()).await.unwrap();

    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 2);
}

#[tokio::test]
async fn test_login_posts_credentials_with_pre_auth_cookies() {
    let transport = scripted_portal();
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);

    SessionEmulator::new(profile())
        .login(&ctx, &identity())
        .await
        .unwrap();

    let post = transport
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post)
        .unwrap();
    assert_eq!(post.body.form_field("loginName"), Some("alice"));
    assert_eq!(post.body.form_field("intumitPswd"), Some("secret"));
    assert_eq!(post.body.form_field("selectedLocale"), Some("zh_TW"));
    assert_eq!(post.body.form_field("keepUser"), Some("false"));
    assert_eq!(
        post.header_value("cookie"),
        Some("AWSALB=lb1; tracking=t1; tenantUuid=default")
    );
}

#[tokio::test]
async fn test_redirect_to_login_is_authentication_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_get(LOGIN, login_page()).on_post(
        LOGIN,
        PortalResponse::new(302).with_header("location", "/wise/wiseadm/s/login?error=true"),
    );
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);

    let err = SessionEmulator::new(profile())
        .login(&ctx, &identity())
        .await
        .unwrap_err();

    assert!(err.is_authentication());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_200_with_markers_and_cookie_succeeds() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_get(LOGIN, login_page()).on_post(
        LOGIN,
        PortalResponse::new(200)
            .with_header("set-cookie", "JSESSIONID=sess2; Path=/")
            .with_body("<a href=\"/logout\">登出</a>"),
    );
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);

    let session = SessionEmulator::new(profile())
        .login(&ctx, &identity())
        .await
        .unwrap();
    assert_eq!(session.cookie("JSESSIONID"), Some("sess2"));
}

#[tokio::test]
async fn test_200_without_markers_is_authentication_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, login_page());
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);

    let err = SessionEmulator::new(profile())
        .login(&ctx, &identity())
        .await
        .unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_missing_session_cookie_is_authentication_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_get(LOGIN, login_page()).on_post(
        LOGIN,
        PortalResponse::new(302).with_header("location", "/wise/wiseadm/s/portal"),
    );
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);

    let err = SessionEmulator::new(profile())
        .login(&ctx, &identity())
        .await
        .unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_login_breaker_opens_and_skips_network() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, PortalResponse::new(503));
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);
    let emulator = SessionEmulator::new(profile());

    for _ in 0..2 {
        let err = emulator.login(&ctx, &identity()).await.unwrap_err();
        assert!(err.is_retryable());
    }
    let err = emulator.login(&ctx, &identity()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 2);
    assert_eq!(transport.count(HttpMethod::Get, LOGIN), 2);

    clock.advance(Duration::from_secs(30));
    let err = emulator.login(&ctx, &identity()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 3);
}

#[tokio::test]
async fn test_concurrent_logins_share_one_post() {
    let transport = scripted_portal();
    let clock = Arc::new(ManualClock::default());
    let ctx = context(&transport, &clock);
    let emulator = SessionEmulator::new(profile());
    let id = identity();

    let (a, b) = tokio::join!(emulator.login(&ctx, &id), emulator.login(&ctx, &id));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 1);
}

// ============================================================================
// Chat
// ============================================================================

fn chat(transport: &Arc<ScriptedTransport>) -> PortalChat {
    let clock = Arc::new(ManualClock::default());
    PortalChat::new(Arc::new(context(transport, &clock)), profile())
}

#[tokio::test]
async fn test_send_chat_first_candidate() {
    let transport = scripted_portal();
    transport.on_post(
        UPLOAD,
        PortalResponse::new(200).with_json(&json!({"completion": " Hello back "})),
    );
    let chat = chat(&transport);
    let file = Attachment::new("notes.txt", "text/plain", b"abc".to_vec());

    let reply = chat
        .send_chat("Hello", &identity(), "42", Some(&file))
        .await
        .unwrap();

    assert_eq!(reply.reply, "Hello back");
    assert_eq!(reply.model_label, "Portal");

    let upload = transport
        .requests()
        .into_iter()
        .find(|r| r.url.contains(UPLOAD))
        .unwrap();
    assert!(upload.url.ends_with("/wise/wiseadm/s/portal/form/upload?id=42"));
    assert_eq!(
        upload.header_value("cookie"),
        Some("JSESSIONID=sess1; AWSALB=lb1; tenantUuid=default; XSRF-TOKEN=x1")
    );
    assert_eq!(upload.header_value("X-CSRF-TOKEN"), Some("csrf-1"));
    assert_eq!(upload.header_value("X-API-KEY"), Some("key-1"));
    assert_eq!(upload.body.form_field("_token"), Some("csrf-1"));
    assert_eq!(upload.body.form_field("file"), Some("data:text/plain;base64,YWJj"));
}

#[tokio::test]
async fn test_only_third_candidate_answers() {
    let transport = scripted_portal();
    transport
        .on_post(UPLOAD, PortalResponse::new(404))
        .on_post(
            SUBMIT,
            PortalResponse::new(200)
                .with_header("content-type", "text/html")
                .with_body("<html>login</html>"),
        )
        .on_post(
            EXECUTE,
            PortalResponse::new(200).with_json(&json!({"data": {"answer": "third"}})),
        )
        .on_post(RUN, PortalResponse::new(200).with_json(&json!({"output": "fourth"})));
    let chat = chat(&transport);

    let reply = chat.send_chat("Hi", &identity(), "42", None).await.unwrap();

    assert_eq!(reply.reply, "third");
    let candidate_posts = [UPLOAD, SUBMIT, EXECUTE, RUN]
        .iter()
        .map(|path| transport.count(HttpMethod::Post, path))
        .collect::<Vec<_>>();
    assert_eq!(candidate_posts, vec![1, 1, 1, 0]);
}

#[tokio::test]
async fn test_all_candidates_fail() {
    let transport = scripted_portal();
    transport
        .on_post(UPLOAD, PortalResponse::new(500))
        .on_post(SUBMIT, PortalResponse::new(404))
        .on_post(EXECUTE, PortalResponse::new(200).with_json(&json!({"status": "ok"})))
        .on_post(RUN, PortalResponse::new(403));
    let chat = chat(&transport);

    let err = chat.send_chat("Hi", &identity(), "42", None).await.unwrap_err();

    match err {
        FetchError::AiService { attempts, last_cause } => {
            assert_eq!(attempts, 4);
            assert!(last_cause.contains("HTTP 403"));
        }
        other => panic!("expected AiService, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_session_triggers_one_relogin() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, login_redirect())
        .on_get(PORTAL, PortalResponse::new(302).with_header("location", LOGIN))
        .on_get(PORTAL, portal_page())
        .on_get(FORM, form_page())
        .on_post(UPLOAD, PortalResponse::new(200).with_json(&json!({"reply": "ok"})));
    let chat = chat(&transport);

    let reply = chat.send_chat("Hi", &identity(), "42", None).await.unwrap();

    assert_eq!(reply.reply, "ok");
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 2);
}

#[tokio::test]
async fn test_no_portal_access_is_authentication_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, login_redirect())
        .on_get(PORTAL, login_page());
    let chat = chat(&transport);

    let err = chat.send_chat("Hi", &identity(), "42", None).await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 2);
    assert!(chat.sessions().cache().is_empty());
}

#[tokio::test]
async fn test_unreachable_portal_is_network_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .on_get(LOGIN, login_page())
        .on_post(LOGIN, login_redirect())
        .fail(HttpMethod::Get, PORTAL, "connection refused");
    let chat = chat(&transport);

    let err = chat.send_chat("Hi", &identity(), "42", None).await.unwrap_err();

    assert!(matches!(err, FetchError::Network(_)));
    assert!(err.is_retryable());
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 1);
    assert_eq!(chat.sessions().cache().len(), 1);

    // Second outage trips the verify breaker; the third call never leaves.
    let _ = chat.send_chat("Hi", &identity(), "42", None).await;
    let err = chat.send_chat("Hi", &identity(), "42", None).await.unwrap_err();

    assert!(err.is_circuit_open());
    assert!(!err.is_authentication());
    assert_eq!(transport.count(HttpMethod::Get, PORTAL), 2);
    assert_eq!(transport.count(HttpMethod::Post, LOGIN), 1);
}

#[tokio::test]
async fn test_open_candidate_breaker_leaves_others_working() {
    let transport = scripted_portal();
    transport
        .on_post(UPLOAD, PortalResponse::new(503))
        .on_post(SUBMIT, PortalResponse::new(404))
        .on_post(
            EXECUTE,
            PortalResponse::new(200).with_json(&json!({"answer": "from execute"})),
        );
    let chat = chat(&transport);

    for _ in 0..3 {
        let reply = chat.send_chat("Hi", &identity(), "42", None).await.unwrap();
        assert_eq!(reply.reply, "from execute");
    }

    let upload_breaker = chat
        .context()
        .engine
        .breakers()
        .get("portal.complete.upload:ai.example.com")
        .unwrap();
    assert_eq!(upload_breaker.state, CircuitState::Open);
    assert_eq!(transport.count(HttpMethod::Post, UPLOAD), 2);
    assert_eq!(transport.count(HttpMethod::Post, EXECUTE), 3);
}

#[tokio::test]
async fn test_blank_message_is_rejected_without_network() {
    let transport = scripted_portal();
    let chat = chat(&transport);

    let err = chat.send_chat("   ", &identity(), "42", None).await.unwrap_err();

    assert!(matches!(err, FetchError::Validation(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_completion_deadline() {
    let transport = scripted_portal();
    transport.on_post(UPLOAD, PortalResponse::new(503));
    let clock = Arc::new(ManualClock::default());
    let slow_retry = RetryConfig::new(1)
        .with_base_delay(Duration::from_millis(500))
        .with_jitter(Duration::ZERO);
    let settings = FetchSettings::default()
        .with_retry(slow_retry)
        .with_completion_deadline(Duration::from_millis(50));
    let ctx = FetchContext::builder()
        .http(transport.clone())
        .clock(clock)
        .settings(settings)
        .build()
        .unwrap();
    let profile = PortalProfile {
        candidate_attempts: 3,
        ..PortalProfile::default()
    };
    let chat = PortalChat::new(Arc::new(ctx), profile);

    // The upload candidate's first retry sleeps past the deadline.
    let err = chat.send_chat("Hi", &identity(), "42", None).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(50)));
}
