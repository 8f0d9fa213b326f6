//! Brevo transport against a wiremock server.

use topicwatch_core::BrevoConfig;
use topicwatch_digest::{BrevoSender, DigestError, EmailSender};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> BrevoConfig {
    BrevoConfig {
        api_key: "test-key".to_string(),
        from_email: "digest@example.com".to_string(),
        from_name: "Topic Monitor".to_string(),
    }
}

#[tokio::test]
async fn send_posts_transactional_email() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/smtp/email"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "sender": { "email": "digest@example.com", "name": "Topic Monitor" },
            "to": [{ "email": "reader@example.com" }],
            "subject": "Daily Digest",
            "htmlContent": "<p>hi</p>"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({ "messageId": "<abc@brevo>" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sender = BrevoSender::with_base_url(&config(), &server.uri()).expect("sender");
    sender
        .send("reader@example.com", "Daily Digest", "<p>hi</p>")
        .await
        .expect("accepted");
}

#[tokio::test]
async fn rejected_message_surfaces_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/smtp/email"))
        .respond_with(ResponseTemplate::new(401).set_body_string("key not found"))
        .mount(&server)
        .await;

    let sender = BrevoSender::with_base_url(&config(), &server.uri()).expect("sender");
    let err = sender
        .send("reader@example.com", "Daily Digest", "<p>hi</p>")
        .await
        .expect_err("rejected");

    match err {
        DigestError::Rejected { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "key not found");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = BrevoSender::with_base_url(&config(), "not a url");
    assert!(matches!(result, Err(DigestError::InvalidBaseUrl(_))));
}
