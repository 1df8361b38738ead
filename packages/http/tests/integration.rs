use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use contentdesk_auth::{Credential, TokenProvider};
use contentdesk_http::{
    Attachment, CancellationToken, Error, HttpRequest, Payload, Transport, TransportConfig,
};
use contentdesk_storage::InMemoryStore;

fn tokens() -> Arc<TokenProvider> {
    Arc::new(TokenProvider::new(Arc::new(InMemoryStore::new())))
}

fn transport(uri: &str, tokens: Arc<TokenProvider>) -> Transport {
    Transport::new(TransportConfig::new(uri).unwrap(), tokens).unwrap()
}

#[tokio::test]
async fn test_get_with_bearer_and_accept() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/workshops"))
        .and(query_param("page", "2"))
        .and(header("Authorization", "Bearer token123"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let tokens = tokens();
    let credential = Credential::expiring_in("token123", Utc::now(), chrono::Duration::hours(1));
    tokens.set_credential(&credential, &json!({})).unwrap();

    let response = transport(&server.uri(), tokens)
        .send(
            HttpRequest::get("workshops")
                .with_query("page", "2")
                .authenticated(true),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"data": []}));
}

#[tokio::test]
async fn test_json_payload_is_sent_as_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"title": "Massage", "price": 40})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;

    let response = transport(&server.uri(), tokens())
        .send(
            HttpRequest::post("services").with_payload(
                Payload::new()
                    .with_field("title", "Massage")
                    .with_field("price", 40),
            ),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body["id"], 7);
}

#[tokio::test]
async fn test_attachment_payload_is_sent_as_multipart() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/workshops"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;

    let payload = Payload::new()
        .with_field("title", "Y")
        .with_field("tags", json!(["calm", "breath"]))
        .with_file(
            "image",
            Attachment::new("cover.png", "image/png", b"PNGDATA".to_vec()),
        );

    transport(&server.uri(), tokens())
        .send(HttpRequest::post("workshops").with_payload(payload))
        .await
        .unwrap();

    let received: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let content_type = received[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = String::from_utf8_lossy(&received[0].body).to_string();
    assert!(body.contains("name=\"title\"\r\n\r\nY\r\n"));
    assert!(body.contains("name=\"tags[]\"\r\n\r\ncalm\r\n"));
    assert!(body.contains("name=\"tags[]\"\r\n\r\nbreath\r\n"));
    assert!(body.contains("name=\"image\"; filename=\"cover.png\""));
    assert!(body.contains("Content-Type: image/png"));
    assert!(body.contains("PNGDATA"));
}

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blogs"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "expired"})))
        .mount(&server)
        .await;

    let tokens = tokens();
    let credential = Credential::expiring_in("stale", Utc::now(), chrono::Duration::hours(1));
    tokens.set_credential(&credential, &json!({})).unwrap();

    let transport = transport(&server.uri(), tokens.clone());
    let result = transport
        .send(HttpRequest::get("blogs").authenticated(true))
        .await;

    assert!(matches!(result, Err(Error::Unauthenticated { ref message }) if message == "expired"));
    assert!(tokens.get_credential().is_none());

    let second = transport
        .send(HttpRequest::get("blogs").authenticated(true))
        .await;
    assert!(matches!(second, Err(Error::Unauthenticated { .. })));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let result = transport(&server.uri(), tokens())
        .send(HttpRequest::get("slow").with_timeout(Duration::from_millis(50)))
        .await;

    match result {
        Err(Error::Transport { message, source }) => {
            assert_eq!(message, "request timed out");
            assert!(source.is_some());
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_aborts_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = transport(&server.uri(), tokens())
        .send(HttpRequest::get("slow").with_cancellation(token))
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_connection_failure_is_a_transport_error() {
    // Nothing listens on port 9 on the loopback interface.
    let result = transport("http://127.0.0.1:9/", tokens())
        .send(HttpRequest::get("anything").with_timeout(Duration::from_secs(2)))
        .await;

    assert!(matches!(result, Err(Error::Transport { .. })));
}
