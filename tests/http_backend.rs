//! HttpBackend against a local mockito server (real time, real sockets).

use ai_chat_client::client::{parse_single_shot, ChatSession};
use ai_chat_client::pipeline::StreamDecoder;
use ai_chat_client::{ChatClient, ClientConfig, CompletionBackend, Error, HttpBackend, RemoteReply};
use ai_chat_client::types::CompletionRequest;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn config_for(server: &mockito::ServerGuard) -> ClientConfig {
    ClientConfig {
        endpoint_url: Some(format!("{}/api/chat", server.url())),
        api_key: Some("test-key".into()),
        probe_url: None,
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn single_shot_reply_is_returned_as_body_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_header("authorization", "Bearer test-key")
        .match_header("x-chat-request-id", Matcher::Any)
        .match_header("content-type", Matcher::Regex("application/json".into()))
        .match_body(Matcher::Json(json!({"message": "hello"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"response":"Hello!"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let reply = backend
        .complete(&CompletionRequest::new("hello"))
        .await
        .unwrap();
    match reply {
        RemoteReply::Body(value) => assert_eq!(parse_single_shot(value).unwrap(), "Hello!"),
        other => panic!("unexpected {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn event_stream_reply_is_decoded_incrementally() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(
            "data: {\"text\":\"Once\"}\n\ndata: {\"text\":\" upon\"}\n\ndata: {\"text\":\" a time\"}\n\ndata: [DONE]\n\n",
        )
        .create_async()
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let body = match backend.complete(&CompletionRequest::new("story")).await.unwrap() {
        RemoteReply::Stream(body) => body,
        other => panic!("unexpected {:?}", other),
    };
    let text = StreamDecoder::new(Duration::from_secs(5))
        .decode(body, None)
        .await
        .unwrap();
    assert_eq!(text, "Once upon a time");
}

#[tokio::test]
async fn error_statuses_map_to_error_variants() {
    let mut server = mockito::Server::new_async().await;
    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let request = CompletionRequest::new("hi");

    let limited = server
        .mock("POST", "/api/chat")
        .with_status(429)
        .with_header("retry-after", "2")
        .create_async()
        .await;
    match backend.complete(&request).await {
        Err(Error::RateLimited { retry_after_ms }) => assert_eq!(retry_after_ms, Some(2000)),
        other => panic!("unexpected {:?}", other),
    }
    limited.remove_async().await;

    let unavailable = server
        .mock("POST", "/api/chat")
        .with_status(503)
        .with_body("upstream overloaded")
        .create_async()
        .await;
    match backend.complete(&request).await {
        Err(Error::ServiceUnavailable { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream overloaded");
        }
        other => panic!("unexpected {:?}", other),
    }
    unavailable.remove_async().await;

    let _unauthorized = server
        .mock("POST", "/api/chat")
        .with_status(401)
        .with_body(r#"{"error":"bad key"}"#)
        .create_async()
        .await;
    match backend.complete(&request).await {
        Err(Error::Remote { message, status }) => {
            assert_eq!(message, "bad key");
            assert_eq!(status, Some(401));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn session_over_http_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"response":"Hello!"}"#)
        .create_async()
        .await;

    let client = ChatClient::builder()
        .config(config_for(&server))
        .build()
        .await
        .unwrap();
    assert!(client.slot().is_ready());

    let mut session = ChatSession::load(client.clone()).await;
    let reply = session.submit("hello", None).await.unwrap().unwrap();
    assert_eq!(reply.content, "Hello!");
    assert_eq!(client.history().await.len(), 2);
}
