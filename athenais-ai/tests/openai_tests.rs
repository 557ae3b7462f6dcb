// ABOUTME: HTTP-level tests for the OpenAI backend against a mockito server
// ABOUTME: Covers moderation gating, request shape, API errors and empty responses

use athenais_ai::{AiError, Completion, OpenAiClient, OpenAiConfig};
use mockito::Matcher;
use serde_json::json;

fn client_for(server: &mockito::Server) -> OpenAiClient {
    OpenAiClient::new(
        OpenAiConfig::new("sk-test")
            .with_base_url(server.url())
            .with_prompt("You are a test bot."),
    )
}

fn not_flagged() -> String {
    json!({
        "id": "modr-1",
        "model": "text-moderation-latest",
        "results": [{ "flagged": false, "categories": { "hate": false } }]
    })
    .to_string()
}

fn chat_reply(text: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_prompt_moderates_then_completes() {
    let mut server = mockito::Server::new_async().await;

    let moderation = server
        .mock("POST", "/moderations")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({ "input": "hello there" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(not_flagged())
        .create_async()
        .await;

    let chat = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 100,
            "messages": [
                { "role": "system", "content": "You are a test bot." },
                { "role": "user", "content": "hello there" }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("General Kenobi"))
        .create_async()
        .await;

    let reply = client_for(&server).prompt("hello there").await.unwrap();

    assert_eq!(reply, "General Kenobi");
    moderation.assert_async().await;
    chat.assert_async().await;
}

#[tokio::test]
async fn test_flagged_input_skips_completion() {
    let mut server = mockito::Server::new_async().await;

    let _moderation = server
        .mock("POST", "/moderations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "results": [{
                    "flagged": true,
                    "categories": { "hate": true, "violence": false, "harassment": true }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let chat = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let err = client_for(&server).prompt("something awful").await.unwrap_err();

    match err {
        AiError::Flagged { categories } => {
            assert_eq!(categories, vec!["harassment".to_string(), "hate".to_string()])
        }
        other => panic!("expected flagged, got {:?}", other),
    }
    chat.assert_async().await;
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let mut server = mockito::Server::new_async().await;

    let _moderation = server
        .mock("POST", "/moderations")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let err = client_for(&server).prompt("hi").await.unwrap_err();

    match err {
        AiError::Api { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Incorrect API key"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_choices_is_empty_response() {
    let mut server = mockito::Server::new_async().await;

    let _moderation = server
        .mock("POST", "/moderations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(not_flagged())
        .create_async()
        .await;

    let _chat = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    let err = client_for(&server).prompt("hi").await.unwrap_err();
    assert!(matches!(err, AiError::EmptyResponse));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let client = OpenAiClient::new(OpenAiConfig::new("sk-test").with_base_url("http://127.0.0.1:1"));
    let err = client.prompt("hi").await.unwrap_err();
    assert!(matches!(err, AiError::Http(_)));
    assert!(!err.is_flagged());
}
