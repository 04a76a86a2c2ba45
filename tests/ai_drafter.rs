use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qrstudio::{
    AiOptions, CompletionRequest, Error, Generator, OpenAiDrafter, TextDrafter, TextField,
};

fn options(server: &MockServer, key: Option<&str>) -> AiOptions {
    AiOptions {
        api_key: key.map(str::to_string),
        model: "gpt-3.5-turbo".to_string(),
        base_url: format!("{}/v1", server.uri()),
    }
}

#[tokio::test]
async fn request_carries_prompts_and_sampling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 150,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  We feed families.\n" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let drafter = OpenAiDrafter::new(&options(&server, Some("sk-test")));
    let request = CompletionRequest::for_field(TextField::OrgDescription, "food bank");
    let text = drafter.complete(&request).await.expect("completion");
    assert_eq!(text, "We feed families.");

    let received = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = received[0].body_json().expect("json body");
    let messages = body["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 2);
    let temperature = body["temperature"].as_f64().expect("temperature");
    assert!((temperature - 0.7).abs() < 1e-6);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert!(
        messages[1]["content"]
            .as_str()
            .is_some_and(|content| content.contains("food bank"))
    );
}

#[tokio::test]
async fn provider_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached", "type": "requests" }
        })))
        .mount(&server)
        .await;

    let drafter = OpenAiDrafter::new(&options(&server, Some("sk-test")));
    let mut generator = Generator::new();
    let applied = generator
        .draft_text(&drafter, TextField::UrlPurpose, "donate")
        .await;

    assert!(!applied);
    assert_eq!(generator.error(), Some("Rate limit reached"));
    assert!(generator.text(TextField::UrlPurpose).value().is_empty());
    assert!(!generator.is_generating());
}

#[tokio::test]
async fn missing_key_never_reaches_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let drafter = OpenAiDrafter::new(&options(&server, None));
    assert!(!drafter.is_configured());

    let request = CompletionRequest::for_field(TextField::UrlPurpose, "donate");
    let err = drafter.complete(&request).await.expect_err("no key");
    assert!(matches!(err, Error::AiNotConfigured));
}

#[tokio::test]
async fn empty_choice_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let drafter = OpenAiDrafter::new(&options(&server, Some("sk-test")));
    let request = CompletionRequest::for_field(TextField::OrgDescription, "shelter");
    assert!(matches!(
        drafter.complete(&request).await,
        Err(Error::Ai(_))
    ));
}
