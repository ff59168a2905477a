//! Ollama backends against a mock HTTP server.
#![cfg(feature = "ollama")]

use futures::StreamExt;
use scylla_rag::{
    ChatMessage, ChatModel, EmbeddingProvider, OllamaChatModel, OllamaConfig,
    OllamaEmbeddingProvider, RagError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dimensions: usize) -> OllamaConfig {
    OllamaConfig {
        base_url: server.uri(),
        embedding_model: "bge".to_string(),
        language_model: "llama".to_string(),
        dimensions,
        context_window: None,
    }
}

fn ndjson(frames: &[serde_json::Value]) -> String {
    frames.iter().map(|f| format!("{f}\n")).collect()
}

fn content(text: &str) -> serde_json::Value {
    json!({"model": "llama", "message": {"role": "assistant", "content": text}, "done": false})
}

async fn collect(model: &OllamaChatModel) -> Vec<Result<String, RagError>> {
    let messages = [ChatMessage::system("Context"), ChatMessage::user("question")];
    model.chat_stream(&messages).await.unwrap().collect().await
}

#[tokio::test]
async fn embeds_a_batch_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "bge", "input": ["one", "two"]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaEmbeddingProvider::new(&config(&server, 3));
    let embeddings = provider.embed_batch(&["one", "two"]).await.unwrap();
    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[1], vec![0.4_f32, 0.5, 0.6]);
}

#[tokio::test]
async fn wrong_dimensions_are_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.1, 0.2]]})))
        .mount(&server)
        .await;

    let provider = OllamaEmbeddingProvider::new(&config(&server, 3));
    let err = provider.embed("short").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }), "got {err:?}");
}

#[tokio::test]
async fn http_errors_carry_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model \"bge\" not found"})),
        )
        .mount(&server)
        .await;

    let provider = OllamaEmbeddingProvider::new(&config(&server, 3));
    match provider.embed("text").await.unwrap_err() {
        RagError::EmbeddingError { provider, message } => {
            assert_eq!(provider, "Ollama");
            assert!(message.contains("404"));
            assert!(message.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn chat_streams_ndjson_fragments_in_order() {
    let server = MockServer::start().await;
    let body = ndjson(&[
        content("Scylla"),
        content("DB is "),
        content("fast."),
        json!({"model": "llama", "message": {"role": "assistant", "content": ""}, "done": true}),
    ]);
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama",
            "stream": true,
            "messages": [
                {"role": "system", "content": "Context"},
                {"role": "user", "content": "question"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let model = OllamaChatModel::new(&config(&server, 3));
    let fragments: Vec<String> = collect(&model).await.into_iter().map(Result::unwrap).collect();
    assert_eq!(fragments, vec!["Scylla", "DB is ", "fast."]);
}

#[tokio::test]
async fn error_frame_ends_the_stream_with_an_error() {
    let server = MockServer::start().await;
    let body = ndjson(&[content("Partial"), json!({"error": "model runner has unexpectedly stopped"})]);
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let model = OllamaChatModel::new(&config(&server, 3));
    let items = collect(&model).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "Partial");
    assert!(matches!(items[1], Err(RagError::GenerationError { .. })));
}

#[tokio::test]
async fn context_limit_rejections_are_context_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(400).set_body_json(
            json!({"error": "the input length exceeds the context length"}),
        ))
        .mount(&server)
        .await;

    let model = OllamaChatModel::new(&config(&server, 3));
    let err = model.chat_stream(&[ChatMessage::user("long")]).await.err().unwrap();
    assert!(matches!(err, RagError::ContextTooLarge { .. }), "got {err:?}");
}

#[tokio::test]
async fn configured_context_window_is_sent_as_num_ctx() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"options": {"num_ctx": 4096}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ndjson(&[content("ok")]), "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let settings = OllamaConfig { context_window: Some(4096), ..config(&server, 3) };
    let model = OllamaChatModel::new(&settings);
    let items = collect(&model).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_deref().unwrap(), "ok");
}
