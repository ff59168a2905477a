//! Support code for the `scylla-rag` binary.

pub mod config;

pub use config::{AppConfig, DEFAULT_COLLECTION, DEFAULT_CONFIG_FILE, DEFAULT_TOP_K};

use std::path::Path;

use scylla_rag::{Delivery, IndexReport, RagError, RagPipeline, deliver, write_retrieved};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One-line message for a failed command, naming the pipeline stage when the
/// failure came from the pipeline.
pub fn failure_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<RagError>() {
        Some(rag) => format!("{} failed: {rag}", rag.stage()),
        None => format!("error: {error:#}"),
    }
}

/// Reject an ingest run that stored nothing although chunks were attempted.
///
/// The first failure is returned so the exit message names the broken stage.
/// Partial runs and runs without any chunk pass through.
pub fn require_progress(mut report: IndexReport) -> Result<IndexReport, RagError> {
    if report.indexed.is_empty() && !report.failures.is_empty() {
        let skipped = report.failures.len();
        let first = report.failures.swap_remove(0);
        warn!(
            collection = %report.collection,
            skipped,
            chunk_id = %first.chunk_id,
            "no chunk was indexed"
        );
        return Err(first.error);
    }
    Ok(report)
}

/// Answer `question` from `collection` and stream the reply into `out`.
///
/// The retrieved chunks are written to `dump` before generation starts. The
/// token is watched from the first embedding call on, so an interrupt during
/// retrieval returns a cancelled [`Delivery`] without writing anything.
pub async fn answer_into<W>(
    pipeline: &RagPipeline,
    collection: &str,
    question: &str,
    dump: &Path,
    out: &mut W,
    cancel: &CancellationToken,
) -> anyhow::Result<Delivery>
where
    W: AsyncWrite + Unpin,
{
    let answer = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Delivery { fragments: 0, cancelled: true }),
        answer = pipeline.answer(collection, question) => answer?,
    };

    if let Err(e) = write_retrieved(dump, &answer.chunks).await {
        warn!(path = %dump.display(), error = %e, "failed to write retrieved chunks");
    }
    Ok(deliver(answer.stream, out, cancel).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use scylla_rag::{
        ChatMessage, ChatModel, EmbeddingProvider, IndexFailure, InMemoryVectorStore, RagConfig,
        TokenStream,
    };
    use uuid::Uuid;

    use super::*;

    /// Never finishes an embedding, like a model server that stopped answering.
    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed(&self, _text: &str) -> scylla_rag::Result<Vec<f32>> {
            std::future::pending().await
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct UnusedModel;

    #[async_trait]
    impl ChatModel for UnusedModel {
        fn name(&self) -> &str {
            "unused"
        }

        async fn chat_stream(&self, _messages: &[ChatMessage]) -> scylla_rag::Result<TokenStream> {
            std::future::pending().await
        }
    }

    fn embedding_failure(chunk_id: &str) -> IndexFailure {
        IndexFailure {
            chunk_id: chunk_id.to_string(),
            error: RagError::EmbeddingError {
                provider: "Ollama".into(),
                message: "connection refused".into(),
            },
        }
    }

    fn report(indexed: usize, failures: Vec<IndexFailure>) -> IndexReport {
        IndexReport {
            collection: "rag.md_chunks".to_string(),
            indexed: (0..indexed).map(|_| Uuid::new_v4()).collect(),
            failures,
        }
    }

    #[test]
    fn pipeline_errors_name_their_stage() {
        let err = anyhow::Error::new(RagError::RetrievalError {
            backend: "ScyllaDB".into(),
            message: "collection 'rag.md_chunks' is empty".into(),
        });
        assert_eq!(
            failure_message(&err),
            "retrieval failed: Retrieval error (ScyllaDB): collection 'rag.md_chunks' is empty"
        );
    }

    #[test]
    fn other_errors_keep_their_context_chain() {
        let err = anyhow::anyhow!("no such file").context("failed to read config file x.toml");
        assert_eq!(failure_message(&err), "error: failed to read config file x.toml: no such file");
    }

    #[test]
    fn ingest_that_stored_nothing_fails_with_the_first_error() {
        let failures = vec![embedding_failure("a_0"), embedding_failure("a_1")];
        let err = require_progress(report(0, failures)).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }), "got {err:?}");
        assert!(failure_message(&anyhow::Error::new(err)).starts_with("embedding failed: "));
    }

    #[test]
    fn partial_and_empty_ingests_pass() {
        let partial = require_progress(report(2, vec![embedding_failure("a_2")])).unwrap();
        assert_eq!(partial.indexed.len(), 2);
        assert_eq!(partial.failures.len(), 1);

        assert!(require_progress(report(0, Vec::new())).is_ok());
    }

    #[tokio::test]
    async fn interrupt_during_retrieval_ends_the_command() {
        let pipeline = RagPipeline::builder()
            .config(RagConfig::default())
            .embedding_provider(Arc::new(StalledEmbedder))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .chat_model(Arc::new(UnusedModel))
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("retrieved_nodes.md");
        let cancel = CancellationToken::new();
        let trigger = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let mut out = Vec::new();
        let delivery =
            answer_into(&pipeline, "rag.md_chunks", "What is a keyspace?", &dump, &mut out, &cancel)
                .await
                .unwrap();
        trigger.await.unwrap();

        assert!(delivery.cancelled);
        assert_eq!(delivery.fragments, 0);
        assert!(out.is_empty());
        assert!(!dump.exists());
    }
}
