//! `scylla-rag` - index markdown into ScyllaDB and ask questions about it.
//!
//! # Commands
//!
//! ```bash
//! # Chunk, embed and store every .md/.rst file below docs/
//! scylla-rag index docs/ --strategy semantic
//!
//! # Answer one question from the indexed chunks
//! scylla-rag ask "How do I create a keyspace?"
//!
//! # Prompt for the question interactively
//! scylla-rag ask --top-k 5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rustyline::DefaultEditor;
use scylla_rag::{
    ChunkStrategy, DirectoryLoader, FailurePolicy, OllamaChatModel, OllamaEmbeddingProvider,
    RagPipeline, ScyllaVectorStore, VectorStore,
};
use scylla_rag_cli::{
    AppConfig, DEFAULT_COLLECTION, answer_into, failure_message, require_progress,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_LOG_FILTER: &str = "warn,scylla_rag=info";

#[derive(Parser)]
#[command(name = "scylla-rag")]
#[command(about = "Retrieval-augmented question answering over ScyllaDB vector search")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./scylla-rag.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store the documents in a directory
    Index {
        /// Directory containing .md and .rst files
        dir: PathBuf,

        /// Table that receives the chunks
        #[arg(long, default_value = DEFAULT_COLLECTION)]
        collection: String,

        /// Chunking strategy (overrides the config file)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Load at most this many files
        #[arg(long)]
        files_limit: Option<usize>,

        /// Abort at the first chunk that cannot be embedded or stored
        #[arg(long)]
        fail_fast: bool,
    },

    /// Answer a question from the indexed chunks
    Ask {
        /// Question to answer; prompts for one when omitted
        question: Option<String>,

        /// Table to search
        #[arg(long, default_value = DEFAULT_COLLECTION)]
        collection: String,

        /// Number of chunks used as context (overrides the config file)
        #[arg(long)]
        top_k: Option<usize>,

        /// File receiving the retrieved chunk texts
        #[arg(long, default_value = "retrieved_nodes.md")]
        dump: PathBuf,

        /// Also write the full grounding prompt to this file
        #[arg(long)]
        prompt_dump: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Markdown,
    Semantic,
}

impl From<StrategyArg> for ChunkStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Markdown => ChunkStrategy::Markdown,
            StrategyArg::Semantic => ChunkStrategy::SemanticDoubleMerge,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let init = if cli.json_logs {
        scylla_rag_telemetry::init_json(DEFAULT_LOG_FILTER)
    } else {
        scylla_rag_telemetry::init_console(DEFAULT_LOG_FILTER)
    };
    if let Err(e) = init {
        eprintln!("warning: logging disabled: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let store: Arc<dyn VectorStore> = Arc::new(ScyllaVectorStore::connect(&config.store).await?);

    let result = match cli.command {
        Commands::Index { dir, collection, strategy, files_limit, fail_fast } => {
            index(&config, store.clone(), dir, &collection, strategy, files_limit, fail_fast).await
        }
        Commands::Ask { question, collection, top_k, dump, prompt_dump } => {
            let request = AskRequest { question, collection, top_k, dump, prompt_dump };
            ask(&config, store.clone(), request).await
        }
    };

    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "failed to shut down the vector store");
    }
    result
}

async fn index(
    config: &AppConfig,
    store: Arc<dyn VectorStore>,
    dir: PathBuf,
    collection: &str,
    strategy: Option<StrategyArg>,
    files_limit: Option<usize>,
    fail_fast: bool,
) -> Result<()> {
    let mut rag = config.rag.clone();
    if let Some(strategy) = strategy {
        rag.chunking.strategy = strategy.into();
    }
    if fail_fast {
        rag.failure_policy = FailurePolicy::FailFast;
    }

    let documents = DirectoryLoader::new(&dir).files_limit(files_limit).load().await?;
    if documents.is_empty() {
        bail!("no .md or .rst documents found in {}", dir.display());
    }

    let pipeline = RagPipeline::builder()
        .config(rag)
        .embedding_provider(Arc::new(OllamaEmbeddingProvider::new(&config.ollama)))
        .vector_store(store)
        .build()?;

    pipeline.create_collection(collection).await?;
    let report = require_progress(pipeline.ingest(collection, &documents).await?)?;

    println!(
        "Indexed {} chunks from {} documents into {collection}",
        report.indexed.len(),
        documents.len()
    );
    for failure in &report.failures {
        eprintln!("  skipped {}: {}", failure.chunk_id, failure.error);
    }
    Ok(())
}

struct AskRequest {
    question: Option<String>,
    collection: String,
    top_k: Option<usize>,
    dump: PathBuf,
    prompt_dump: Option<PathBuf>,
}

async fn ask(config: &AppConfig, store: Arc<dyn VectorStore>, request: AskRequest) -> Result<()> {
    let question = match request.question {
        Some(question) => question,
        None => tokio::task::spawn_blocking(prompt_question).await??,
    };
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let mut rag = config.rag.clone();
    if let Some(top_k) = request.top_k {
        rag.top_k = top_k;
    }

    let mut builder = RagPipeline::builder()
        .config(rag)
        .embedding_provider(Arc::new(OllamaEmbeddingProvider::new(&config.ollama)))
        .vector_store(store)
        .chat_model(Arc::new(OllamaChatModel::new(&config.ollama)));
    if let Some(path) = request.prompt_dump {
        builder = builder.diagnostics(path);
    }
    let pipeline = builder.build()?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut stdout = tokio::io::stdout();
    let delivered =
        answer_into(&pipeline, &request.collection, question, &request.dump, &mut stdout, &cancel)
            .await;
    interrupt.abort();
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    if delivered?.cancelled {
        eprintln!("(interrupted)");
    }
    Ok(())
}

fn prompt_question() -> Result<String> {
    let mut editor = DefaultEditor::new()?;
    Ok(editor.readline("Enter your question: ")?)
}
