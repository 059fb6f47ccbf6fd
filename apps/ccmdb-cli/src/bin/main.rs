use std::env;
use std::path::{Path, PathBuf};

use ccmdb_core::chunker::{Chunker, ChunkerConfig};
use ccmdb_core::config::{expand_path, Config};
use ccmdb_core::traits::KeywordIndex;
use ccmdb_core::types::{Document, DocumentMeta, MetadataFilter};
use ccmdb_embed::{embedder_from_settings, EmbeddingSettings};
use ccmdb_hybrid::{HybridRetriever, RetrieverConfig};
use ccmdb_keyword::TantivyKeywordIndex;
use ccmdb_vector::LanceVectorIndex;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|query> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => ingest(&config, &args).await,
        "query" => query(&config, &args).await,
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
}

async fn build_retriever(
    config: &Config,
    fresh_keyword_index: bool,
) -> anyhow::Result<HybridRetriever<TantivyKeywordIndex, LanceVectorIndex>> {
    let keyword_dir: String = config
        .get("data.keyword_index_dir")
        .unwrap_or_else(|_| "data/indexes/tantivy".to_string());
    let vector_dir: String = config
        .get("data.vector_index_dir")
        .unwrap_or_else(|_| "data/indexes/lancedb".to_string());

    let embedding: EmbeddingSettings = config.section("embedding")?;
    let retrieval: RetrieverConfig = config.section("retrieval")?;

    let keyword = if fresh_keyword_index {
        TantivyKeywordIndex::create(expand_path(&keyword_dir))?
    } else {
        TantivyKeywordIndex::open(expand_path(&keyword_dir))?
    };
    let vector = LanceVectorIndex::connect(&expand_path(&vector_dir), "chunks", embedding.dim).await?;
    let embedder = embedder_from_settings(&embedding)?;
    Ok(HybridRetriever::new(keyword, vector, embedder, retrieval)?)
}

async fn ingest(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
        let dir: String = config
            .get("data.policy_dir")
            .unwrap_or_else(|_| "data/policies".to_string());
        expand_path(dir)
    });
    println!("Ingesting policy documents from {}", data_dir.display());

    let chunker = Chunker::new(ChunkerConfig {
        max_tokens: config.get("chunking.max_tokens").unwrap_or(500),
        overlap_percent: config.get("chunking.overlap_percent").unwrap_or(0.1),
    });

    let mut chunks = Vec::new();
    let mut doc_count = 0usize;
    for entry in walkdir::WalkDir::new(&data_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("txt") && ext != Some("md") {
            continue;
        }
        let doc = read_document(path, &data_dir)?;
        chunks.extend(chunker.chunk(&doc));
        doc_count += 1;
    }
    if chunks.is_empty() {
        println!("No .txt or .md files found under {}.", data_dir.display());
        return Ok(());
    }

    let retriever = build_retriever(config, true).await?;
    retriever.index(&chunks).await?;
    println!("Ingest complete: {} documents, {} chunks", doc_count, chunks.len());
    Ok(())
}

fn read_document(path: &Path, data_dir: &Path) -> anyhow::Result<Document> {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|_| String::from_utf8_lossy(&std::fs::read(path).unwrap_or_default()).to_string());
    let doc_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    // Top-level directory under the policy root names the framework.
    let framework = path
        .strip_prefix(data_dir)
        .ok()
        .and_then(|rel| rel.components().next())
        .filter(|_| path.parent() != Some(data_dir))
        .map(|c| c.as_os_str().to_string_lossy().to_string());
    Ok(Document {
        id: doc_id,
        text,
        meta: DocumentMeta {
            framework: framework.unwrap_or_else(|| "unfiled".to_string()),
            ..DocumentMeta::default()
        },
    })
}

async fn query(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let mut positional = Vec::new();
    let mut filter = MetadataFilter::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--framework" => filter.framework = it.next().cloned(),
            "--control" => filter.control_id = it.next().cloned(),
            "--owner" => filter.owner = it.next().cloned(),
            _ => positional.push(arg.clone()),
        }
    }
    let Some(query_text) = positional.first() else {
        eprintln!("Usage: ccmdb query \"<query>\" [limit] [--framework F] [--control C] [--owner O]");
        std::process::exit(1);
    };
    let limit: usize = positional
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| config.get("retrieval.limit").unwrap_or(10));
    let filter = if filter.is_empty() { None } else { Some(filter) };

    let retriever = build_retriever(config, false).await?;
    let retrieval = retriever.retrieve(query_text, filter.as_ref(), limit).await?;

    if retrieval.is_degraded() {
        for path in retrieval.degraded_paths() {
            println!("⚠️  {} path unavailable; results are degraded", path);
        }
    }
    if retrieval.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    let ids: Vec<String> = retrieval.iter().map(|r| r.chunk_id.clone()).collect();
    let stored = retriever.keyword_index().fetch(&ids).await.unwrap_or_default();
    let snippet_of = |id: &str| {
        stored
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.text.chars().take(140).collect::<String>())
            .unwrap_or_default()
    };

    for (i, r) in retrieval.iter().enumerate() {
        println!(
            "{:>2}. {}  score={:.3}  path={}{}{}",
            i + 1,
            r.chunk_id,
            r.combined_score,
            r.primary,
            r.vector.map(|p| format!("  v(raw={:.3}, rank={})", p.raw, p.rank)).unwrap_or_default(),
            r.keyword.map(|p| format!("  k(raw={:.3}, rank={})", p.raw, p.rank)).unwrap_or_default(),
        );
        let snippet = snippet_of(&r.chunk_id);
        if !snippet.is_empty() {
            println!("    {}", snippet.replace('\n', " "));
        }
    }
    Ok(())
}
