//! Ingest-to-query flow over the real tantivy and lancedb adapters
//! with the deterministic hashing embedder.

use tempfile::TempDir;

use ccmdb_core::chunker::Chunker;
use ccmdb_core::traits::KeywordIndex;
use ccmdb_core::types::{Document, DocumentMeta, MetadataFilter};
use ccmdb_embed::HashingEmbedder;
use ccmdb_hybrid::{HybridRetriever, RetrieverConfig};
use ccmdb_keyword::TantivyKeywordIndex;
use ccmdb_vector::LanceVectorIndex;

const DIM: usize = 64;

fn doc(id: &str, framework: &str, control: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        text: text.to_string(),
        meta: DocumentMeta {
            framework: framework.to_string(),
            control_id: Some(control.to_string()),
            owner: None,
            review_date: None,
        },
    }
}

async fn build(tmp: &TempDir) -> HybridRetriever<TantivyKeywordIndex, LanceVectorIndex> {
    let keyword = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("keyword index");
    let vector = LanceVectorIndex::connect(&tmp.path().join("lancedb"), "chunks", DIM)
        .await
        .expect("vector index");
    HybridRetriever::new(
        keyword,
        vector,
        Box::new(HashingEmbedder::new(DIM)),
        RetrieverConfig::default(),
    )
    .expect("retriever")
}

#[tokio::test]
async fn hybrid_flow_indexes_and_retrieves() {
    let tmp = TempDir::new().expect("tempdir");
    let retriever = build(&tmp).await;

    let docs = vec![
        doc(
            "access-policy",
            "NIST",
            "AC-2",
            "User accounts must be reviewed quarterly.\n\nDormant accounts are disabled after ninety days.",
        ),
        doc(
            "logging-policy",
            "NIST",
            "AU-11",
            "Audit logs are retained for one year.\n\nLog review happens monthly.",
        ),
        doc(
            "crypto-policy",
            "ISO27001",
            "A.10",
            "Encryption keys rotate every ninety days.",
        ),
    ];
    let chunker = Chunker::default();
    let chunks: Vec<_> = docs.iter().flat_map(|d| chunker.chunk(d)).collect();
    retriever.index(&chunks).await.expect("index");

    let retrieval = retriever
        .retrieve("how often are user accounts reviewed", None, 3)
        .await
        .expect("retrieve");

    assert!(!retrieval.is_degraded());
    assert!(!retrieval.is_empty());
    assert!(retrieval.len() <= 3);
    assert!(
        retrieval.iter().any(|r| r.chunk_id.starts_with("access-policy:")),
        "the account-review chunk should surface"
    );

    // Evidence lookup by id works through the keyword path's stored fields.
    let ids: Vec<String> = retrieval.iter().map(|r| r.chunk_id.clone()).collect();
    let stored = retriever.keyword_index().fetch(&ids).await.expect("fetch");
    assert_eq!(stored.len(), ids.len());
}

#[tokio::test]
async fn metadata_filter_applies_on_both_paths() {
    let tmp = TempDir::new().expect("tempdir");
    let retriever = build(&tmp).await;

    let docs = vec![
        doc("nist-review", "NIST", "AC-2", "Accounts are reviewed quarterly."),
        doc("iso-review", "ISO27001", "A.9", "Access rights are reviewed quarterly."),
    ];
    let chunker = Chunker::default();
    let chunks: Vec<_> = docs.iter().flat_map(|d| chunker.chunk(d)).collect();
    retriever.index(&chunks).await.expect("index");

    let filter = MetadataFilter {
        framework: Some("ISO27001".to_string()),
        ..MetadataFilter::default()
    };
    let retrieval = retriever
        .retrieve("reviewed quarterly", Some(&filter), 5)
        .await
        .expect("retrieve");

    assert!(!retrieval.is_empty());
    assert!(
        retrieval.iter().all(|r| r.chunk_id.starts_with("iso-review:")),
        "filtered retrieval may only return ISO27001 chunks"
    );
}
