use tempfile::TempDir;

use ccmdb_core::traits::KeywordIndex;
use ccmdb_core::types::{Chunk, DocumentMeta, MetadataFilter, RetrievalPath};
use ccmdb_keyword::TantivyKeywordIndex;

fn chunk(id: &str, doc_id: &str, text: &str, framework: &str, control: Option<&str>) -> Chunk {
    Chunk {
        id: id.to_string(),
        doc_id: doc_id.to_string(),
        start: 0,
        end: text.len(),
        text: text.to_string(),
        embedding: None,
        chunk_index: 0,
        total_chunks: 1,
        meta: DocumentMeta {
            framework: framework.to_string(),
            control_id: control.map(str::to_string),
            owner: Some("grc-team".to_string()),
            review_date: None,
        },
    }
}

fn fixture() -> Vec<Chunk> {
    vec![
        chunk("pol-a:0", "pol-a", "User accounts must be reviewed quarterly by the account owner.", "NIST", Some("AC-2")),
        chunk("pol-b:0", "pol-b", "Audit logs are retained for one year and reviewed monthly.", "NIST", Some("AU-11")),
        chunk("pol-c:0", "pol-c", "Encryption keys rotate every ninety days.", "ISO27001", Some("A.10")),
    ]
}

#[tokio::test]
async fn search_returns_ranked_keyword_hits() {
    let tmp = TempDir::new().expect("tempdir");
    let index = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("create");
    index.index(&fixture()).await.expect("index");

    let hits = index.search("accounts reviewed", None, 10).await.expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk_id, "pol-a:0");
    for (i, h) in hits.iter().enumerate() {
        assert_eq!(h.path, RetrievalPath::Keyword);
        assert_eq!(h.rank, i);
    }
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn metadata_filter_restricts_results() {
    let tmp = TempDir::new().expect("tempdir");
    let index = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("create");
    index.index(&fixture()).await.expect("index");

    let filter = MetadataFilter {
        framework: Some("ISO27001".to_string()),
        ..MetadataFilter::default()
    };
    let hits = index.search("reviewed rotate keys", Some(&filter), 10).await.expect("search");
    assert!(hits.iter().all(|h| h.chunk_id == "pol-c:0"), "only ISO27001 chunks may match");

    let none = MetadataFilter {
        framework: Some("SOC2".to_string()),
        ..MetadataFilter::default()
    };
    let hits = index.search("reviewed", Some(&none), 10).await.expect("search");
    assert!(hits.is_empty(), "no SOC2 documents were indexed");
}

#[tokio::test]
async fn fetch_restores_stored_fields() {
    let tmp = TempDir::new().expect("tempdir");
    let index = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("create");
    index.index(&fixture()).await.expect("index");

    let chunks = index
        .fetch(&["pol-a:0".to_string(), "missing:9".to_string()])
        .await
        .expect("fetch");
    assert_eq!(chunks.len(), 1, "unknown ids are skipped");
    let c = &chunks[0];
    assert_eq!(c.doc_id, "pol-a");
    assert_eq!(c.meta.framework, "NIST");
    assert_eq!(c.meta.control_id.as_deref(), Some("AC-2"));
    assert_eq!(c.meta.owner.as_deref(), Some("grc-team"));
    assert_eq!(c.meta.review_date, None);
    assert!(c.text.contains("reviewed quarterly"));
    assert!(c.embedding.is_none());
}

#[tokio::test]
async fn malformed_query_syntax_still_searches() {
    let tmp = TempDir::new().expect("tempdir");
    let index = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("create");
    index.index(&fixture()).await.expect("index");

    // Raw user input with an unbalanced quote still finds matches.
    let hits = index.search("\"accounts reviewed", None, 10).await.expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk_id, "pol-a:0");

    // Stray operators and parens do not error out the path either.
    for query in ["accounts AND", "reviewed (quarterly"] {
        let hits = index.search(query, None, 10).await.expect("search");
        assert!(!hits.is_empty(), "no hits for {query:?}");
    }
}

#[tokio::test]
async fn zero_limit_returns_empty() {
    let tmp = TempDir::new().expect("tempdir");
    let index = TantivyKeywordIndex::create(tmp.path().join("tantivy")).expect("create");
    index.index(&fixture()).await.expect("index");
    let hits = index.search("accounts", None, 0).await.expect("search");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn reopen_sees_committed_chunks() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("tantivy");
    {
        let index = TantivyKeywordIndex::create(dir.clone()).expect("create");
        index.index(&fixture()).await.expect("index");
    }
    let reopened = TantivyKeywordIndex::open(dir).expect("open");
    let hits = reopened.search("audit logs", None, 5).await.expect("search");
    assert_eq!(hits[0].chunk_id, "pol-b:0");
}
