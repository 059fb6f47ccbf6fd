use anyhow::{Context, Result};
use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, TantivyDocument, Term};

use ccmdb_core::traits::KeywordIndex;
use ccmdb_core::types::{Chunk, ChunkId, DocumentMeta, MetadataFilter, RetrievalPath, RetrievalResult};

use crate::schema::{build_schema, register_tokenizer};

pub struct TantivyKeywordIndex {
    index: Index,
    id_field: tantivy::schema::Field,
    doc_id_field: tantivy::schema::Field,
    content_field: tantivy::schema::Field,
    framework_field: tantivy::schema::Field,
    control_id_field: tantivy::schema::Field,
    owner_field: tantivy::schema::Field,
    review_date_field: tantivy::schema::Field,
    start_field: tantivy::schema::Field,
    end_field: tantivy::schema::Field,
    chunk_index_field: tantivy::schema::Field,
    total_chunks_field: tantivy::schema::Field,
}

impl TantivyKeywordIndex {
    /// Creates a fresh index directory, wiping any previous contents.
    pub fn create(index_dir: std::path::PathBuf) -> Result<Self> {
        let schema = build_schema();
        if index_dir.exists() {
            std::fs::remove_dir_all(&index_dir)?;
        }
        std::fs::create_dir_all(&index_dir)?;
        let index = Index::create_in_dir(&index_dir, schema)?;
        register_tokenizer(&index);
        Self::from_index(index)
    }

    /// Opens an existing index directory.
    pub fn open(index_dir: std::path::PathBuf) -> Result<Self> {
        let index = Index::open_in_dir(&index_dir)
            .with_context(|| format!("open keyword index at {}", index_dir.display()))?;
        register_tokenizer(&index);
        Self::from_index(index)
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        Ok(Self {
            id_field: schema.get_field("id")?,
            doc_id_field: schema.get_field("doc_id")?,
            content_field: schema.get_field("content")?,
            framework_field: schema.get_field("framework")?,
            control_id_field: schema.get_field("control_id")?,
            owner_field: schema.get_field("owner")?,
            review_date_field: schema.get_field("review_date")?,
            start_field: schema.get_field("start")?,
            end_field: schema.get_field("end")?,
            chunk_index_field: schema.get_field("chunk_index")?,
            total_chunks_field: schema.get_field("total_chunks")?,
            index,
        })
    }

    fn build_query(&self, query: &str, filter: Option<&MetadataFilter>) -> Box<dyn Query> {
        let qp = QueryParser::for_index(&self.index, vec![self.content_field]);
        // Queries are raw user input, not tantivy syntax; an unbalanced
        // quote or stray operator must not error out the whole path.
        let (parsed, _syntax_errors) = qp.parse_query_lenient(query);
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return parsed;
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, parsed)];
        let mut add_term = |field, value: &str| {
            let tq = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);
            clauses.push((Occur::Must, Box::new(tq)));
        };
        if let Some(fw) = &filter.framework {
            add_term(self.framework_field, fw);
        }
        if let Some(cid) = &filter.control_id {
            add_term(self.control_id_field, cid);
        }
        if let Some(owner) = &filter.owner {
            add_term(self.owner_field, owner);
        }
        Box::new(BooleanQuery::new(clauses))
    }

    fn chunk_from_doc(&self, doc: &TantivyDocument) -> Chunk {
        let text_of = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let num_of = |field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let opt_of = |field| {
            let s = text_of(field);
            if s.is_empty() { None } else { Some(s) }
        };
        Chunk {
            id: text_of(self.id_field),
            doc_id: text_of(self.doc_id_field),
            start: num_of(self.start_field),
            end: num_of(self.end_field),
            text: text_of(self.content_field),
            embedding: None,
            chunk_index: num_of(self.chunk_index_field),
            total_chunks: num_of(self.total_chunks_field),
            meta: DocumentMeta {
                framework: text_of(self.framework_field),
                control_id: opt_of(self.control_id_field),
                owner: opt_of(self.owner_field),
                review_date: opt_of(self.review_date_field),
            },
        }
    }
}

#[async_trait]
impl KeywordIndex for TantivyKeywordIndex {
    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let mut index_writer = self.index.writer(50_000_000)?;
        for c in chunks {
            let d = doc!(
                self.id_field => c.id.clone(),
                self.doc_id_field => c.doc_id.clone(),
                self.content_field => c.text.clone(),
                self.framework_field => c.meta.framework.clone(),
                self.control_id_field => c.meta.control_id.clone().unwrap_or_default(),
                self.owner_field => c.meta.owner.clone().unwrap_or_default(),
                self.review_date_field => c.meta.review_date.clone().unwrap_or_default(),
                self.start_field => c.start as u64,
                self.end_field => c.end as u64,
                self.chunk_index_field => c.chunk_index as u64,
                self.total_chunks_field => c.total_chunks as u64,
            );
            index_writer.add_document(d)?;
        }
        index_writer.commit()?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let q = self.build_query(query, filter);
        let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
        let mut hits = Vec::new();
        for (rank, (score, addr)) in top_docs.into_iter().enumerate() {
            let d: TantivyDocument = searcher.doc(addr)?;
            let chunk_id = d
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            hits.push(RetrievalResult { chunk_id, score, path: RetrievalPath::Keyword, rank });
        }
        Ok(hits)
    }

    async fn fetch(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            let tq = TermQuery::new(
                Term::from_field_text(self.id_field, id),
                IndexRecordOption::Basic,
            );
            let top = searcher.search(&tq, &TopDocs::with_limit(1))?;
            if let Some((_, addr)) = top.into_iter().next() {
                let d: TantivyDocument = searcher.doc(addr)?;
                chunks.push(self.chunk_from_doc(&d));
            }
        }
        Ok(chunks)
    }
}
