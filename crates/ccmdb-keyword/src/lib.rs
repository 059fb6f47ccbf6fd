//! ccmdb-keyword
//!
//! Tantivy-backed lexical (BM25) retrieval path. See `schema` for the
//! index layout and `index` for the `KeywordIndex` implementation.

pub mod index;
pub mod schema;

pub use index::TantivyKeywordIndex;
