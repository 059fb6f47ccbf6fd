//! ccmdb-vector
//!
//! LanceDB-backed nearest-neighbor retrieval path. Chunks arrive with
//! their embeddings already computed; this crate only stores and
//! searches them.

pub mod index;
pub mod schema;

pub use index::LanceVectorIndex;
