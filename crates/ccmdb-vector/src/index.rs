use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::path::Path;

use arrow_array::RecordBatchIterator;

use ccmdb_core::traits::VectorIndex;
use ccmdb_core::types::{MetadataFilter, RetrievalPath, RetrievalResult};

use crate::schema::chunks_to_batch;

pub struct LanceVectorIndex {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceVectorIndex {
    pub async fn connect(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        let db = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .with_context(|| format!("connect to lancedb at {}", db_path.display()))?;
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// SQL predicate for LanceDB's `only_if` pushdown. Values are
    /// single-quote escaped.
    fn filter_predicate(filter: &MetadataFilter) -> Option<String> {
        let mut terms = Vec::new();
        let quote = |v: &str| format!("'{}'", v.replace('\'', "''"));
        if let Some(fw) = &filter.framework {
            terms.push(format!("framework = {}", quote(fw)));
        }
        if let Some(cid) = &filter.control_id {
            terms.push(format!("control_id = {}", quote(cid)));
        }
        if let Some(owner) = &filter.owner {
            terms.push(format!("owner = {}", quote(owner)));
        }
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" AND "))
        }
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn index(&self, chunks: &[ccmdb_core::types::Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let batch = chunks_to_batch(chunks, self.dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.db.table_names().execute().await?.contains(&self.table_name) {
            self.db
                .open_table(&self.table_name)
                .execute()
                .await?
                .add(reader)
                .execute()
                .await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != self.dim {
            return Err(anyhow!(
                "query vector has dim {}, table expects {}",
                query_vec.len(),
                self.dim
            ));
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut query = table.vector_search(query_vec.to_vec())?.limit(k);
        if let Some(pred) = filter.and_then(Self::filter_predicate) {
            query = query.only_if(pred);
        }
        let mut stream = query.execute().await?;

        let mut hits = Vec::new();
        while let Some(batch) = TryStreamExt::try_next(&mut stream).await? {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<arrow_array::StringArray>())
                .ok_or_else(|| anyhow!("result batch is missing the id column"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<arrow_array::Float32Array>());
            for i in 0..batch.num_rows() {
                // LanceDB reports L2/cosine distance; flip it so higher is better.
                let score = distances.map_or(0.5, |d| 1.0 - d.value(i));
                hits.push(RetrievalResult {
                    chunk_id: ids.value(i).to_string(),
                    score,
                    path: RetrievalPath::Vector,
                    rank: 0,
                });
            }
        }
        hits.truncate(k);
        for (rank, h) in hits.iter_mut().enumerate() {
            h.rank = rank;
        }
        Ok(hits)
    }
}
