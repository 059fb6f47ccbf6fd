//! Arrow schema for the chunk table and the chunk → RecordBatch
//! conversion used at index time.

use std::sync::Arc;

use anyhow::{bail, Result};
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};

use ccmdb_core::types::Chunk;

pub fn chunk_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("framework", DataType::Utf8, false),
        Field::new("control_id", DataType::Utf8, false),
        Field::new("owner", DataType::Utf8, false),
        Field::new("review_date", DataType::Utf8, false),
        Field::new("start", DataType::UInt64, false),
        Field::new("end", DataType::UInt64, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("total_chunks", DataType::UInt64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

pub fn chunks_to_batch(chunks: &[Chunk], dim: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(chunks.len());
    let mut doc_ids = Vec::with_capacity(chunks.len());
    let mut contents = Vec::with_capacity(chunks.len());
    let mut frameworks = Vec::with_capacity(chunks.len());
    let mut control_ids = Vec::with_capacity(chunks.len());
    let mut owners = Vec::with_capacity(chunks.len());
    let mut review_dates = Vec::with_capacity(chunks.len());
    let mut starts = Vec::with_capacity(chunks.len());
    let mut ends = Vec::with_capacity(chunks.len());
    let mut chunk_indices = Vec::with_capacity(chunks.len());
    let mut totals = Vec::with_capacity(chunks.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());

    for c in chunks {
        let Some(embedding) = &c.embedding else {
            bail!("chunk {} has no embedding; run the embedding step before indexing", c.id);
        };
        if embedding.len() != dim {
            bail!(
                "chunk {} embedding has dim {}, table expects {}",
                c.id,
                embedding.len(),
                dim
            );
        }
        ids.push(c.id.clone());
        doc_ids.push(c.doc_id.clone());
        contents.push(c.text.clone());
        frameworks.push(c.meta.framework.clone());
        control_ids.push(c.meta.control_id.clone().unwrap_or_default());
        owners.push(c.meta.owner.clone().unwrap_or_default());
        review_dates.push(c.meta.review_date.clone().unwrap_or_default());
        starts.push(c.start as u64);
        ends.push(c.end as u64);
        chunk_indices.push(c.chunk_index as u64);
        totals.push(c.total_chunks as u64);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }

    let batch = RecordBatch::try_new(
        chunk_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(frameworks)),
            Arc::new(StringArray::from(control_ids)),
            Arc::new(StringArray::from(owners)),
            Arc::new(StringArray::from(review_dates)),
            Arc::new(UInt64Array::from(starts)),
            Arc::new(UInt64Array::from(ends)),
            Arc::new(UInt64Array::from(chunk_indices)),
            Arc::new(UInt64Array::from(totals)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                vectors.into_iter(),
                dim as i32,
            )),
        ],
    )?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccmdb_core::types::DocumentMeta;

    fn chunk(id: &str, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            id: id.to_string(),
            doc_id: "d".to_string(),
            start: 0,
            end: 4,
            text: "text".to_string(),
            embedding,
            chunk_index: 0,
            total_chunks: 1,
            meta: DocumentMeta::default(),
        }
    }

    #[test]
    fn missing_embedding_is_rejected() {
        let err = chunks_to_batch(&[chunk("c:0", None)], 4).unwrap_err();
        assert!(err.to_string().contains("no embedding"));
    }

    #[test]
    fn wrong_dim_is_rejected() {
        let err = chunks_to_batch(&[chunk("c:0", Some(vec![0.0; 3]))], 4).unwrap_err();
        assert!(err.to_string().contains("dim"));
    }

    #[test]
    fn batch_row_count_matches_chunks() {
        let batch = chunks_to_batch(
            &[chunk("c:0", Some(vec![0.1; 4])), chunk("c:1", Some(vec![0.2; 4]))],
            4,
        )
        .expect("batch");
        assert_eq!(batch.num_rows(), 2);
    }
}
