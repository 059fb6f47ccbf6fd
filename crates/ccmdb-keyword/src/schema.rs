use tantivy::schema::{
    IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let _id_field = schema_builder.add_text_field("id", STRING | STORED);
    let _doc_id_field = schema_builder.add_text_field("doc_id", STRING | STORED);
    let content_indexing = TextFieldIndexing::default()
        .set_tokenizer("content_with_stopwords")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let content_options = TextOptions::default()
        .set_indexing_options(content_indexing)
        .set_stored();
    let _content_field = schema_builder.add_text_field("content", content_options);
    let _framework_field = schema_builder.add_text_field("framework", STRING | STORED);
    let _control_id_field = schema_builder.add_text_field("control_id", STRING | STORED);
    let _owner_field = schema_builder.add_text_field("owner", STRING | STORED);
    let _review_date_field = schema_builder.add_text_field("review_date", STRING | STORED);
    let _start_field = schema_builder.add_u64_field("start", STORED);
    let _end_field = schema_builder.add_u64_field("end", STORED);
    let _chunk_index_field = schema_builder.add_u64_field("chunk_index", STORED);
    let _total_chunks_field = schema_builder.add_u64_field("total_chunks", STORED);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let stop_words = vec![
        "a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
    ];
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
        .build();
    index.tokenizers().register("content_with_stopwords", tokenizer);
}
