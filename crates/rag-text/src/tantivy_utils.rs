use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

pub const CHUNK_TOKENIZER: &str = "chunk_text";
pub const CHUNK_ID_FIELD: &str = "chunk_id";
pub const TEXT_FIELD: &str = "text";

/// Two fields: the lexical row id and the chunk text. Document identity lives
/// in the chunk store, not here.
///
/// `with_freqs = false` indexes presence only; such an index cannot rank by BM25.
pub fn build_schema(with_freqs: bool) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_u64_field(CHUNK_ID_FIELD, INDEXED | STORED | FAST);
	let record = if with_freqs { IndexRecordOption::WithFreqsAndPositions } else { IndexRecordOption::Basic };
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(CHUNK_TOKENIZER).set_index_option(record);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

/// Alphanumeric runs, lowercased. Mirrors [`normalize_query`](crate::normalize_query)
/// so query terms and indexed terms agree.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(64))
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(CHUNK_TOKENIZER, tokenizer);
}

/// Whether the text field carries term frequencies (required for BM25).
pub fn has_term_freqs(schema: &Schema) -> bool {
	let Ok(field) = schema.get_field(TEXT_FIELD) else { return false };
	match schema.get_field_entry(field).field_type() {
		tantivy::schema::FieldType::Str(options) => options
			.get_indexing_options()
			.is_some_and(|indexing| indexing.index_option().has_freq()),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_records_frequency_choice() {
		assert!(has_term_freqs(&build_schema(true)));
		assert!(!has_term_freqs(&build_schema(false)));
	}
}
