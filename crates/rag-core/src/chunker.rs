use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::ChunkStore;
use crate::types::Document;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 450, overlap: 50 }
    }
}

/// Word-window chunker feeding the [`ChunkStore`].
#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.max_words == 0 || config.overlap >= config.max_words {
            return Err(crate::Error::Config(format!(
                "chunking needs max_words > overlap (got {} / {})",
                config.max_words, config.overlap
            ))
            .into());
        }
        Ok(Self { config })
    }

    /// Split `text` into overlapping windows of whitespace-separated words.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.config.max_words - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + self.config.max_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Chunk every `*.txt` file under `data_dir` into `store`. Returns the number of documents added.
    pub fn process_directory(&self, data_dir: &Path, store: &mut ChunkStore) -> Result<usize> {
        self.process_directory_limited(data_dir, usize::MAX, store)
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize, store: &mut ChunkStore) -> Result<usize> {
        let mut files = list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(0);
        }
        if files.len() > limit {
            files.truncate(limit);
            tracing::info!(limit, "limited ingestion to first files");
        }
        let mut added = 0usize;
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), n = file_index + 1, of = files.len(), "chunking");
            let content = read_file_content(file_path)?;
            let chunks = self.chunk_text(&content);
            if chunks.is_empty() {
                tracing::debug!(file = %file_path.display(), "empty document skipped");
                continue;
            }
            let doc = Document {
                title: file_path.file_stem().map(|s| s.to_string_lossy().to_string()),
                ..Document::new(file_path.to_string_lossy())
            };
            store.add_document(doc, chunks)?;
            added += 1;
        }
        tracing::info!(documents = added, chunks = store.len(), "chunking finished");
        Ok(added)
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap() {
        let chunker = Chunker::new(ChunkingConfig { max_words: 4, overlap: 1 }).unwrap();
        let chunks = chunker.chunk_text("a b c d e f g");
        assert_eq!(chunks, vec!["a b c d", "d e f g"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = Chunker::default();
        assert_eq!(chunker.chunk_text("just a few words"), vec!["just a few words"]);
        assert!(chunker.chunk_text("   \n ").is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(Chunker::new(ChunkingConfig { max_words: 3, overlap: 3 }).is_err());
    }
}
