//! Source document reading and chunk extraction
//!
//! PDFs yield one chunk per page; plain text and Markdown are packed into
//! paragraph chunks of roughly `chunk_size` characters. Chunking is
//! deterministic for the same input file, which keeps ledger semantics
//! meaningful across runs.

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

/// Extracts text chunks from a raw document file
pub struct DocumentReader {
    chunking: ChunkingConfig,
}

impl DocumentReader {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self { chunking }
    }

    /// Whether a path has an extension this reader understands
    pub fn is_supported(path: &Path) -> bool {
        matches!(
            extension_of(path).as_str(),
            "pdf" | "txt" | "text" | "md" | "markdown"
        )
    }

    /// Extract chunks from one source file.
    ///
    /// A file with no extractable text yields an empty vector, not an error;
    /// an unreadable or unparseable file is a `Read` error for this source
    /// only and must not abort the batch.
    pub fn read(&self, path: &Path, source_id: &str) -> Result<Vec<Chunk>> {
        match extension_of(path).as_str() {
            "pdf" => self.read_pdf(path, source_id),
            "txt" | "text" | "md" | "markdown" => self.read_text(path, source_id),
            other => Err(Error::read(
                source_id,
                format!("unsupported file type '{other}'"),
            )),
        }
    }

    /// One chunk per page with non-empty text
    fn read_pdf(&self, path: &Path, source_id: &str) -> Result<Vec<Chunk>> {
        let data = std::fs::read(path).map_err(|e| Error::read(source_id, e.to_string()))?;

        let pages = pdf_extract::extract_text_from_mem_by_pages(&data)
            .map_err(|e| Error::read(source_id, format!("PDF extraction failed: {e}")))?;

        let mut chunks = Vec::new();
        for page in &pages {
            let text = normalize_text(page);
            if text.is_empty() {
                continue;
            }
            chunks.push(Chunk::new(text, source_id, chunks.len() as u32));
        }
        Ok(chunks)
    }

    /// Paragraphs packed into chunks of roughly `chunk_size` characters
    fn read_text(&self, path: &Path, source_id: &str) -> Result<Vec<Chunk>> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::read(source_id, e.to_string()))?;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current = String::new();

        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if !current.is_empty()
                && current.len() + paragraph.len() + 2 > self.chunking.chunk_size
            {
                self.push_chunk(&mut chunks, &mut current, source_id);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        self.push_chunk(&mut chunks, &mut current, source_id);

        Ok(chunks)
    }

    fn push_chunk(&self, chunks: &mut Vec<Chunk>, current: &mut String, source_id: &str) {
        let text = std::mem::take(current);
        if text.len() >= self.chunking.min_chunk_size {
            chunks.push(Chunk::new(text, source_id, chunks.len() as u32));
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Strip null bytes and collapse blank lines left behind by PDF extraction
fn normalize_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
