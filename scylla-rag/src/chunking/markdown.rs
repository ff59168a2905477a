//! Structural chunking along markdown section headers.

use async_trait::async_trait;

use super::Chunker;
use super::split::{SEPARATORS, split_to_fit};
use crate::document::{Chunk, Document};
use crate::error::Result;

/// Splits text by markdown headers, keeping each section as a chunk.
///
/// Each section is prefixed with its header hierarchy and no sections are
/// merged. Sections exceeding `max_chunk_size` characters are further split
/// on paragraph, sentence, then word boundaries. The `header_path` metadata
/// field records the header hierarchy for each chunk.
///
/// # Example
///
/// ```rust,ignore
/// use scylla_rag::MarkdownChunker;
///
/// let chunker = MarkdownChunker::new(2048);
/// let chunks = chunker.chunk(&document).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    max_chunk_size: usize,
}

impl MarkdownChunker {
    /// Create a new `MarkdownChunker` producing chunks of at most
    /// `max_chunk_size` characters.
    pub fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }
}

/// A markdown section with its header hierarchy and body text.
#[derive(Debug, PartialEq)]
struct MarkdownSection {
    header_path: String,
    text: String,
}

/// Return the level and title of an ATX header line (`# Title` .. `###### Title`).
fn parse_header(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

/// Parse markdown text into sections split by headers.
///
/// Lines inside fenced code blocks are never treated as headers.
fn parse_markdown_sections(text: &str) -> Vec<MarkdownSection> {
    let mut sections = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut current_body = String::new();
    let mut current_header_path = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_code_block = !in_code_block;
        }

        let header = if in_code_block { None } else { parse_header(line) };
        if let Some((level, title)) = header {
            if !current_body.trim().is_empty() || !current_header_path.is_empty() {
                sections.push(MarkdownSection {
                    header_path: current_header_path.clone(),
                    text: current_body.trim().to_string(),
                });
            }
            current_body.clear();

            headers.truncate(level.saturating_sub(1));
            headers.push(title.to_string());
            current_header_path = headers.join(" > ");
        } else {
            if !current_body.is_empty() {
                current_body.push('\n');
            }
            current_body.push_str(line);
        }
    }

    if !current_body.trim().is_empty() || !current_header_path.is_empty() {
        sections.push(MarkdownSection {
            header_path: current_header_path,
            text: current_body.trim().to_string(),
        });
    }

    sections
}

#[async_trait]
impl Chunker for MarkdownChunker {
    async fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for section in parse_markdown_sections(&document.text) {
            let section_text = match (section.header_path.is_empty(), section.text.is_empty()) {
                (true, _) => section.text,
                (false, true) => section.header_path.clone(),
                (false, false) => format!("{}\n{}", section.header_path, section.text),
            };

            for text in split_to_fit(&section_text, self.max_chunk_size, SEPARATORS) {
                let mut chunk = Chunk::from_document(document, chunks.len(), text);
                chunk.metadata.insert("header_path".to_string(), section.header_path.clone());
                chunks.push(chunk);
            }
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_headers_build_a_path() {
        let sections = parse_markdown_sections("# Guide\nintro\n## Install\nrun it\n# FAQ\nask");
        let paths: Vec<&str> = sections.iter().map(|s| s.header_path.as_str()).collect();
        assert_eq!(paths, vec!["Guide", "Guide > Install", "FAQ"]);
        assert_eq!(sections[1].text, "run it");
    }

    #[test]
    fn hash_lines_in_code_fences_are_not_headers() {
        let text = "# Setup\n```bash\n# install deps\npip install x\n```\ndone";
        let sections = parse_markdown_sections(text);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("# install deps"));
    }

    #[test]
    fn hashtags_are_not_headers() {
        assert_eq!(parse_header("#rust is fun"), None);
        assert_eq!(parse_header("### Title ###"), Some((3, "Title")));
        assert_eq!(parse_header("####### too deep"), None);
    }

    #[tokio::test]
    async fn one_chunk_per_section_with_header_metadata() {
        let doc = Document::new("guide", "preamble\n# A\nalpha\n## B\nbeta");
        let chunks = MarkdownChunker::new(2048).chunk(&doc).await.unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["preamble", "A\nalpha", "A > B\nbeta"]);
        assert_eq!(chunks[2].metadata["header_path"], "A > B");
        assert_eq!(chunks[2].id, "guide_2");
        assert_eq!(chunks[2].ordinal, 2);
    }

    #[tokio::test]
    async fn oversized_sections_respect_max_size() {
        let body = "word ".repeat(200);
        let doc = Document::new("long", format!("# Big\n{body}"));
        let chunks = MarkdownChunker::new(100).chunk(&doc).await.unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.size() <= 100));
        assert!(chunks.iter().all(|c| c.metadata["header_path"] == "Big"));
    }
}
