//! Splits normalized documents into retrieval-sized chunks.

use sha2::{Digest, Sha256};

use super::types::{Chunk, ContentItem, ContentTag};

/// Deterministic chunker: identical input always yields identical chunk
/// text, count and ordering, so content hashes stay meaningful for diffing.
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Word budget per chunk.
    chunk_size: usize,
    /// Overlapping words between windows of an oversized paragraph.
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Chunk a content item into ordered units plus the parent content hash.
    ///
    /// Returns `([], None)` when the item has no indexable text; the caller
    /// must then de-index any existing entry for the item's key.
    pub fn chunk(&self, item: &ContentItem) -> (Vec<Chunk>, Option<String>) {
        let markdown = match normalized_text(item) {
            Some(text) => text,
            None => return (vec![], None),
        };

        let mut units = self.chunk_by_paragraphs(&markdown);

        if units.is_empty() {
            let trimmed = markdown.trim();
            if trimmed.is_empty() {
                return (vec![], None);
            }
            // No paragraph boundaries at all: hard-truncate to a single
            // deterministic unit rather than dropping the document.
            units = vec![truncate_chars(trimmed, self.chunk_size * 5)];
        }

        let content_hash = hash_units(&units);
        let prefix = embed_prefix(item);
        let total = units.len() as u32;

        let chunks = units
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                embed_text: format!("{}\n\n{}", prefix, text),
                text,
                index: index as u32,
                total,
            })
            .collect();

        (chunks, Some(content_hash))
    }

    /// Pack paragraphs into word-budgeted chunks; paragraphs wider than the
    /// budget are windowed with `chunk_size - chunk_overlap` stride (floored
    /// at one word so progress is guaranteed even when overlap >= size).
    fn chunk_by_paragraphs(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<&str> = text
            .trim()
            .split("\n\n")
            .flat_map(|p| p.split("\r\n\r\n"))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_word_count = 0;

        for paragraph in paragraphs {
            let words: Vec<&str> = paragraph.split_whitespace().collect();

            if words.len() > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(current.join(" "));
                    current.clear();
                    current_word_count = 0;
                }

                let stride = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
                let mut start = 0;
                while start < words.len() {
                    let end = (start + self.chunk_size).min(words.len());
                    chunks.push(words[start..end].join(" "));
                    if end == words.len() {
                        break;
                    }
                    start += stride;
                }
            } else if current_word_count + words.len() > self.chunk_size {
                chunks.push(current.join(" "));
                current = vec![paragraph];
                current_word_count = words.len();
            } else {
                current.push(paragraph);
                current_word_count += words.len();
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

/// Normalized document text: HTML converted to markdown when present,
/// plaintext otherwise.
fn normalized_text(item: &ContentItem) -> Option<String> {
    if let Some(html) = item.html.as_deref() {
        if !html.trim().is_empty() {
            return Some(html_to_markdown(html));
        }
    }
    item.plaintext
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// Convert HTML to markdown, falling back to tag stripping.
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| strip_html(html))
}

/// Strip HTML tags and decode common entities. Fallback path only.
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut inside_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => inside_tag = true,
            '>' => inside_tag = false,
            _ if !inside_tag => result.push(ch),
            _ => {}
        }
    }

    let result = result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .replace("&#39;", "'");

    result.trim().to_string()
}

/// Content hash over the ordered, newline-joined unit text. Change
/// detection only; individual chunks are not content-addressed.
fn hash_units(units: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(units.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity line prepended to every chunk's embedded text so single-chunk
/// retrieval carries the parent title and date.
fn embed_prefix(item: &ContentItem) -> String {
    match item.published_at {
        Some(published) => format!(
            "{}\n{} {} {}",
            item.title,
            published.day(),
            published.month(),
            published.year()
        ),
        None => item.title.clone(),
    }
}

/// Names of the item's public tags, in source order.
pub fn public_tag_names(tags: &[ContentTag]) -> Vec<String> {
    tags.iter()
        .filter(|tag| tag.is_public())
        .map(|tag| tag.name.clone())
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::types::ContentType;
    use time::macros::datetime;

    fn item(html: Option<&str>, plaintext: Option<&str>) -> ContentItem {
        ContentItem {
            id: "63f4b1c2".into(),
            slug: "test-post".into(),
            title: "Test Post".into(),
            html: html.map(Into::into),
            plaintext: plaintext.map(Into::into),
            url: "https://example.com/test-post/".into(),
            published_at: Some(datetime!(2024-03-02 08:00 UTC)),
            updated_at: Some(datetime!(2024-03-03 08:00 UTC)),
            tags: vec![
                ContentTag::new("essays", None),
                ContentTag::new("#internal", None),
            ],
            authors: vec!["Philip".into()],
            content_type: ContentType::Post,
        }
    }

    #[test]
    fn chunks_html_content() {
        let chunker = Chunker::new(500, 50);
        let (chunks, hash) = chunker.chunk(&item(
            Some("<p>First paragraph.</p><p>Second paragraph.</p>"),
            None,
        ));

        assert!(!chunks.is_empty());
        assert!(hash.is_some());
        assert!(chunks[0].text.contains("First paragraph"));
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, chunks.len() as u32);
    }

    #[test]
    fn falls_back_to_plaintext() {
        let chunker = Chunker::new(500, 50);
        let (chunks, hash) = chunker.chunk(&item(None, Some("Plain body text.")));

        assert_eq!(chunks.len(), 1);
        assert!(hash.is_some());
        assert_eq!(chunks[0].text, "Plain body text.");
    }

    #[test]
    fn empty_content_yields_nothing() {
        let chunker = Chunker::new(500, 50);
        let (chunks, hash) = chunker.chunk(&item(None, None));
        assert!(chunks.is_empty());
        assert!(hash.is_none());

        let (chunks, hash) = chunker.chunk(&item(Some("   "), Some("  \n ")));
        assert!(chunks.is_empty());
        assert!(hash.is_none());
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = Chunker::new(40, 10);
        let body = (0..30)
            .map(|i| format!("Paragraph number {} with a handful of words.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let post = item(None, Some(&body));

        let (first_chunks, first_hash) = chunker.chunk(&post);
        let (second_chunks, second_hash) = chunker.chunk(&post);

        assert_eq!(first_chunks, second_chunks);
        assert_eq!(first_hash, second_hash);
    }

    #[test]
    fn hash_tracks_body_not_metadata() {
        let chunker = Chunker::new(500, 50);
        let original = item(None, Some("Some body text."));

        let mut edited_body = original.clone();
        edited_body.plaintext = Some("Some body text!".into());

        let mut edited_author = original.clone();
        edited_author.authors = vec!["Someone Else".into()];

        let (_, original_hash) = chunker.chunk(&original);
        let (_, edited_hash) = chunker.chunk(&edited_body);
        let (_, author_hash) = chunker.chunk(&edited_author);

        assert_ne!(original_hash, edited_hash);
        assert_eq!(original_hash, author_hash);
    }

    #[test]
    fn long_paragraphs_are_windowed_with_overlap() {
        let chunk_size = 100;
        let overlap = 20;
        let chunker = Chunker::new(chunk_size, overlap);
        let words: Vec<String> = (0..450).map(|i| format!("w{}", i)).collect();
        let post = item(None, Some(&words.join(" ")));

        let (chunks, _) = chunker.chunk(&post);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.split_whitespace().count() <= chunk_size);
        }
        // Consecutive windows share `overlap` words.
        let first: Vec<&str> = chunks[0].text.split_whitespace().collect();
        let second: Vec<&str> = chunks[1].text.split_whitespace().collect();
        assert_eq!(&first[first.len() - overlap..], &second[..overlap]);
    }

    #[test]
    fn overlap_wider_than_size_still_terminates() {
        let chunker = Chunker::new(10, 15);
        let words: Vec<String> = (0..40).map(|i| format!("w{}", i)).collect();
        let post = item(None, Some(&words.join(" ")));

        let (chunks, _) = chunker.chunk(&post);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn embed_text_carries_title_and_date() {
        let chunker = Chunker::new(500, 50);
        let (chunks, _) = chunker.chunk(&item(None, Some("Body text.")));

        assert!(chunks[0].embed_text.starts_with("Test Post\n2 March 2024"));
        assert!(chunks[0].embed_text.ends_with("Body text."));
        assert_eq!(chunks[0].text, "Body text.");
    }

    #[test]
    fn embed_text_without_publish_date_is_title_only() {
        let chunker = Chunker::new(500, 50);
        let mut post = item(None, Some("Body text."));
        post.published_at = None;

        let (chunks, _) = chunker.chunk(&post);
        assert!(chunks[0].embed_text.starts_with("Test Post\n\n"));
    }

    #[test]
    fn public_tags_drop_internal_names() {
        let post = item(None, Some("Body"));
        assert_eq!(public_tag_names(&post.tags), vec!["essays".to_string()]);
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_html("a &amp; b"), "a & b");
    }
}
