//! Maps raw store records into presentation-layer projections.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use super::types::{ChunkMetadata, PostSummary, RankedHit, SearchResult};

/// Excerpt budget for listings and single-document summaries.
pub const SUMMARY_EXCERPT_CHARS: usize = 200;
/// Excerpt budget for search hits.
pub const SEARCH_EXCERPT_CHARS: usize = 300;

/// Build a summary from a chunk's metadata plus an excerpt source text.
pub fn summary_from_metadata(metadata: &ChunkMetadata, excerpt_source: Option<&str>) -> PostSummary {
    PostSummary {
        id: metadata.post_id.clone(),
        slug: metadata.post_slug.clone(),
        title: metadata.post_title.clone(),
        excerpt: excerpt_source
            .map(|text| truncate_chars(text, SUMMARY_EXCERPT_CHARS))
            .filter(|text| !text.is_empty()),
        url: metadata.post_url.clone(),
        published_at: parse_datetime(metadata.published_at.as_deref()),
        updated_at: parse_datetime(metadata.updated_at.as_deref()),
        content_type: metadata.content_type,
        tags: filter_public_tag_names(split_comma_separated(&metadata.tags)),
        authors: split_comma_separated(&metadata.authors),
    }
}

/// Build a search result from a ranked hit. Hits without usable metadata
/// are skipped rather than erroring.
pub fn search_result_from_hit(hit: &RankedHit) -> Option<SearchResult> {
    let metadata = hit.metadata.as_ref()?;

    let excerpt = hit
        .document
        .as_deref()
        .map(|text| truncate_chars(text, SEARCH_EXCERPT_CHARS))
        .unwrap_or_default();

    Some(SearchResult {
        slug: metadata.post_slug.clone(),
        title: metadata.post_title.clone(),
        url: metadata.post_url.clone(),
        excerpt,
        relevance_score: hit.score,
        published_at: parse_datetime(metadata.published_at.as_deref()),
        content_type: metadata.content_type,
        tags: filter_public_tag_names(split_comma_separated(&metadata.tags)),
    })
}

/// Parse a stored RFC 3339 timestamp, tolerating and discarding junk.
pub fn parse_datetime(value: Option<&str>) -> Option<OffsetDateTime> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            debug!(value, "Discarding unparsable stored timestamp");
            None
        }
    }
}

/// Split a comma-joined stored list back into trimmed, non-empty parts.
pub fn split_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read-time re-application of the public-tag rule, in case legacy records
/// were indexed before tags were filtered.
pub fn filter_public_tag_names(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .filter(|tag| !tag.is_empty() && !tag.starts_with('#'))
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
