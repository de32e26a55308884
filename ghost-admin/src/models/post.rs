use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A published post or page as returned by the Ghost Admin API.
///
/// Both resources share the same shape; [`crate::ContentKind`] tells them
/// apart at the client level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub plaintext: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub custom_excerpt: Option<String>,
    #[serde(default)]
    pub feature_image: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A tag attached to a post.
///
/// Ghost marks organisational tags either with `visibility: "internal"` or
/// with a `#` name prefix; consumers decide what to surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub total: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}
