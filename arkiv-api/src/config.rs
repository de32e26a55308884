use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use strum::{Display, EnumString};

use crate::domain::search::{IndexerConfig, RankerConfig, SearchConfig};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub ghost: GhostSettings,
    pub chroma: ChromaSettings,
    pub search: SearchSettings,
    pub indexing: IndexingSettings,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    /// Bearer token guarding the mutating routes.
    pub admin_token: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct GhostSettings {
    pub api_url: String,
    pub admin_api_key: String,
}

#[derive(Deserialize, Clone)]
pub struct ChromaSettings {
    pub tenant: String,
    pub database: String,
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_query_collection")]
    pub query_collection: String,
}

#[derive(Deserialize, Clone)]
pub struct SearchSettings {
    #[serde(default = "default_weight")]
    pub dense_query_weight: f64,
    #[serde(default = "default_weight")]
    pub sparse_query_weight: f64,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
    #[serde(default = "default_posts_per_page")]
    pub max_posts_per_page: usize,
}

#[derive(Deserialize, Clone)]
pub struct IndexingSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_collection() -> String {
    "posts".to_string()
}

fn default_query_collection() -> String {
    "queries".to_string()
}

fn default_weight() -> f64 {
    0.5
}

fn default_rrf_k() -> f64 {
    42.0
}

fn default_search_top_k() -> usize {
    10
}

fn default_posts_per_page() -> usize {
    10
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_poll_interval() -> u64 {
    3600
}

impl SearchSettings {
    pub fn ranker_config(&self) -> RankerConfig {
        RankerConfig {
            dense_weight: self.dense_query_weight,
            sparse_weight: self.sparse_query_weight,
            rrf_k: self.rrf_k,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            default_limit: self.search_top_k,
            max_limit: self.search_top_k,
        }
    }
}

impl IndexingSettings {
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

pub fn read_config() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let config_directory = base_path.join("config");

    let environment = Environment::from_str(
        std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .as_str(),
    )
    .expect("Failed to parse APP_ENVIRONMENT");
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(
            config_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("ARKIV")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    validate(&settings)?;

    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), config::ConfigError> {
    if settings.search.dense_query_weight == 0.0 && settings.search.sparse_query_weight == 0.0 {
        return Err(config::ConfigError::Message(
            "at least one of dense_query_weight or sparse_query_weight must be > 0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&settings.search.dense_query_weight)
        || !(0.0..=1.0).contains(&settings.search.sparse_query_weight)
    {
        return Err(config::ConfigError::Message(
            "query weights must be within [0, 1]".to_string(),
        ));
    }
    if settings.search.rrf_k <= 0.0 {
        return Err(config::ConfigError::Message(
            "rrf_k must be > 0".to_string(),
        ));
    }
    Ok(())
}

#[derive(Display, Debug, EnumString)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dense: f64, sparse: f64, k: f64) -> Settings {
        Settings {
            application: ApplicationSettings {
                port: 8000,
                host: "127.0.0.1".into(),
                admin_token: None,
            },
            ghost: GhostSettings {
                api_url: "https://example.com".into(),
                admin_api_key: "abc:00ff".into(),
            },
            chroma: ChromaSettings {
                tenant: "t".into(),
                database: "d".into(),
                api_key: "k".into(),
                collection: default_collection(),
                query_collection: default_query_collection(),
            },
            search: SearchSettings {
                dense_query_weight: dense,
                sparse_query_weight: sparse,
                rrf_k: k,
                search_top_k: 10,
                max_posts_per_page: 10,
            },
            indexing: IndexingSettings {
                chunk_size: 500,
                chunk_overlap: 50,
                poll_interval_seconds: 3600,
            },
        }
    }

    #[test]
    fn rejects_both_weights_zero() {
        assert!(validate(&settings(0.0, 0.0, 42.0)).is_err());
        assert!(validate(&settings(0.5, 0.0, 42.0)).is_ok());
        assert!(validate(&settings(0.0, 0.5, 42.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(validate(&settings(1.5, 0.5, 42.0)).is_err());
        assert!(validate(&settings(0.5, 0.5, 0.0)).is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert!(matches!(
            Environment::from_str("LOCAL").unwrap(),
            Environment::Local
        ));
        assert!(matches!(
            Environment::from_str("production").unwrap(),
            Environment::Production
        ));
        assert!(Environment::from_str("staging").is_err());
    }
}
