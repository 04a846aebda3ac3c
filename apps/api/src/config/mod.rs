use crate::error::Result;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

const ENV_PREFIX: &str = "APP";

/// Runtime configuration, assembled from defaults overlaid by `APP_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub database_url: String,
    pub database_max_connections: u32,

    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub completion_model: String,

    /// Location of the persisted embedding index snapshot.
    pub index_path: PathBuf,
    /// Pause between consecutive embedding calls while rebuilding the index.
    pub embed_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Number of candidates handed to the language model.
    pub recommendation_count: usize,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `APP_OPENAI_API_KEY` and `APP_DATABASE_URL` have no defaults and must be set.
    pub fn load() -> Result<Self> {
        Self::from_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: ::config::Source + Send + Sync + 'static,
    {
        let config = ::config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 4000)?
            .set_default("database_max_connections", 5)?
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("embedding_model", "text-embedding-3-small")?
            .set_default("completion_model", "gpt-4")?
            .set_default("index_path", "data/embedded_strains.json")?
            .set_default("embed_delay_ms", 100)?
            .set_default("request_timeout_secs", 30)?
            .set_default("connect_timeout_secs", 10)?
            .set_default("recommendation_count", 5)?
            .add_source(source)
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn embed_delay(&self) -> Duration {
        Duration::from_millis(self.embed_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
