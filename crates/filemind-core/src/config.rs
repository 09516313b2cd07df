//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_INDEX__PATH`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::walk::{WalkRules, DEFAULT_EXCLUDED_DIRS};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The fully merged, validated settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub chunking: ChunkingConfig,
    pub indexing: IndexingSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        let positive = [
            ("indexing.max_chunks_per_file", self.indexing.max_chunks_per_file),
            ("indexing.progress_every", self.indexing.progress_every),
            ("indexing.embed_concurrency", self.indexing.embed_concurrency),
            ("indexing.event_buffer", self.indexing.event_buffer),
            ("embedding.max_input_chars", self.embedding.max_input_chars),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{key} must be > 0")));
            }
        }
        if self.embedding.timeout_secs == 0 || self.chat.timeout_secs == 0 {
            return Err(Error::InvalidConfig("provider timeouts must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { path: "~/.filemind/index.json".to_string() }
    }
}

impl IndexSettings {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    /// Documents with fewer extracted characters are not embedded.
    pub min_text_chars: usize,
    /// Chunks beyond this bound are dropped per file.
    pub max_chunks_per_file: usize,
    pub progress_every: usize,
    pub embed_concurrency: usize,
    pub event_buffer: usize,
    pub excluded_dirs: Vec<String>,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            max_chunks_per_file: 20,
            progress_every: 5,
            embed_concurrency: 4,
            event_buffer: 64,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IndexingSettings {
    pub fn walk_rules(&self) -> WalkRules {
        WalkRules::new(self.excluded_dirs.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
    pub max_retries: usize,
    /// Inputs are cut to this many characters (prefix kept) before embedding.
    pub max_input_chars: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
            max_retries: 3,
            max_input_chars: 8000,
        }
    }
}

impl EmbeddingSettings {
    pub fn api_key(&self) -> Option<String> {
        api_key_or_env(self.api_key.as_deref())
    }

    /// `APP_USE_FAKE_EMBEDDINGS=1` wins over the configured provider.
    pub fn effective_provider(&self) -> ProviderKind {
        let use_fake = env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if use_fake { ProviderKind::Fake } else { self.provider }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Document text handed to the model is cut to this many characters.
    pub max_document_chars: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: 0.2,
            max_tokens: 800,
            max_document_chars: 12_000,
        }
    }
}

impl ChatSettings {
    pub fn api_key(&self) -> Option<String> {
        api_key_or_env(self.api_key.as_deref())
    }
}

fn api_key_or_env(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
