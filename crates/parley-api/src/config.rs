use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub mongodb: MongoDbConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: String,
    #[serde(default)]
    pub llm_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
    pub pool_size: u32,
    pub timeout_ms: u64,
}

impl MongoDbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the caller id, set by the fronting identity proxy
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
        }
    }
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub upload_preset: Option<String>,
    #[serde(default = "default_upload_folder")]
    pub folder: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            upload_preset: None,
            folder: default_upload_folder(),
        }
    }
}

fn default_upload_folder() -> String {
    "chat-uploads".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `PARLEY_`-prefixed environment variables, `__` between path
    ///    segments (`PARLEY_SERVER__PORT=9000`, `PARLEY_LLM__MODEL=...`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.origins"),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.apply_secrets(|key| std::env::var(key).ok())?;

        Ok(cfg)
    }

    /// Fill secrets that never live in TOML
    ///
    /// `MONGODB_URI` and an LLM key are required. The key is read from
    /// `LLM_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`.
    pub fn apply_secrets<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.mongodb_uri = present("MONGODB_URI").ok_or_else(|| {
            ConfigError::Message("MONGODB_URI environment variable is required".to_string())
        })?;

        self.llm_api_key = ["LLM_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| present(key))
            .ok_or_else(|| {
                ConfigError::Message(
                    "LLM_API_KEY (or GEMINI_API_KEY / OPENAI_API_KEY) environment variable is required".to_string(),
                )
            })?;

        if self.upload.cloud_name.is_none() {
            self.upload.cloud_name = present("CLOUDINARY_URL").and_then(|url| cloud_name_from_url(&url));
        }
        if self.upload.upload_preset.is_none() {
            self.upload.upload_preset = present("CLOUDINARY_UPLOAD_PRESET");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_secs)
    }
}

/// Cloud name from `cloudinary://<key>:<secret>@<cloud_name>`
pub fn cloud_name_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once('@')?;
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '/' | '?' | '#'))
        .collect();

    (!name.is_empty()).then_some(name)
}
