use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let mut config: Config =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;

        // Secrets may be supplied via the environment instead of the file.
        if let Ok(key) = std::env::var("MEDIARELAY_STORAGE_KEY") {
            config.storage.service_key = key;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Map a table name back to its route target (for result lookup).
    pub fn target_for_table(&self, table: &str) -> Option<&Target> {
        [
            &self.targets.tiktok,
            &self.targets.youtube,
            &self.targets.tiktok_audio,
            &self.targets.images,
        ]
        .into_iter()
        .find(|t| t.table == table)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL result links are built against, e.g. "https://dl.example.com".
    #[serde(default = "default_public_base")]
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Base URL of the hosted storage/datastore service.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_tikwm_base")]
    pub tikwm_base: String,
    #[serde(default = "default_cobalt_mirrors")]
    pub cobalt_mirrors: Vec<String>,
    #[serde(default = "default_oembed_base")]
    pub oembed_base: String,
    #[serde(default = "default_image_base")]
    pub image_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            tikwm_base: default_tikwm_base(),
            cobalt_mirrors: default_cobalt_mirrors(),
            oembed_base: default_oembed_base(),
            image_base: default_image_base(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Bucket/table pair a route persists into.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub bucket: String,
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Targets {
    #[serde(default = "default_tiktok_target")]
    pub tiktok: Target,
    #[serde(default = "default_youtube_target")]
    pub youtube: Target,
    #[serde(default = "default_tiktok_audio_target")]
    pub tiktok_audio: Target,
    #[serde(default = "default_images_target")]
    pub images: Target,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            tiktok: default_tiktok_target(),
            youtube: default_youtube_target(),
            tiktok_audio: default_tiktok_audio_target(),
            images: default_images_target(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WatermarkConfig {
    /// Path to the watermark image composited onto generated images.
    /// Missing file degrades to unwatermarked output.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_base() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_tikwm_base() -> String {
    "https://www.tikwm.com".to_string()
}

fn default_cobalt_mirrors() -> Vec<String> {
    vec!["https://api.cobalt.tools".to_string()]
}

fn default_oembed_base() -> String {
    "https://www.youtube.com/oembed".to_string()
}

fn default_image_base() -> String {
    "https://image.pollinations.ai/prompt".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_tiktok_target() -> Target {
    Target {
        bucket: "tiktok-media".to_string(),
        table: "tiktok_downloads".to_string(),
    }
}

fn default_youtube_target() -> Target {
    Target {
        bucket: "youtube-media".to_string(),
        table: "youtube_downloads".to_string(),
    }
}

fn default_tiktok_audio_target() -> Target {
    Target {
        bucket: "tiktok-audio".to_string(),
        table: "tiktok_audio_downloads".to_string(),
    }
}

fn default_images_target() -> Target {
    Target {
        bucket: "generated-images".to_string(),
        table: "generated_images".to_string(),
    }
}
