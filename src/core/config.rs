use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(not(target_arch = "wasm32"))]
use std::fs;
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_data")]
    pub data_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Whoever the front end signs in as. Any string works.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default)]
    pub reading: ReadingConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReadingConfig {
    #[serde(default = "default_minutes_per_chapter")]
    pub minutes_per_chapter: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
    #[serde(default = "default_max_description_chars")]
    pub max_description_chars: usize,
    #[serde(default = "default_max_chapter_chars")]
    pub max_chapter_chars: usize,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Accepted image subtypes, e.g. `png` for `image/png`.
    #[serde(default = "default_image_types")]
    pub image_types: Vec<String>,
}

fn default_data() -> String {
    "data".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_user_id() -> String {
    "local-user".to_string()
}
fn default_author_name() -> String {
    "Young Author".to_string()
}
fn default_minutes_per_chapter() -> u32 {
    2
}
fn default_max_title_chars() -> usize {
    100
}
fn default_max_description_chars() -> usize {
    500
}
fn default_max_chapter_chars() -> usize {
    5000
}
fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_image_types() -> Vec<String> {
    ["png", "jpeg", "gif", "webp"].iter().map(|s| s.to_string()).collect()
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            minutes_per_chapter: default_minutes_per_chapter(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_title_chars: default_max_title_chars(),
            max_description_chars: default_max_description_chars(),
            max_chapter_chars: default_max_chapter_chars(),
            max_image_bytes: default_max_image_bytes(),
            image_types: default_image_types(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_folder: default_data(),
            output_folder: default_output(),
            user_id: default_user_id(),
            author_name: default_author_name(),
            reading: ReadingConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).context("Failed to parse config.yml")
    }

    /// Reads `config.yml` from the working directory, falling back to defaults
    /// when the file does not exist.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            log::info!("config.yml not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        Self::from_yaml(&content)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
