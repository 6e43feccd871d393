use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use lost_found_core::catalogue::DEFAULT_KEY_PREFIX;
use lost_found_core::store::DEFAULT_MAX_ANY_OPERANDS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub blobs: BlobConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    pub root: PathBuf,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Public base URL; when unset, blobs are addressed with `file://` URLs.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_any_operands")]
    pub max_any_operands: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_any_operands: DEFAULT_MAX_ANY_OPERANDS,
        }
    }
}

fn default_max_any_operands() -> usize {
    DEFAULT_MAX_ANY_OPERANDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub fixed: Option<FixedClassifierConfig>,
    #[serde(default)]
    pub open: Option<OpenClassifierConfig>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            fixed: None,
            open: None,
        }
    }
}

fn default_mode() -> String {
    "disabled".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FixedClassifierConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_fixed_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_confidence: f32,
    /// Set when the model emits logits rather than probabilities.
    #[serde(default)]
    pub softmax: bool,
}

fn default_input_size() -> u32 {
    224
}
fn default_fixed_top_k() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenClassifierConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_open_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_confidence: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            top_k: default_open_top_k(),
            min_confidence: 0.0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_VISION_API_KEY".to_string()
}
fn default_open_top_k() -> usize {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl ClassifierConfig {
    pub fn uses_fixed(&self) -> bool {
        matches!(self.mode.as_str(), "fixed" | "composite")
    }

    pub fn uses_open(&self) -> bool {
        matches!(self.mode.as_str(), "open" | "composite")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.max_any_operands == 0 || config.search.max_any_operands > 30 {
        bail!("search.max_any_operands must be in 1..=30");
    }

    let classifier = &config.classifier;
    match classifier.mode.as_str() {
        "disabled" | "fixed" | "open" | "composite" => {}
        other => bail!(
            "Unknown classifier mode: '{}'. Must be disabled, fixed, open, or composite.",
            other
        ),
    }

    if classifier.uses_fixed() {
        let fixed = classifier.fixed.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "[classifier.fixed] is required when mode is '{}'",
                classifier.mode
            )
        })?;
        if fixed.input_size == 0 {
            bail!("classifier.fixed.input_size must be > 0");
        }
        check_ranking("classifier.fixed", fixed.top_k, fixed.min_confidence)?;
    }

    if classifier.uses_open() {
        let open = classifier.open.clone().unwrap_or_default();
        check_ranking("classifier.open", open.top_k, open.min_confidence)?;
    }

    Ok(())
}

fn check_ranking(section: &str, top_k: usize, min_confidence: f32) -> Result<()> {
    if top_k == 0 {
        bail!("{}.top_k must be >= 1", section);
    }
    if !(0.0..1.0).contains(&min_confidence) {
        bail!("{}.min_confidence must be in [0.0, 1.0)", section);
    }
    Ok(())
}
