//! Application configuration for ArticleForge.
//!
//! User config lives at `~/.articleforge/articleforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArticleForgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "articleforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".articleforge";

// ---------------------------------------------------------------------------
// Config structs (matching articleforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenRouter (text generation) settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Search collaborator settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Page fetching and extraction settings.
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Orchestrator settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Fact classification call.
    #[serde(default)]
    pub distributor: StageProfile,

    /// Section drafting.
    #[serde(default)]
    pub producer: StageProfile,

    /// Fact-checking pass.
    #[serde(default)]
    pub verifier: StageProfile,

    /// Style normalization pass.
    #[serde(default)]
    pub stylist: StageProfile,
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used by every stage that does not override it.
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            default_model: default_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearXNG-compatible JSON search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Optional env var holding a bearer token for the search endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// HTTP timeout for search requests.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: None,
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_endpoint() -> String {
    "http://localhost:8888/search".into()
}
fn default_search_timeout() -> u64 {
    15
}

/// `[extractor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// HTTP timeout per page.
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,

    /// Pages larger than this are skipped.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,

    /// Allow fetching localhost and private-network addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extract_timeout(),
            max_response_bytes: default_max_response_bytes(),
            allow_private_hosts: false,
        }
    }
}

fn default_extract_timeout() -> u64 {
    10
}
fn default_max_response_bytes() -> u64 {
    5 * 1024 * 1024
}

/// What the run does when the search collaborator fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalFailureMode {
    /// Continue with no fragments.
    #[default]
    Degrade,
    /// Stop the run and return the fixed failure message.
    Abort,
}

/// How a failed section unit shows up in the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionFailureMode {
    /// Visible error placeholder in place of the content.
    #[default]
    Placeholder,
    /// Blank content, so the assembler leaves the section out.
    Omit,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum number of search results to extract.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Paragraphs at or below this trimmed length are not facts.
    #[serde(default = "default_min_fact_chars")]
    pub min_fact_chars: usize,

    /// Section units allowed to run at once (1 = sequential).
    #[serde(default = "default_section_concurrency")]
    pub section_concurrency: usize,

    /// Deadline for every external call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    #[serde(default)]
    pub on_retrieval_failure: RetrievalFailureMode,

    #[serde(default)]
    pub on_section_failure: SectionFailureMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_limit: default_fetch_limit(),
            min_fact_chars: default_min_fact_chars(),
            section_concurrency: default_section_concurrency(),
            call_timeout_secs: default_call_timeout(),
            on_retrieval_failure: RetrievalFailureMode::default(),
            on_section_failure: SectionFailureMode::default(),
        }
    }
}

fn default_fetch_limit() -> usize {
    6
}
fn default_min_fact_chars() -> usize {
    20
}
fn default_section_concurrency() -> usize {
    1
}
fn default_call_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Stage profiles
// ---------------------------------------------------------------------------

/// Data that configures one stage role. Unset optional fields fall back to
/// the role's own defaults when the prompt is rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageProfile {
    /// Overrides `[openrouter].default_model` for this stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    // Drafting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_words: Option<u32>,
    pub use_citations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_text: Option<String>,

    // Verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strictness: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_strategies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_critical_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_minor_error: Option<String>,

    // Styling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_line_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_check: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punctuation_check: Option<bool>,
    pub avoid_jargon: bool,
    pub simplify: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_rules: Vec<String>,

    /// Drafting criteria (kept last so it serializes as a trailing sub-table).
    pub criteria: CriteriaConfig,
}

/// `criteria` table inside a drafting profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    pub use_examples: bool,
    pub use_numerical_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_paragraphs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_paragraphs: Option<u32>,
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime orchestrator configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch_limit: usize,
    pub min_fact_chars: usize,
    pub section_concurrency: usize,
    /// Deadline applied to every external call.
    pub call_timeout: Duration,
    pub on_retrieval_failure: RetrievalFailureMode,
    pub on_section_failure: SectionFailureMode,
    /// Model used when a profile sets none.
    pub default_model: String,
    pub distributor: StageProfile,
    pub producer: StageProfile,
    pub verifier: StageProfile,
    pub stylist: StageProfile,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch_limit: config.pipeline.fetch_limit,
            min_fact_chars: config.pipeline.min_fact_chars,
            section_concurrency: config.pipeline.section_concurrency,
            call_timeout: Duration::from_secs(config.pipeline.call_timeout_secs),
            on_retrieval_failure: config.pipeline.on_retrieval_failure,
            on_section_failure: config.pipeline.on_section_failure,
            default_model: config.openrouter.default_model.clone(),
            distributor: config.distributor.clone(),
            producer: config.producer.clone(),
            verifier: config.verifier.clone(),
            stylist: config.stylist.clone(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_limit == 0 {
            return Err(ArticleForgeError::config("pipeline.fetch_limit must be at least 1"));
        }
        if self.section_concurrency == 0 {
            return Err(ArticleForgeError::config(
                "pipeline.section_concurrency must be at least 1",
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ArticleForgeError::config(
                "pipeline.call_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.articleforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArticleForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.articleforge/articleforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticleForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArticleForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArticleForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArticleForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArticleForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ArticleForgeError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("fetch_limit"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.fetch_limit, 6);
        assert_eq!(parsed.pipeline.min_fact_chars, 20);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn config_with_stage_profiles() {
        let toml_str = r#"
[pipeline]
section_concurrency = 3
on_retrieval_failure = "abort"
on_section_failure = "omit"

[producer]
tone = "friendly"
target_words = 250
use_citations = true

[producer.criteria]
use_examples = true
max_paragraphs = 3

[verifier]
strictness = 8
checklist = ["dates", "names"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.section_concurrency, 3);
        assert_eq!(config.pipeline.fetch_limit, 6);
        assert_eq!(config.pipeline.on_retrieval_failure, RetrievalFailureMode::Abort);
        assert_eq!(config.pipeline.on_section_failure, SectionFailureMode::Omit);
        assert_eq!(config.producer.tone.as_deref(), Some("friendly"));
        assert_eq!(config.producer.target_words, Some(250));
        assert!(config.producer.criteria.use_examples);
        assert_eq!(config.producer.criteria.max_paragraphs, Some(3));
        assert_eq!(config.verifier.strictness, Some(8));
        assert_eq!(config.verifier.checklist.len(), 2);
        assert!(config.stylist.additional_rules.is_empty());
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.fetch_limit, 6);
        assert_eq!(pipeline.section_concurrency, 1);
        assert_eq!(pipeline.call_timeout, Duration::from_secs(120));
        assert_eq!(pipeline.default_model, app.openrouter.default_model);
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn pipeline_config_rejects_zero_limits() {
        let mut pipeline = PipelineConfig::default();
        pipeline.fetch_limit = 0;
        assert!(pipeline.validate().is_err());

        let mut pipeline = PipelineConfig::default();
        pipeline.section_concurrency = 0;
        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("section_concurrency"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "AF_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
