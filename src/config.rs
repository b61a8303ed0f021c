use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "default_youtube")]
    pub youtube: ProviderConfig,
    #[serde(default = "default_transcript")]
    pub transcript: ProviderConfig,
    #[serde(default = "default_news")]
    pub news: ProviderConfig,
    #[serde(default = "default_market")]
    pub market: ProviderConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ticker: TickerConfig,
    /// Named keyword presets selectable instead of free-text keywords.
    #[serde(default)]
    pub domains: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Number of raw videos requested from the search provider.
    #[serde(default = "default_search_page_size")]
    pub search_page_size: usize,
    /// Number of transcript-bearing videos kept per search.
    #[serde(default = "default_transcript_target")]
    pub transcript_target: usize,
    #[serde(default = "default_news_page_size")]
    pub news_page_size: usize,
    /// `newest`, `oldest`, or `none`.
    #[serde(default = "default_resort")]
    pub resort: String,
    /// Transcript languages in preference order.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Language generated text should be written in.
    #[serde(default = "default_output_language")]
    pub output_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_page_size: default_search_page_size(),
            transcript_target: default_transcript_target(),
            news_page_size: default_news_page_size(),
            resort: default_resort(),
            languages: default_languages(),
            output_language: default_output_language(),
        }
    }
}

fn default_search_page_size() -> usize {
    5
}
fn default_transcript_target() -> usize {
    3
}
fn default_news_page_size() -> usize {
    10
}
fn default_resort() -> String {
    "newest".to_string()
}
fn default_languages() -> Vec<String> {
    vec!["ko".to_string(), "en".to_string()]
}
fn default_output_language() -> String {
    "Korean".to_string()
}

/// Connection settings shared by every upstream data provider.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the API key, if the provider needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    fn new(base_url: &str, api_key_env: Option<&str>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key_env: api_key_env.map(str::to_string),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_youtube() -> ProviderConfig {
    ProviderConfig::new("https://www.googleapis.com/youtube/v3", Some("YOUTUBE_API_KEY"))
}
fn default_transcript() -> ProviderConfig {
    ProviderConfig::new("https://video.google.com/timedtext", None)
}
fn default_news() -> ProviderConfig {
    ProviderConfig::new("https://newsapi.org/v2", Some("NEWS_API_KEY"))
}
fn default_market() -> ProviderConfig {
    ProviderConfig::new("https://financialmodelingprep.com/api/v3", Some("FMP_API_KEY"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    /// `gemini`, `openai`, or `disabled`.
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_summarizer_provider() -> String {
    "gemini".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds without a request after which a session is dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct TickerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Display label → market index symbol.
    #[serde(default = "default_ticker_symbols")]
    pub symbols: BTreeMap<String, String>,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
            symbols: default_ticker_symbols(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}
fn default_ticker_symbols() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("KOSPI".to_string(), "^KS11".to_string()),
        ("NASDAQ".to_string(), "^IXIC".to_string()),
        ("S&P500".to_string(), "^GSPC".to_string()),
    ])
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            youtube: default_youtube(),
            transcript: default_transcript(),
            news: default_news(),
            market: default_market(),
            summarizer: SummarizerConfig::default(),
            server: ServerConfig::default(),
            ticker: TickerConfig::default(),
            domains: BTreeMap::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads the config file if it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate pipeline
    if config.pipeline.search_page_size == 0 {
        anyhow::bail!("pipeline.search_page_size must be > 0");
    }
    if config.pipeline.transcript_target == 0 {
        anyhow::bail!("pipeline.transcript_target must be > 0");
    }
    if config.pipeline.news_page_size == 0 {
        anyhow::bail!("pipeline.news_page_size must be > 0");
    }
    if config.pipeline.languages.is_empty() {
        anyhow::bail!("pipeline.languages must list at least one language");
    }

    match config.pipeline.resort.as_str() {
        "newest" | "oldest" | "none" => {}
        other => anyhow::bail!(
            "Unknown pipeline.resort: '{}'. Must be newest, oldest, or none.",
            other
        ),
    }

    match config.summarizer.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be disabled, gemini, or openai.",
            other
        ),
    }

    if config.server.session_idle_secs == 0 {
        anyhow::bail!("server.session_idle_secs must be > 0");
    }

    // Validate ticker
    if config.ticker.enabled {
        if config.ticker.interval_secs == 0 {
            anyhow::bail!("ticker.interval_secs must be > 0");
        }
        if config.ticker.symbols.is_empty() {
            anyhow::bail!("ticker.symbols must not be empty when the ticker is enabled");
        }
    }

    for (name, keywords) in &config.domains {
        if keywords.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("domains.{} must contain at least one keyword", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.pipeline.search_page_size, 5);
        assert_eq!(config.pipeline.transcript_target, 3);
        assert_eq!(config.pipeline.languages, vec!["ko", "en"]);
        assert_eq!(config.summarizer.provider, "gemini");
        assert_eq!(config.youtube.api_key_env.as_deref(), Some("YOUTUBE_API_KEY"));
        assert!(config.transcript.api_key_env.is_none());
        assert_eq!(config.server.session_idle_secs, 3600);
    }

    #[test]
    fn test_domains_and_sections_parse() {
        let config: Config = toml::from_str(
            r#"
[pipeline]
transcript_target = 4
resort = "oldest"

[youtube]
base_url = "http://127.0.0.1:9000"
timeout_secs = 5

[domains]
ai = ["artificial intelligence", "LLM"]
"#,
        )
        .unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.pipeline.transcript_target, 4);
        assert_eq!(config.youtube.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.youtube.timeout_secs, 5);
        assert!(config.youtube.api_key_env.is_none());
        assert_eq!(config.domains["ai"].len(), 2);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../config/reel.example.toml")).unwrap();
        assert!(validate(&config).is_ok());
        assert!(config.ticker.enabled);
        assert_eq!(config.ticker.symbols["S&P500"], "^GSPC");
        assert_eq!(config.domains["tech"], vec!["semiconductors", "AI"]);
    }

    #[test]
    fn test_rejects_zero_target() {
        let config: Config = toml::from_str("[pipeline]\ntranscript_target = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("transcript_target"));
    }

    #[test]
    fn test_rejects_unknown_summarizer() {
        let config: Config = toml::from_str("[summarizer]\nprovider = \"claude\"\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown summarizer provider"));
    }

    #[test]
    fn test_rejects_unknown_resort() {
        let config: Config = toml::from_str("[pipeline]\nresort = \"random\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_session_idle() {
        let config: Config = toml::from_str("[server]\nsession_idle_secs = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("session_idle_secs"));
    }

    #[test]
    fn test_rejects_empty_domain() {
        let config: Config = toml::from_str("[domains]\nempty = [\" \"]\n").unwrap();
        assert!(validate(&config).is_err());
    }
}
