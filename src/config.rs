use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    storage: StorageConfig,
    api: ApiConfig,
    twilio: Option<TwilioConfig>,
    evolution: Option<EvolutionConfig>,
    instagram: Option<InstagramConfig>,
    #[serde(default)]
    automation: AutomationConfig,
    #[serde(default)]
    gym: GymConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_bind")]
    bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct StorageConfig {
    data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiConfig {
    provider: String,
    key: String,
    url: String,
    model: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u64,
}

fn default_max_tokens() -> u64 {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    #[serde(default = "default_twilio_url")]
    pub api_url: String,
}

fn default_twilio_url() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionConfig {
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramConfig {
    pub access_token: String,
    pub business_account_id: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    pub verify_token: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct AutomationConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_check_interval")]
    check_interval_secs: u64,
    #[serde(default = "default_item_delay")]
    item_delay_ms: u64,
    #[serde(default = "default_manual_review_hours")]
    manual_review_after_hours: i64,
    #[serde(default = "default_auto_confidence")]
    auto_verify_confidence: i32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_secs: default_check_interval(),
            item_delay_ms: default_item_delay(),
            manual_review_after_hours: default_manual_review_hours(),
            auto_verify_confidence: default_auto_confidence(),
        }
    }
}

fn default_check_interval() -> u64 {
    300
}

fn default_item_delay() -> u64 {
    1000
}

fn default_manual_review_hours() -> i64 {
    24
}

fn default_auto_confidence() -> i32 {
    95
}

#[derive(Debug, Clone, Deserialize)]
struct GymConfig {
    #[serde(default = "default_true")]
    replay_on_start: bool,
}

impl Default for GymConfig {
    fn default() -> Self {
        Self {
            replay_on_start: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Settings for the tag-verification polling loop.
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub enabled: bool,
    pub check_interval: Duration,
    pub item_delay: Duration,
    pub manual_review_after_hours: i64,
    pub auto_verify_confidence: i32,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        let file = AutomationConfig::default();
        Self::from(file)
    }
}

impl From<AutomationConfig> for AutomationSettings {
    fn from(c: AutomationConfig) -> Self {
        Self {
            enabled: c.enabled,
            check_interval: Duration::from_secs(c.check_interval_secs),
            item_delay: Duration::from_millis(c.item_delay_ms),
            manual_review_after_hours: c.manual_review_after_hours,
            auto_verify_confidence: c.auto_verify_confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub data_dir: PathBuf,
    pub api_provider: String,
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u64,
    pub twilio: Option<TwilioConfig>,
    pub evolution: Option<EvolutionConfig>,
    pub instagram: Option<InstagramConfig>,
    pub automation: AutomationSettings,
    pub replay_outbox_on_start: bool,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        Ok(Self {
            bind: config_file.server.bind,
            data_dir: config_file.storage.data_dir.into(),
            api_provider: config_file.api.provider,
            api_key: config_file.api.key,
            api_url: config_file.api.url,
            model: config_file.api.model,
            max_tokens: config_file.api.max_tokens,
            twilio: config_file.twilio,
            evolution: config_file.evolution,
            instagram: config_file.instagram,
            automation: config_file.automation.into(),
            replay_outbox_on_start: config_file.gym.replay_on_start,
        })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&content)
    }

    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chatbot.db")
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.data_dir.join("outbox.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [storage]
        data_dir = "./data"

        [api]
        provider = "anthropic"
        key = "sk-test"
        url = "https://api.anthropic.com"
        model = "claude-sonnet-4-20250514"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8787");
        assert_eq!(config.max_tokens, 1024);
        assert!(config.twilio.is_none());
        assert!(!config.automation.enabled);
        assert_eq!(config.automation.check_interval, Duration::from_secs(300));
        assert_eq!(config.automation.item_delay, Duration::from_millis(1000));
        assert_eq!(config.automation.manual_review_after_hours, 24);
        assert!(config.replay_outbox_on_start);
        assert_eq!(config.db_path(), PathBuf::from("./data/chatbot.db"));
    }

    #[test]
    fn optional_sections_are_parsed() {
        let content = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [twilio]
            account_sid = "AC123"
            auth_token = "secret"

            [instagram]
            access_token = "token"
            business_account_id = "1789"
            verify_token = "verify-me"

            [automation]
            enabled = true
            check_interval_secs = 60
            "#
        );
        let config = Config::parse(&content).unwrap();

        let twilio = config.twilio.unwrap();
        assert_eq!(twilio.api_url, "https://api.twilio.com");
        let instagram = config.instagram.unwrap();
        assert_eq!(instagram.graph_url, "https://graph.facebook.com/v18.0");
        assert!(config.automation.enabled);
        assert_eq!(config.automation.check_interval, Duration::from_secs(60));
        assert_eq!(config.automation.auto_verify_confidence, 95);
    }

    #[test]
    fn missing_api_section_is_an_error() {
        let err = Config::parse("[storage]\ndata_dir = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
