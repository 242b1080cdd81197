//! Configuration system
//!
//! TOML configuration with environment-variable overrides. Files are
//! searched in order (first found wins):
//!
//! 1. `./tenet.toml` - project-local configuration
//! 2. `~/.config/tenet/config.toml` - user configuration (XDG)
//!
//! Environment overrides:
//! - `TENET_STRATEGY` - conflict-resolution strategy name
//! - `TENET_MAX_CYCLES` - cycle limit per run
//! - `TENET_SCHEMA_CHECK` - enable schema validation (true/false)
//! - `TENET_TRACE` - enable rule-firing trace (true/false)
//! - `TENET_CHAT_MODEL` - chat model name
//!
//! CLI flags win over everything here; this layer only supplies defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! # tenet.toml
//!
//! [reasoning]
//! strategy = "stratified-manual"
//! max_cycles = 100
//! schema_check = false
//!
//! [chat]
//! model = "gpt-4o-mini"
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TenetResult;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TenetConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Reasoning settings
    pub reasoning: ReasoningConfig,
    /// Chat backend settings
    pub chat: ChatSection,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Emit a trace of rule firings to stderr
    pub trace: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { trace: false }
    }
}

/// Reasoning configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Conflict-resolution strategy (prefix-matched)
    pub strategy: String,
    /// Cycle limit per run
    pub max_cycles: usize,
    /// Enable schema validation at load time
    pub schema_check: bool,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            strategy: "first-match".into(),
            max_cycles: crate::engine::DEFAULT_MAX_CYCLES,
            schema_check: false,
        }
    }
}

/// Chat backend configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatSection {
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChatSection {
    fn default() -> Self {
        let defaults = crate::chat::ChatConfig::default();
        Self {
            model: defaults.model,
            base_url: defaults.base_url,
            timeout_secs: defaults.timeout_secs,
        }
    }
}

impl TenetConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> TenetResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from the standard locations, then apply
    /// environment overrides. Missing files fall back to defaults; an
    /// unreadable file is a configuration error.
    pub fn load() -> TenetResult<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::from_toml(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("tenet.toml");
        if local.is_file() {
            return Some(local);
        }
        let home = env::var_os("HOME")?;
        let user = PathBuf::from(home).join(".config/tenet/config.toml");
        user.is_file().then_some(user)
    }

    /// Apply overrides from a key lookup (the environment in production;
    /// injected in tests).
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(value) = get("TENET_STRATEGY") {
            self.reasoning.strategy = value;
        }
        if let Some(value) = get("TENET_MAX_CYCLES") {
            match value.parse() {
                Ok(n) => self.reasoning.max_cycles = n,
                Err(_) => eprintln!(
                    "tenet: warning: TENET_MAX_CYCLES=`{}` is not a number; ignoring",
                    value
                ),
            }
        }
        if let Some(value) = get("TENET_SCHEMA_CHECK") {
            self.reasoning.schema_check = parse_bool(&value).unwrap_or(self.reasoning.schema_check);
        }
        if let Some(value) = get("TENET_TRACE") {
            self.general.trace = parse_bool(&value).unwrap_or(self.general.trace);
        }
        if let Some(value) = get("TENET_CHAT_MODEL") {
            self.chat.model = value;
        }
    }

    /// The chat configuration expressed for the chat client.
    pub fn chat_config(&self) -> crate::chat::ChatConfig {
        crate::chat::ChatConfig {
            model: self.chat.model.clone(),
            base_url: self.chat.base_url.clone(),
            timeout_secs: self.chat.timeout_secs,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            eprintln!("tenet: warning: `{}` is not a boolean; ignoring", other);
            None
        }
    }
}
