//! Chat-assisted query translation
//!
//! A thin synchronous OpenAI client that turns free-form interactive input
//! into program clauses. The chat path is only active when the
//! `OPENAI_API_KEY` environment variable is present, and the first call in
//! a session is gated by an interactive confirmation. Any failure disables
//! the path for the rest of the session; the reasoner itself never depends
//! on it.

use std::time::Duration;

use crate::error::{TenetError, TenetResult};

/// Configuration for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model name passed to the completions endpoint.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com".into(),
            timeout_secs: 60,
        }
    }
}

const SYSTEM_PROMPT: &str = "You translate natural-language statements and questions \
into clauses for a production-rule reasoner. The clause language:\n\
- Facts: (id attribute value), three bare words, e.g. (duck is-a bird)\n\
- Rules: (rule NAME (cond)... => (pattern)), variables written <x>, \
a leading - negates a condition, _ is a wildcard\n\
- Queries: (query (cond)...)\n\
Reply with clauses only, one per line, no commentary.";

/// Synchronous OpenAI-backed clause translator.
pub struct ChatClient {
    config: ChatConfig,
    api_key: Option<String>,
    confirmed: bool,
    disabled: bool,
}

impl ChatClient {
    /// Build a client, picking the API key up from `OPENAI_API_KEY`.
    pub fn from_env(config: ChatConfig) -> Self {
        Self {
            config,
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            confirmed: false,
            disabled: false,
        }
    }

    /// Whether the chat path can be used at all.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some() && !self.disabled
    }

    /// Whether the first-call confirmation is still pending.
    pub fn needs_confirmation(&self) -> bool {
        !self.confirmed
    }

    /// Record the user's consent.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    /// Disable the chat path for the rest of the session.
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// The model in use.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Translate a free-form prompt into clause text.
    pub fn translate(&self, prompt: &str) -> TenetResult<String> {
        let Some(api_key) = &self.api_key else {
            return Err(TenetError::chat("OPENAI_API_KEY is not set"));
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build();

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.0,
        });

        let response = agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", api_key))
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| TenetError::chat(e.to_string()))?;

        let text = response
            .into_string()
            .map_err(|e| TenetError::chat(e.to_string()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| TenetError::chat(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| TenetError::chat("response has no message content"))?;

        Ok(strip_fences(content).to_string())
    }
}

/// Strip a markdown code fence if the model wrapped its reply in one.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an optional language tag on the first line.
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim().is_empty() && !first.contains('(') => rest.trim(),
        _ => inner.trim(),
    }
}
