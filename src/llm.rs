use crate::structures::{ImpactedPattern, PatternCount};
use crate::writer::{csv_text, write_impacted_csv, write_pattern_csv};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You work as a billing migration expert.";

/// Narrative used when the file has no mismatches; the model is not called.
pub const NO_MISMATCH_ANALYSIS: &str = "## Overall summary and priorities\n\
No mismatches were detected in this migration file.\n\n\
## Detailed analysis by top patterns\n\
No mismatch patterns to analyse. No remediation actions are required.";

/// Produces the root-cause narrative for a set of mismatch patterns.
pub trait Narrator {
    fn narrate(&self, patterns: &[PatternCount], impacted: &[ImpactedPattern]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(120),
        }
    }
}

pub fn build_prompt(patterns: &[PatternCount], impacted: &[ImpactedPattern]) -> Result<String> {
    let summary_table = csv_text(patterns, write_pattern_csv)?;
    let impacted_table = csv_text(impacted, write_impacted_csv)?;

    Ok(format!(
        r#"You are helping with a utility billing migration incident.

Write a structured, client friendly analysis. Open with a short overall summary,
then walk through each mismatch pattern in the same layout.

Use exactly these sections:

## Overall summary and priorities
Three to five points covering the main themes, the main causes and what the client should prioritise.

## Detailed analysis by top patterns
For each pattern in the summary table:
1. Title as: Legacy Product -> Migrated Product, reason code, number of customers affected.
2. The likely issue, in plain language.
3. A remediation action a delivery team can take.
4. Whether the issue looks systematic or isolated.
5. The impacted customer ids.

Summary table (one row per pattern, largest first):
{summary_table}
Impacted customers table (customer_ids is a JSON array):
{impacted_table}
Only analyse the patterns listed above. Keep the writing clear, concise and client ready."#
    ))
}

/// Returns the model narrative, or the fallback message when narration fails.
pub fn narrate_or_fallback(
    narrator: &dyn Narrator,
    patterns: &[PatternCount],
    impacted: &[ImpactedPattern],
) -> (String, bool) {
    match narrator.narrate(patterns, impacted) {
        Ok(text) => (text, true),
        Err(e) => {
            let error = format!("{:#}", e);
            warn!(error = %error, "AI analysis unavailable; using fallback text");
            (format!("AI analysis not available. Error: {}", error), false)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

fn parse_chat_response(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("No content in chat completion response"))
}

/// Chat-completion client for OpenAI-compatible endpoints.
pub struct OpenAiNarrator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiNarrator {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompt),
                },
            ],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .with_context(|| format!("LLM API call failed: {}", url))?;

        let status = response.status();
        let body = response
            .text()
            .context("Failed to read chat completion response")?;
        if !status.is_success() {
            return Err(anyhow!("LLM API returned status {}: {}", status, body.trim()));
        }
        parse_chat_response(&body)
    }
}

impl Narrator for OpenAiNarrator {
    fn narrate(&self, patterns: &[PatternCount], impacted: &[ImpactedPattern]) -> Result<String> {
        let prompt = build_prompt(patterns, impacted)?;
        info!(model = %self.model, patterns = patterns.len(), "requesting AI analysis");
        let text = self.complete(prompt)?;
        info!(chars = text.len(), "AI analysis received");
        Ok(text)
    }
}

/// Narrator that never calls out; the reason ends up in the fallback text.
pub struct DisabledNarrator {
    reason: String,
}

impl DisabledNarrator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Narrator for DisabledNarrator {
    fn narrate(&self, _patterns: &[PatternCount], _impacted: &[ImpactedPattern]) -> Result<String> {
        Err(anyhow!("{}", self.reason))
    }
}

/// Picks the narrator for a run: disabled when asked to or when no key is set.
pub fn narrator_from_config(config: &LlmConfig, disabled: bool) -> Result<Box<dyn Narrator>> {
    if disabled {
        return Ok(Box::new(DisabledNarrator::new("disabled with --no-llm")));
    }
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Box::new(OpenAiNarrator::new(config, key.to_string())?)),
        _ => Ok(Box::new(DisabledNarrator::new("OPENAI_API_KEY is not set"))),
    }
}
