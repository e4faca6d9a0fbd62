//! Tier 3 of the cascade: LLM confirmation of a provisional `employer` label.
//! This tier exists to suppress false positives before the irreversible
//! outreach action, and is the only tier that may produce a suggested reply.
//! It is fail-closed: when both providers are unusable the verdict degrades
//! to `unclear` with no reply.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::LlmProviderConfig,
    domain::{IntentLabel, Verdict},
};

const SYSTEM_PROMPT: &str = r#"You are a Telegram bot assistant that classifies group messages about job posts.

Your job is to label the sender as one of:
- "employer": offering remote virtual assistant or technical/dev work
- "freelancer": advertising their own services
- "spam": scammy or promotional content
- "unclear": not enough info
- "skip": irrelevant (e.g., looking for team leads, agencies, location/language exclusions)

You're only interested in remote VA/dev roles, not team leads, sales, or region/language-specific jobs.
You can also make some exceptions to the criteria if it is a dev/tech role.

Reply ONLY with a JSON object like:
{
  "label": "employer|freelancer|spam|unclear|skip",
  "reason": "brief reason",
  "response": "Hey! I just saw your job posting and I'm really interested.[ If a keyword or trivia question is required, add a natural reply here. ]"
}

Leave "response" empty unless label is "employer". Only respond if confident."#;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence regex"));

/// Raw completion text for one message; the transport boundary tests mock.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, message: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions backend used for both providers.
pub struct ChatCompletionsBackend {
    http: Client,
    config: LlmProviderConfig,
}

impl ChatCompletionsBackend {
    pub fn new(http: Client, config: LlmProviderConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        self.config.name
    }

    async fn complete(&self, message: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .with_context(|| format!("no API key configured for {}", self.config.name))?;

        let request = build_request(self.config.model.clone(), message);
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let completion: ChatCompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .with_context(|| format!("{} returned no choices", self.config.name))?;
        choice
            .message
            .and_then(|msg| msg.content)
            .with_context(|| format!("{} response missing message content", self.config.name))
    }
}

fn build_request(model: String, message: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: format!("Message: \"{}\"", message.trim()),
            },
        ],
        temperature: 0.2,
        max_tokens: 300,
    }
}

/// Extracts and validates the structured verdict from raw completion text.
///
/// Models often wrap the JSON in a code fence; accept either form. A label
/// outside the five-value vocabulary or a missing reply for `employer` is an
/// error, which the caller treats like any other provider failure.
fn parse_verdict(raw: &str) -> Result<Verdict> {
    let body = FENCED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw.trim());

    let parsed: RawVerdict =
        serde_json::from_str(body).context("completion is not a JSON verdict")?;

    let label_text = parsed.label.context("verdict missing required field `label`")?;
    let label = IntentLabel::parse(&label_text)
        .with_context(|| format!("label {label_text:?} outside the accepted vocabulary"))?;
    if label == IntentLabel::Barred {
        bail!("label \"barred\" outside the accepted vocabulary");
    }

    let reply = parsed.response.filter(|r| !r.trim().is_empty());
    if label == IntentLabel::Employer && reply.is_none() {
        bail!("employer verdict without a suggested reply");
    }

    Ok(Verdict {
        label,
        reason: parsed.reason.filter(|r| !r.trim().is_empty()),
        reply: if label == IntentLabel::Employer {
            reply
        } else {
            None
        },
    })
}

/// Primary + fallback pair invoked only for provisional employer labels.
pub struct LlmConfirmer {
    primary: Arc<dyn LlmBackend>,
    fallback: Arc<dyn LlmBackend>,
}

impl LlmConfirmer {
    pub fn new(primary: Arc<dyn LlmBackend>, fallback: Arc<dyn LlmBackend>) -> Self {
        Self { primary, fallback }
    }

    pub async fn confirm(&self, text: &str) -> Verdict {
        match self.ask(self.primary.as_ref(), text).await {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::warn!(
                    target: "llm",
                    provider = self.primary.name(),
                    error = %err,
                    "primary provider failed, falling back"
                );
                match self.ask(self.fallback.as_ref(), text).await {
                    Ok(verdict) => verdict,
                    Err(err) => {
                        tracing::warn!(
                            target: "llm",
                            provider = self.fallback.name(),
                            error = %err,
                            "fallback provider failed, degrading to unclear"
                        );
                        Verdict::unclear("all LLM providers failed")
                    }
                }
            }
        }
    }

    async fn ask(&self, backend: &dyn LlmBackend, text: &str) -> Result<Verdict> {
        let raw = backend.complete(text).await?;
        parse_verdict(&raw)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: i32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    label: Option<String>,
    reason: Option<String>,
    response: Option<String>,
}
