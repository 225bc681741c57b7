//! # LLM Scoring Backend
//!
//! Scores a submission with one call to the Messages API:
//!
//! ```text
//! POST {base_url}/v1/messages
//! x-api-key: <key>
//! anthropic-version: 2023-06-01
//! ```
//!
//! Overload, rate limiting and transport failures are retried with backoff
//! inside the configured timeout; see [`crate::retry`].
//!
//! The model is asked to reply with a bare JSON object
//! `{"score": <0-100>, "feedback": "<text>"}`. Markdown fences and stray prose
//! around the object are tolerated. Out-of-range scores are clamped; a missing
//! or empty feedback string makes the reply malformed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use guild_core::Score;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::retry::{retry_within, Backoff};
use crate::{ScoringOracle, ScoringRequest, Verdict, VerdictSource};

const ENDPOINT: &str = "POST /v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Results longer than this are truncated before they reach the prompt.
const MAX_RESULT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = r#"You are the Oracle of an adventurers' guild. You judge how well a submitted result fulfils a quest.

Respond with a single JSON object and nothing else:
{"score": <integer 0-100>, "feedback": "<one or two sentences>"}

Scoring guide:
- 90-100: fully meets every acceptance criterion with excellent quality
- 70-89: meets the core requirements
- 50-69: partially meets the requirements
- 0-49: misses the point, is incomplete, or is empty
Judge harder quests (difficulty A and S) more strictly."#;

/// Scoring backend that calls an LLM.
#[derive(Debug, Clone)]
pub struct LlmOracle {
    http: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
    /// Total time for one scoring call, retries included.
    budget: Duration,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [ChatMessage; 1],
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    score: serde_json::Number,
    #[serde(default)]
    feedback: Option<String>,
}

impl LlmOracle {
    /// Build a client from configuration. Fails if no API key is configured.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| OracleError::Init("ORACLE_API_KEY is not set".into()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        let mut key = reqwest::header::HeaderValue::from_str(api_key.as_str())
            .map_err(|_| OracleError::Init("ORACLE_API_KEY is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| OracleError::Init(e.to_string()))?;

        Ok(Self {
            http,
            url: format!("{}/v1/messages", config.base_url.as_str().trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            budget: Duration::from_secs(config.timeout_secs),
        })
    }

    /// One request to the Messages API, returning the reply's text blocks.
    async fn request_text(
        &self,
        body: &MessagesRequest<'_>,
        timeout: Duration,
    ) -> Result<String, OracleError> {
        let resp = self
            .http
            .post(&self.url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Http {
                endpoint: ENDPOINT.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                endpoint: ENDPOINT.into(),
                status,
                body,
            });
        }

        let reply: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("response body: {e}")))?;

        Ok(reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn user_message(request: &ScoringRequest) -> String {
        let criteria = request
            .acceptance_criteria
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("(none given)");
        let result: String = request.result_text.chars().take(MAX_RESULT_CHARS).collect();
        format!(
            "Quest: {title}\nDifficulty: {difficulty}\n\nDescription:\n{description}\n\n\
             Acceptance criteria:\n{criteria}\n\nSubmitted result:\n{result}",
            title = request.quest_title,
            difficulty = request.difficulty,
            description = request.quest_description,
        )
    }
}

#[async_trait]
impl ScoringOracle for LlmOracle {
    async fn score(&self, request: &ScoringRequest) -> Result<Verdict, OracleError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: [ChatMessage {
                role: "user",
                content: Self::user_message(request),
            }],
        };

        let text = retry_within(self.budget, Backoff::LLM, |remaining| {
            self.request_text(&body, remaining)
        })
        .await?;

        parse_verdict(&text)
    }
}

/// Turn the model's text reply into a verdict.
pub fn parse_verdict(text: &str) -> Result<Verdict, OracleError> {
    let json = extract_object(strip_code_fences(text))
        .ok_or_else(|| OracleError::Malformed("no JSON object in reply".into()))?;

    let raw: RawVerdict =
        serde_json::from_str(json).map_err(|e| OracleError::Malformed(e.to_string()))?;

    let score = match (raw.score.as_i64(), raw.score.as_f64()) {
        (Some(i), _) => Score::clamped(i),
        (None, Some(f)) if f.is_finite() => Score::clamped(f.round() as i64),
        _ => return Err(OracleError::Malformed(format!("unusable score {}", raw.score))),
    };

    let feedback = raw
        .feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| OracleError::Malformed("missing feedback".into()))?;

    Ok(Verdict {
        score,
        feedback,
        source: VerdictSource::Llm,
    })
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

/// The span from the first `{` to the last `}`.
fn extract_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
