//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Exposes `generate_answer` and `generate_topk_per_token` matching the rest
//! of the `LlmProvider` abstraction. All OpenAI wire types are private to this
//! module. Transient failures (transport errors, 429, 5xx) are retried with
//! exponential backoff clamped to 4–10 seconds.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::config::OpenAiConfig;
use crate::llm::{GenerateParams, Message, ProviderError, Token};

const BACKOFF_MIN_SECS: u64 = 4;
const BACKOFF_MAX_SECS: u64 = 10;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Constructed once per role at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    top_logprobs: u8,
    max_attempts: u32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(config: &OpenAiConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_logprobs: config.top_logprobs,
            max_attempts: config.max_attempts.max(1),
            api_key,
        })
    }

    pub async fn generate_answer(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<String, ProviderError> {
        let payload = self.request(prompt, params, false);
        let parsed = self.execute(&payload).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
    }

    pub async fn generate_topk_per_token(&self, prompt: &str) -> Result<Vec<Token>, ProviderError> {
        let payload = self.request(prompt, &GenerateParams::default(), true);
        let parsed = self.execute(&payload).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.logprobs)
            .map(|l| l.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::Request("response carries no logprobs".into()))?;

        Ok(content
            .into_iter()
            .map(|t| Token {
                text: t.token,
                prob: t.logprob.exp(),
                top_candidates: t
                    .top_logprobs
                    .into_iter()
                    .map(|c| Token::new(c.token, c.logprob.exp()))
                    .collect(),
            })
            .collect())
    }

    fn request(&self, prompt: &str, params: &GenerateParams, with_logprobs: bool) -> ChatCompletionRequest {
        // Some models (gpt-5 family) do not accept a temperature parameter.
        let temperature = if self.model.starts_with("gpt-5") {
            None
        } else {
            Some(params.temperature.unwrap_or(self.temperature))
        };

        let mut messages = params.history.clone();
        messages.push(Message::user(prompt));

        let (logprobs, top_logprobs) = if with_logprobs && self.top_logprobs > 0 {
            (Some(true), Some(self.top_logprobs))
        } else {
            (None, None)
        };

        ChatCompletionRequest { model: self.model.clone(), messages, temperature, logprobs, top_logprobs }
    }

    /// Send with retry on transient failures.
    async fn execute(&self, payload: &ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(payload).await {
                Ok(parsed) => return Ok(parsed),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let wait = calculate_backoff(attempt);
                    warn!(attempt, wait_secs = wait.as_secs(), error = %e, "transient LLM failure, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, payload: &ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            logprobs = payload.logprobs.unwrap_or(false),
            messages = payload.messages.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            if e.is_timeout() || e.is_connect() {
                ProviderError::Transient(e.to_string())
            } else {
                ProviderError::Request(e.to_string())
            }
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");
        Ok(parsed)
    }
}

/// Exponential backoff for the given 1-based attempt, clamped to 4–10 s.
fn calculate_backoff(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).clamp(BACKOFF_MIN_SECS, BACKOFF_MAX_SECS);
    Duration::from_secs(secs)
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_logprobs: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    logprobs: Option<ChoiceLogprobs>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceLogprobs {
    #[serde(default)]
    content: Vec<TokenLogprob>,
}

#[derive(Debug, Deserialize)]
struct TokenLogprob {
    token: String,
    logprob: f64,
    #[serde(default)]
    top_logprobs: Vec<TopLogprob>,
}

#[derive(Debug, Deserialize)]
struct TopLogprob {
    token: String,
    logprob: f64,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
/// 429 and 5xx map to [`ProviderError::Transient`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let code = env
                .error
                .code
                .map(|v| match v {
                    serde_json::Value::String(s) => format!(" [code={s}]"),
                    other => format!(" [code={other}]"),
                })
                .unwrap_or_default();
            format!("HTTP {status}{code}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    };

    error!(%status, %message, "LLM request returned HTTP error");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(ProviderError::Transient(message))
    } else {
        Err(ProviderError::Request(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_base_url: "http://localhost:0/v1/chat/completions".into(),
            model: "test-model".into(),
            temperature: 0.2,
            timeout_seconds: 1,
            top_logprobs: 5,
            max_attempts: 3,
        }
    }

    #[test]
    fn backoff_is_clamped() {
        assert_eq!(calculate_backoff(1), Duration::from_secs(4));
        assert_eq!(calculate_backoff(2), Duration::from_secs(4));
        assert_eq!(calculate_backoff(3), Duration::from_secs(8));
        assert_eq!(calculate_backoff(4), Duration::from_secs(10));
        assert_eq!(calculate_backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn logprob_request_shape() {
        let p = OpenAiCompatibleProvider::new(&config(), None).unwrap();
        let req = p.request("Is water wet?", &GenerateParams::default(), true);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["logprobs"], true);
        assert_eq!(json["top_logprobs"], 5);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn answer_request_uses_history_and_temperature_override() {
        let p = OpenAiCompatibleProvider::new(&config(), None).unwrap();
        let params = GenerateParams {
            history: vec![Message::user("q"), Message { role: "assistant".into(), content: "a".into() }],
            temperature: Some(1.0),
        };
        let req = p.request("next", &params, false);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("logprobs").is_none());
        assert_eq!(json["temperature"], 1.0);
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][2]["content"], "next");
    }

    #[test]
    fn parses_logprob_response() {
        let body = r#"{"choices":[{"message":{"content":"yes"},
            "logprobs":{"content":[{"token":"yes","logprob":-0.1,
            "top_logprobs":[{"token":"yes","logprob":-0.1},{"token":"no","logprob":-2.4}]}]}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let lp = parsed.choices[0].logprobs.as_ref().unwrap();
        assert_eq!(lp.content[0].top_logprobs.len(), 2);
        assert_eq!(lp.content[0].top_logprobs[1].token, "no");
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let mut cfg = config();
        cfg.max_attempts = 1;
        let p = OpenAiCompatibleProvider::new(&cfg, None).unwrap();
        assert!(p.generate_answer("hi", &GenerateParams::default()).await.is_err());
    }
}
