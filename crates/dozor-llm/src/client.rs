use crate::error::LlmError;
use crate::wire::{ChatMessage, ChatRequest, ChatResponse, choice_into_reply, tool_definitions_to_schema};
use crate::wire::ChatReply;
use dozor_breaker::{BreakerError, CircuitBreaker};
use dozor_proto::ToolDefinition;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::warn;

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// One OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
}

fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::Auth,
        429 => LlmError::RateLimit { retry_after },
        500..=599 => LlmError::ServerError { status: status.as_u16() },
        _ => LlmError::Rejected { status: status.as_u16(), body },
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn backoff_delay(attempt: u32) -> Duration {
    let scaled = INITIAL_BACKOFF.saturating_mul(1u32 << attempt.min(16));
    scaled.min(MAX_BACKOFF)
}

fn jitter(base: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Talks to a primary (and optional fallback) OpenAI-compatible provider,
/// retrying transient failures with jittered backoff and tripping a
/// per-provider circuit breaker on sustained failure (§4.8).
pub struct LlmClient {
    http: Client,
    primary: ProviderConfig,
    primary_breaker: CircuitBreaker,
    fallback: Option<ProviderConfig>,
    fallback_breaker: Option<CircuitBreaker>,
}

impl LlmClient {
    pub fn new(
        primary: ProviderConfig,
        fallback: Option<ProviderConfig>,
        request_timeout: Duration,
        breaker_threshold: u32,
        breaker_reset: Duration,
    ) -> Result<Self, LlmError> {
        let http = build_client(request_timeout)?;
        let primary_breaker = CircuitBreaker::new("llm-primary", breaker_threshold, breaker_reset);
        let fallback_breaker = fallback.as_ref().map(|_| CircuitBreaker::new("llm-fallback", breaker_threshold, breaker_reset));
        Ok(Self { http, primary, primary_breaker, fallback, fallback_breaker })
    }

    /// Sends `messages` (with `tools` advertised, if any) to the primary
    /// provider, falling back to the secondary provider once on any
    /// primary failure. The original primary error is surfaced if the
    /// fallback also fails.
    pub async fn chat(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ChatReply, LlmError> {
        let primary_result = self.call_guarded(&self.primary, &self.primary_breaker, messages, tools).await;
        match primary_result {
            Ok(reply) => Ok(reply),
            Err(primary_err) => {
                let (Some(fallback), Some(fallback_breaker)) = (&self.fallback, &self.fallback_breaker) else {
                    return Err(primary_err);
                };
                warn!(error = %primary_err, "primary LLM provider failed, trying fallback");
                self.call_guarded(fallback, fallback_breaker, messages, tools).await.map_err(|_| primary_err)
            }
        }
    }

    async fn call_guarded(
        &self,
        provider: &ProviderConfig,
        breaker: &CircuitBreaker,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatReply, LlmError> {
        match breaker.execute(|| self.chat_with_retry(provider, messages, tools)).await {
            Ok(reply) => Ok(reply),
            Err(BreakerError::Open(_)) => Err(LlmError::CircuitOpen),
            Err(BreakerError::Inner(err)) => Err(err),
        }
    }

    async fn chat_with_retry(&self, provider: &ProviderConfig, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ChatReply, LlmError> {
        let mut attempt = 0;
        loop {
            match self.chat_once(provider, messages, tools).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = err.retry_after().unwrap_or_else(|| jitter(backoff_delay(attempt))).min(MAX_BACKOFF);
                    warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "retrying LLM request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn chat_once(&self, provider: &ProviderConfig, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Result<ChatReply, LlmError> {
        let schema = if tools.is_empty() { None } else { Some(tool_definitions_to_schema(tools)) };
        let request = ChatRequest { model: &provider.model, messages, tools: schema };
        let response = self.http.post(&provider.url).bearer_auth(&provider.api_key).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }
        let parsed: ChatResponse = response.json().await?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyChoices)?;
        Ok(choice_into_reply(choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
        assert_eq!(backoff_delay(10), MAX_BACKOFF);
    }

    #[test]
    fn jitter_stays_within_twenty_five_percent() {
        let base = Duration::from_secs(10);
        for _ in 0..50 {
            let jittered = jitter(base);
            assert!(jittered >= Duration::from_secs_f64(7.5));
            assert!(jittered <= Duration::from_secs_f64(12.5));
        }
    }

    #[test]
    fn classify_status_buckets_known_codes() {
        assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, None, String::new()), LlmError::Auth));
        assert!(matches!(classify_status(StatusCode::FORBIDDEN, None, String::new()), LlmError::Auth));
        assert!(matches!(classify_status(StatusCode::TOO_MANY_REQUESTS, None, String::new()), LlmError::RateLimit { .. }));
        assert!(matches!(classify_status(StatusCode::BAD_GATEWAY, None, String::new()), LlmError::ServerError { status: 502 }));
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST, None, String::new()), LlmError::Rejected { status: 400, .. }));
    }

    #[test]
    fn retryable_errors_are_classified_correctly() {
        assert!(LlmError::RateLimit { retry_after: None }.is_retryable());
        assert!(LlmError::ServerError { status: 503 }.is_retryable());
        assert!(!LlmError::Auth.is_retryable());
        assert!(!LlmError::Rejected { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::EmptyChoices.is_retryable());
    }

    #[test]
    fn tool_call_arguments_are_pre_parsed_into_json() {
        use crate::wire::{Choice, WireFunctionCall, WireToolCall};
        let choice = Choice {
            message: ChatMessage {
                role: "assistant".into(),
                content: None,
                tool_call_id: None,
                tool_calls: Some(vec![WireToolCall {
                    id: "call_1".into(),
                    kind: "function".into(),
                    function: WireFunctionCall { name: "server_inspect".into(), arguments: r#"{"mode":"health"}"#.into() },
                }]),
            },
        };
        let reply = choice_into_reply(choice);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "server_inspect");
        assert_eq!(reply.tool_calls[0].arguments["mode"], "health");
    }
}
