use std::time::Duration;

use fireplace_core::error::AppError;
use fireplace_core::insights::InsightGenerators;
use fireplace_core::prompt::{
    CHECKLIST_SYSTEM_PROMPT, DAILY_FOCUS_SYSTEM_PROMPT, SEARCH_TERMS_SYSTEM_PROMPT,
};
use fireplace_core::retry::RetryPolicy;
use fireplace_core::traits::Generator;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 200;

/// OpenAI-compatible chat-completion client with bounded retries.
///
/// The system prompt is fixed at construction; each [`Generator::generate`]
/// call sends it together with the caller's message. Works with any
/// OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
///
/// Clones share the underlying connection pool.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    system_prompt: String,
    retry_policy: RetryPolicy,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, system_prompt: &str) -> Result<Self, AppError> {
        Self::build(
            api_key,
            DEFAULT_MODEL,
            DEFAULT_BASE_URL,
            system_prompt,
            DEFAULT_LLM_TIMEOUT,
        )
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let retry_policy = self.retry_policy;
        Ok(Self::build(
            &self.api_key,
            &self.model,
            &self.base_url,
            &self.system_prompt,
            timeout,
        )?
        .with_retry_policy(retry_policy))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Same client and settings, different persona.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("LLM API key must not be empty".into()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
            system_prompt: system_prompt.to_string(),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// One request to the completion endpoint, no retries.
    async fn complete_once(&self, request: &ChatRequest<'_>) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Transient(format!(
                        "Request timed out after {} seconds",
                        self.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    AppError::Transient(format!("Connection failed: {e}"))
                } else {
                    AppError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body).ok().map(|e| e.error);
            return Err(classify_api_error(status.as_u16(), detail, &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to parse LLM response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Transient("Empty response from LLM".into()))
    }
}

impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        message: &str,
    ) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: message,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = message.len(),
            "Requesting chat completion"
        );

        let request = &request;
        let content = self
            .retry_policy
            .run(cancel, move |attempt| {
                tracing::debug!(attempt, "Chat completion attempt");
                self.complete_once(request)
            })
            .await?;

        tracing::debug!(chars = content.len(), "Chat completion succeeded");
        Ok(content)
    }
}

/// Build the three insight personas from one configured generator.
pub fn insight_generators(template: &OpenAiGenerator) -> InsightGenerators<OpenAiGenerator> {
    InsightGenerators {
        checklist: template.clone().with_system_prompt(CHECKLIST_SYSTEM_PROMPT),
        daily_focus: template.clone().with_system_prompt(DAILY_FOCUS_SYSTEM_PROMPT),
        search_terms: template.clone().with_system_prompt(SEARCH_TERMS_SYSTEM_PROMPT),
    }
}

/// Map a provider error response onto the generation error taxonomy.
///
/// Uses the HTTP status and the structured `error.code` / `error.type`
/// fields of the OpenAI error envelope.
fn classify_api_error(status_code: u16, detail: Option<ApiErrorDetail>, body: &str) -> AppError {
    let (message, code, kind) = match detail {
        Some(d) => (d.message, d.code.unwrap_or_default(), d.kind.unwrap_or_default()),
        None => (format!("HTTP {status_code}: {body}"), String::new(), String::new()),
    };

    if code == "context_length_exceeded" {
        return AppError::ContextLengthExceeded(message);
    }
    if code == "invalid_api_key" || kind == "authentication_error" {
        return AppError::Authentication(message);
    }

    match status_code {
        401 | 403 => AppError::Authentication(message),
        429 => AppError::RateLimit(message),
        500 | 502 | 503 | 504 => AppError::ServiceUnavailable {
            message,
            status_code,
        },
        _ => AppError::Transient(format!("HTTP {status_code}: {message}")),
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::{Value, json};

    use super::*;

    /// Scripted completion endpoint: answers with queued (status, body)
    /// pairs and records every request.
    #[derive(Default)]
    struct FakeProvider {
        responses: Mutex<Vec<(StatusCode, Value)>>,
        requests: Mutex<Vec<Value>>,
        auth_headers: Mutex<Vec<String>>,
    }

    async fn completions(
        State(state): State<Arc<FakeProvider>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        state.requests.lock().unwrap().push(body);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            state.auth_headers.lock().unwrap().push(auth.to_string());
        }
        let mut responses = state.responses.lock().unwrap();
        let (status, body) = if responses.is_empty() {
            (StatusCode::OK, completion("default answer"))
        } else {
            responses.remove(0)
        };
        (status, Json(body))
    }

    fn completion(text: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    fn api_error(message: &str, kind: &str, code: Option<&str>) -> Value {
        json!({"error": {"message": message, "type": kind, "code": code}})
    }

    async fn spawn_provider(responses: Vec<(StatusCode, Value)>) -> (String, Arc<FakeProvider>) {
        let state = Arc::new(FakeProvider {
            responses: Mutex::new(responses),
            ..Default::default()
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), state)
    }

    fn generator(base_url: &str, attempts: u32) -> OpenAiGenerator {
        OpenAiGenerator::new("test-key", "You are a test persona.")
            .unwrap()
            .with_base_url(base_url)
            .with_model("test-model")
            .with_retry_policy(RetryPolicy::new(attempts, Duration::from_millis(10)).unwrap())
    }

    #[test]
    fn empty_api_key_rejected() {
        let err = OpenAiGenerator::new("  ", "prompt").err().unwrap();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let generator = OpenAiGenerator::new("k", "p")
            .unwrap()
            .with_base_url("https://api.example.com/v1/");
        assert_eq!(generator.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn personas_differ_only_by_prompt() {
        let template = OpenAiGenerator::new("k", "unused").unwrap().with_model("m");
        let generators = insight_generators(&template);
        assert_eq!(generators.checklist.system_prompt(), CHECKLIST_SYSTEM_PROMPT);
        assert_eq!(generators.daily_focus.system_prompt(), DAILY_FOCUS_SYSTEM_PROMPT);
        assert_eq!(generators.search_terms.system_prompt(), SEARCH_TERMS_SYSTEM_PROMPT);
        assert_eq!(generators.search_terms.model, "m");
    }

    #[test]
    fn classification_uses_status_and_code() {
        let detail = |code: Option<&str>, kind: Option<&str>| ApiErrorDetail {
            message: "boom".into(),
            code: code.map(str::to_string),
            kind: kind.map(str::to_string),
        };

        assert!(matches!(
            classify_api_error(401, Some(detail(None, None)), ""),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            classify_api_error(400, Some(detail(Some("invalid_api_key"), None)), ""),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            classify_api_error(429, Some(detail(Some("rate_limit_exceeded"), None)), ""),
            AppError::RateLimit(_)
        ));
        assert!(matches!(
            classify_api_error(
                400,
                Some(detail(Some("context_length_exceeded"), Some("invalid_request_error"))),
                ""
            ),
            AppError::ContextLengthExceeded(_)
        ));
        assert!(matches!(
            classify_api_error(503, None, "upstream down"),
            AppError::ServiceUnavailable {
                status_code: 503,
                ..
            }
        ));
        assert!(matches!(
            classify_api_error(418, None, "teapot"),
            AppError::Transient(_)
        ));
    }

    #[test]
    fn message_text_does_not_drive_classification() {
        let detail = ApiErrorDetail {
            message: "rate limit exceeded, authentication failed".into(),
            code: None,
            kind: None,
        };
        assert!(matches!(
            classify_api_error(400, Some(detail), ""),
            AppError::Transient(_)
        ));
    }

    #[tokio::test]
    async fn sends_system_prompt_and_sampling_parameters() {
        let (base, provider) =
            spawn_provider(vec![(StatusCode::OK, completion("Write tests"))]).await;

        let text = generator(&base, 1)
            .generate(&CancellationToken::new(), "What next?")
            .await
            .unwrap();

        assert_eq!(text, "Write tests");
        let requests = provider.requests.lock().unwrap();
        let body = &requests[0];
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are a test persona.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "What next?");
        assert_eq!(body["max_tokens"], 200);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(provider.auth_headers.lock().unwrap()[0], "Bearer test-key");
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (base, provider) = spawn_provider(vec![
            (StatusCode::SERVICE_UNAVAILABLE, api_error("overloaded", "server_error", None)),
            (StatusCode::OK, json!({"not": "a completion"})),
            (StatusCode::OK, completion("third time lucky")),
        ])
        .await;

        let text = generator(&base, 3)
            .generate(&CancellationToken::new(), "hi")
            .await
            .unwrap();

        assert_eq!(text, "third time lucky");
        assert_eq!(provider.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_classified_error() {
        let rate_limited = || {
            (
                StatusCode::TOO_MANY_REQUESTS,
                api_error("slow down", "requests", Some("rate_limit_exceeded")),
            )
        };
        let (base, provider) = spawn_provider(vec![rate_limited(), rate_limited()]).await;

        let err = generator(&base, 2)
            .generate(&CancellationToken::new(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateLimit(ref m) if m == "slow down"));
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_content_is_transient() {
        let (base, _) = spawn_provider(vec![(StatusCode::OK, completion("   "))]).await;

        let err = generator(&base, 1)
            .generate(&CancellationToken::new(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Transient(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transient() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = generator(&format!("http://{addr}/v1"), 2)
            .generate(&CancellationToken::new(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Transient(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let (base, provider) = spawn_provider(vec![
            (StatusCode::BAD_GATEWAY, api_error("bad gateway", "server_error", None)),
            (StatusCode::BAD_GATEWAY, api_error("bad gateway", "server_error", None)),
        ])
        .await;
        let generator = generator(&base, 5)
            .with_retry_policy(RetryPolicy::new(5, Duration::from_secs(30)).unwrap());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = generator.generate(&cancel, "hi").await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }
}
