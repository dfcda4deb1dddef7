//! Client adapter for the hosted language model.
//!
//! [`ModelClient`] owns a [`ModelTransport`] and turns one prompt into one
//! validated response shape. The credential is supplied per call; there is no
//! process-wide client holding a key.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::LexicaError;
use crate::schema::{self, ResponseSchema};

/// API key authorizing one model invocation. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Credential::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Credential::new(value)
    }
}

/// Everything a transport needs for one JSON-mode generation call.
#[derive(Debug)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub schema: Value,
    pub credential: &'a Credential,
}

/// One outbound call to a model provider.
///
/// `Ok(None)` means the provider answered but produced no text.
#[async_trait]
pub trait ModelTransport: Send + Sync + fmt::Debug {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Option<String>, LexicaError>;

    fn provider_name(&self) -> &'static str;
}

#[derive(Clone, Debug)]
pub struct ModelClient {
    transport: Arc<dyn ModelTransport>,
    model: String,
}

impl ModelClient {
    pub fn new(transport: Arc<dyn ModelTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    /// Gemini-backed client using the configured model and base URL.
    pub fn gemini(config: &ModelConfig) -> Self {
        Self::new(
            Arc::new(GeminiTransport::new(config.api_base.clone())),
            config.model.clone(),
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &'static str {
        self.transport.provider_name()
    }

    pub async fn invoke<T: ResponseSchema>(
        &self,
        prompt: &str,
        credential: &Credential,
    ) -> Result<T, LexicaError> {
        self.invoke_with_model(&self.model, prompt, credential).await
    }

    /// Same as [`ModelClient::invoke`] with a per-call model override.
    pub async fn invoke_with_model<T: ResponseSchema>(
        &self,
        model: &str,
        prompt: &str,
        credential: &Credential,
    ) -> Result<T, LexicaError> {
        if credential.is_blank() {
            return Err(LexicaError::MissingCredential);
        }
        debug!(
            provider = self.transport.provider_name(),
            model,
            schema = T::NAME,
            prompt_len = prompt.len(),
            "invoking model"
        );
        let request = GenerateRequest {
            model,
            prompt,
            schema: T::json_schema(),
            credential,
        };
        let text = match self.transport.generate(request).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => return Err(LexicaError::EmptyOutput),
            Err(err) => {
                warn!(schema = T::NAME, error = %err, "model call failed");
                return Err(err);
            }
        };
        schema::validate::<T>(&text).inspect_err(|err| {
            warn!(schema = T::NAME, error = %err, "model output rejected");
        })
    }
}

/// Google Generative Language API (`models/{model}:generateContent`).
#[derive(Debug)]
pub struct GeminiTransport {
    api_base: String,
    client: reqwest::Client,
}

impl GeminiTransport {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
}

impl GeminiResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text).filter(|text| !text.trim().is_empty())
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Option<String>, LexicaError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.schema,
            },
        };

        let response = self
            .client
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", request.credential.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|err| LexicaError::provider(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| LexicaError::provider(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&text)
                .map(|parsed| parsed.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status.as_u16(), text.trim()));
            return Err(LexicaError::Provider(message));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|err| LexicaError::provider(format!("unreadable provider response: {err}")))?;
        Ok(parsed.into_text())
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

/// Scripted reply for [`FakeTransport`].
#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Nothing,
    Fail(String),
}

impl FakeReply {
    pub fn json(value: Value) -> Self {
        FakeReply::Text(value.to_string())
    }
}

/// Deterministic transport for tests and offline runs.
///
/// Replies are matched by case-insensitive substring of the prompt, in the
/// order they were registered. Every call is counted, matched or not.
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: RwLock<Vec<(String, FakeReply)>>,
    default_reply: Option<FakeReply>,
    calls: AtomicUsize,
    prompts: RwLock<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, prompt_contains: &str, reply: FakeReply) -> Self {
        self.replies
            .write()
            .push((prompt_contains.to_lowercase(), reply));
        self
    }

    pub fn with_default_reply(mut self, reply: FakeReply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().clone()
    }
}

#[async_trait]
impl ModelTransport for FakeTransport {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Option<String>, LexicaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.write().push(request.prompt.to_string());
        let prompt = request.prompt.to_lowercase();
        let reply = self
            .replies
            .read()
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone());
        match reply {
            Some(FakeReply::Text(text)) => Ok(Some(text)),
            Some(FakeReply::Nothing) => Ok(None),
            Some(FakeReply::Fail(message)) => Err(LexicaError::Provider(message)),
            None => Err(LexicaError::provider(format!(
                "no scripted reply for prompt starting {:?}",
                request.prompt.chars().take(60).collect::<String>()
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
