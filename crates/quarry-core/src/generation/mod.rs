//! Generation service clients.
//!
//! The provider is a black-box completion service reached through
//! [`CompletionBackend`]; [`GenaiBackend`] is the production implementation
//! over `genai`, and [`MockBackend`] records calls for tests. The
//! [`AnswerGenerator`] owns tier-to-model mapping, grounded prompt
//! assembly, and the single-retry policy.

pub mod error;
pub mod prompt;

pub use error::GenerationError;

use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use genai::Client;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::corpus::Passage;
use crate::query::{ChatTurn, TurnRole};
use crate::routing::Tier;

const ANSWER_TEMPERATURE: f64 = 0.0;
const ANSWER_MAX_TOKENS: u32 = 600;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// One prompt sent to the provider.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: Option<String>,
    pub history: Vec<ChatTurn>,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            history: Vec::new(),
            user: user.into(),
            temperature: ANSWER_TEMPERATURE,
            max_tokens: ANSWER_MAX_TOKENS,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Completed (non-streaming) provider response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Incremental answer deltas from a streaming completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Black-box text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &Prompt) -> Result<Completion, GenerationError>;

    async fn complete_stream(
        &self,
        model: &str,
        prompt: &Prompt,
    ) -> Result<TokenStream, GenerationError>;
}

fn prompt_to_chat_request(prompt: &Prompt) -> ChatRequest {
    let mut messages = Vec::with_capacity(prompt.history.len() + 2);
    if let Some(system) = &prompt.system {
        messages.push(ChatMessage::system(system.clone()));
    }
    for turn in &prompt.history {
        match turn.role {
            TurnRole::User => messages.push(ChatMessage::user(turn.text.clone())),
            TurnRole::Bot => messages.push(ChatMessage::assistant(turn.text.clone())),
        }
    }
    messages.push(ChatMessage::user(prompt.user.clone()));
    ChatRequest::new(messages)
}

/// Production backend over the `genai` provider client.
pub struct GenaiBackend {
    client: Client,
}

impl GenaiBackend {
    pub fn new() -> Self {
        Self {
            client: Client::default(),
        }
    }
}

impl Default for GenaiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for GenaiBackend {
    async fn complete(&self, model: &str, prompt: &Prompt) -> Result<Completion, GenerationError> {
        let request = prompt_to_chat_request(prompt);
        let options = ChatOptions::default()
            .with_temperature(prompt.temperature)
            .with_max_tokens(prompt.max_tokens);

        let response = self
            .client
            .exec_chat(model, request, Some(&options))
            .await
            .map_err(|e| {
                error!(model, error = %e, "Provider request failed");
                GenerationError::Provider(e.to_string())
            })?;

        let text = response
            .first_text()
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .ok_or(GenerationError::EmptyCompletion)?;

        let usage = &response.usage;
        Ok(Completion {
            text,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0).max(0) as u32,
            completion_tokens: usage.completion_tokens.unwrap_or(0).max(0) as u32,
        })
    }

    async fn complete_stream(
        &self,
        model: &str,
        prompt: &Prompt,
    ) -> Result<TokenStream, GenerationError> {
        let request = prompt_to_chat_request(prompt);
        let options = ChatOptions::default()
            .with_temperature(prompt.temperature)
            .with_max_tokens(prompt.max_tokens);

        let response = self
            .client
            .exec_chat_stream(model, request, Some(&options))
            .await
            .map_err(|e| {
                error!(model, error = %e, "Provider stream init failed");
                GenerationError::Provider(e.to_string())
            })?;

        let stream = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    Some(Ok(chunk.content))
                }
                Ok(_) => None,
                Err(e) => Some(Err(GenerationError::Stream(e.to_string()))),
            }
        });

        Ok(Box::pin(stream))
    }
}

impl std::fmt::Debug for GenaiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiBackend").finish_non_exhaustive()
    }
}

/// Tier-aware grounded answer generation with a single-retry policy.
pub struct AnswerGenerator {
    backend: Arc<dyn CompletionBackend>,
    fast_model: String,
    deep_model: String,
}

impl AnswerGenerator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        fast_model: impl Into<String>,
        deep_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            fast_model: fast_model.into(),
            deep_model: deep_model.into(),
        }
    }

    /// Maps a routing tier to the configured model id.
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Fast => &self.fast_model,
            Tier::Deep => &self.deep_model,
        }
    }

    /// Shared backend handle (the expander issues its own fast-tier calls).
    pub fn backend(&self) -> Arc<dyn CompletionBackend> {
        Arc::clone(&self.backend)
    }

    fn grounded_prompt(
        question: &str,
        evidence: &[Arc<Passage>],
        history: &[ChatTurn],
    ) -> Prompt {
        Prompt::new(prompt::build_user_message(question, evidence))
            .system(prompt::SYSTEM_PROMPT)
            .history(history.to_vec())
    }

    /// Generates a grounded answer; retried once on failure, fatal after.
    pub async fn answer(
        &self,
        question: &str,
        evidence: &[Arc<Passage>],
        tier: Tier,
        history: &[ChatTurn],
    ) -> Result<Completion, GenerationError> {
        let model = self.model_for(tier);
        let prompt = Self::grounded_prompt(question, evidence, history);

        match self.backend.complete(model, &prompt).await {
            Ok(completion) => Ok(completion),
            Err(e) => {
                warn!(model, error = %e, "Generation failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.backend.complete(model, &prompt).await
            }
        }
    }

    /// Streaming variant; the stream itself is not retried once started.
    pub async fn answer_stream(
        &self,
        question: &str,
        evidence: &[Arc<Passage>],
        tier: Tier,
        history: &[ChatTurn],
    ) -> Result<TokenStream, GenerationError> {
        let model = self.model_for(tier);
        let prompt = Self::grounded_prompt(question, evidence, history);

        match self.backend.complete_stream(model, &prompt).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                warn!(model, error = %e, "Stream init failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.backend.complete_stream(model, &prompt).await
            }
        }
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("fast_model", &self.fast_model)
            .field("deep_model", &self.deep_model)
            .finish()
    }
}

/// Call-recording mock backend for tests.
#[cfg(any(test, feature = "mock"))]
pub struct MockBackend {
    response_text: std::sync::Mutex<String>,
    fail_next: std::sync::atomic::AtomicU32,
    calls: std::sync::Mutex<Vec<MockCall>>,
}

/// One recorded call against [`MockBackend`].
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub streaming: bool,
}

#[cfg(any(test, feature = "mock"))]
impl MockBackend {
    pub fn new(response_text: impl Into<String>) -> Self {
        Self {
            response_text: std::sync::Mutex::new(response_text.into()),
            fail_next: std::sync::atomic::AtomicU32::new(0),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Replaces the canned response text.
    pub fn set_response(&self, text: impl Into<String>) {
        *self.response_text.lock().unwrap() = text.into();
    }

    /// Makes the next `n` calls fail with a provider error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, model: &str, prompt: &Prompt, streaming: bool) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(MockCall {
            model: model.to_string(),
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            streaming,
        });

        let remaining = self.fail_next.load(std::sync::atomic::Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next
                .store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
            return Err(GenerationError::Provider("mock failure".to_string()));
        }

        Ok(self.response_text.lock().unwrap().clone())
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, model: &str, prompt: &Prompt) -> Result<Completion, GenerationError> {
        let text = self.record(model, prompt, false)?;
        tracing::debug!(model, "Mock completion");
        Ok(Completion {
            text,
            prompt_tokens: 10,
            completion_tokens: 10,
        })
    }

    async fn complete_stream(
        &self,
        model: &str,
        prompt: &Prompt,
    ) -> Result<TokenStream, GenerationError> {
        let text = self.record(model, prompt, true)?;
        let chunks: Vec<Result<String, GenerationError>> = text
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

#[cfg(any(test, feature = "mock"))]
impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> Arc<Passage> {
        Arc::new(Passage {
            chunk_id: "c_0".to_string(),
            doc_id: "doc".to_string(),
            section: None,
            page: None,
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn answer_uses_the_tier_model() {
        let backend = Arc::new(MockBackend::new("Answer [1]."));
        let generator = AnswerGenerator::new(backend.clone(), "fast-model", "deep-model");

        generator
            .answer("what is sso", &[passage("SSO doc.")], Tier::Deep, &[])
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "deep-model");
        assert!(calls[0].system.as_deref().unwrap().contains("Source Sections"));
        assert!(calls[0].user.contains("SSO doc."));
    }

    #[tokio::test]
    async fn answer_retries_once_then_succeeds() {
        let backend = Arc::new(MockBackend::new("Recovered."));
        backend.fail_next(1);
        let generator = AnswerGenerator::new(backend.clone(), "fast", "deep");

        let completion = generator
            .answer("q", &[], Tier::Fast, &[])
            .await
            .unwrap();
        assert_eq!(completion.text, "Recovered.");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn answer_fails_after_second_error() {
        let backend = Arc::new(MockBackend::new("unused"));
        backend.fail_next(2);
        let generator = AnswerGenerator::new(backend.clone(), "fast", "deep");

        let result = generator.answer("q", &[], Tier::Fast, &[]).await;
        assert!(result.is_err());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_stream_reassembles_to_the_response() {
        use futures_util::StreamExt;

        let backend = Arc::new(MockBackend::new("token by token"));
        let generator = AnswerGenerator::new(backend, "fast", "deep");

        let mut stream = generator
            .answer_stream("q", &[], Tier::Fast, &[])
            .await
            .unwrap();

        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta.unwrap());
        }
        assert_eq!(text, "token by token");
    }
}
