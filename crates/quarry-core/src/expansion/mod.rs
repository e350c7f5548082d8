//! HyDE query expansion.
//!
//! Short queries carry too little signal for dense retrieval, so a fast
//! generative call imagines the documentation passage that would answer
//! them and the embedding is taken over `"{query} {hypothetical}"` instead.
//! This is the only retrieval-path component that depends on a live
//! generative call; any failure or timeout silently falls back to the raw
//! query, and the lexical branch never waits on it.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::generation::{CompletionBackend, Prompt};
use crate::query::QueryContext;

const EXPANSION_TEMPERATURE: f64 = 0.3;
const EXPANSION_MAX_TOKENS: u32 = 120;

const EXPANSION_SYSTEM_PROMPT: &str = "\
You are a documentation assistant. Generate a short, plausible excerpt from \
product documentation that would directly answer the following user \
question. Write as if it were a real support doc passage (2-4 sentences).";

/// Expands short queries into hypothetical documentation passages.
pub struct QueryExpander {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    short_query_words: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        short_query_words: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            short_query_words,
            timeout,
        }
    }

    /// Returns the enriched embedding text for a short query, or `None`
    /// when the query is long enough or expansion fails.
    pub async fn expand(&self, ctx: &QueryContext) -> Option<String> {
        if !ctx.is_short(self.short_query_words) {
            return None;
        }

        let prompt = Prompt::new(ctx.normalized().to_string())
            .system(EXPANSION_SYSTEM_PROMPT)
            .temperature(EXPANSION_TEMPERATURE)
            .max_tokens(EXPANSION_MAX_TOKENS);

        let result =
            tokio::time::timeout(self.timeout, self.backend.complete(&self.model, &prompt)).await;

        match result {
            Ok(Ok(completion)) => {
                let hypothetical = completion.text.trim();
                if hypothetical.is_empty() {
                    return None;
                }
                debug!(
                    query = ctx.normalized(),
                    expansion_len = hypothetical.len(),
                    "HyDE expansion used for embedding"
                );
                Some(format!("{} {}", ctx.normalized(), hypothetical))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "HyDE expansion failed, embedding raw query");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "HyDE expansion timed out");
                None
            }
        }
    }
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("model", &self.model)
            .field("short_query_words", &self.short_query_words)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockBackend;

    fn expander(backend: Arc<MockBackend>) -> QueryExpander {
        QueryExpander::new(backend, "fast-model", 8, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn short_query_is_expanded() {
        let backend = Arc::new(MockBackend::new("Pricing starts at ten dollars per seat."));
        let expander = expander(backend.clone());

        let ctx = QueryContext::new("pricing?", vec![]);
        let expanded = expander.expand(&ctx).await.unwrap();

        assert!(expanded.starts_with("pricing "));
        assert!(expanded.contains("ten dollars"));

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "fast-model");
    }

    #[tokio::test]
    async fn long_query_is_not_expanded() {
        let backend = Arc::new(MockBackend::new("unused"));
        let expander = expander(backend.clone());

        let ctx = QueryContext::new(
            "how do i configure single sign on for my whole engineering team",
            vec![],
        );
        assert!(expander.expand(&ctx).await.is_none());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn failure_falls_back_to_raw_query() {
        let backend = Arc::new(MockBackend::new("unused"));
        backend.fail_next(2);
        let expander = expander(backend);

        let ctx = QueryContext::new("pricing?", vec![]);
        assert!(expander.expand(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn empty_expansion_falls_back() {
        let backend = Arc::new(MockBackend::new("   "));
        let expander = expander(backend);

        let ctx = QueryContext::new("pricing?", vec![]);
        assert!(expander.expand(&ctx).await.is_none());
    }
}
