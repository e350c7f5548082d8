//! Streaming query handler.
//!
//! Answer tokens stream to the caller as `token` SSE events while the
//! structured summary is withheld until the stream ends: one terminal
//! `metadata` event, then a `[DONE]` data marker. Event names are the
//! delimiter contract between the two logical channels.
//!
//! Streaming requests bypass the response cache: entries memoize complete
//! answers, and a partially delivered stream has none to offer.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Json,
};
use futures_util::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, instrument, warn};

use quarry::{evaluate_answer, route_query, QueryContext};

use super::error::GatewayError;
use super::payload::{QueryRequest, ResponseMetadata, TokenUsage};
use super::state::HandlerState;

const EVENT_TOKEN: &str = "token";
const EVENT_METADATA: &str = "metadata";
const STREAM_TERMINATOR: &str = "[DONE]";
const CHANNEL_CAPACITY: usize = 64;

#[instrument(skip(state, request), fields(question_len = request.question.len()))]
pub async fn query_stream_handler(
    State(state): State<HandlerState>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, GatewayError> {
    if request.question.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "question must not be empty".to_string(),
        ));
    }

    let started = std::time::Instant::now();
    let history = request.history.clone().unwrap_or_default();
    let ctx = QueryContext::new(request.question.clone(), history);

    let route = route_query(ctx.question(), &state.router_config);
    let retrieval = state.retriever.retrieve(&ctx).await?;

    let evidence = retrieval.passages();
    let mut tokens = state
        .generator
        .answer_stream(ctx.question(), &evidence, route.tier, ctx.history())
        .await?;

    let model_used = state.generator.model_for(route.tier).to_string();
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        use futures_util::StreamExt;

        let mut accumulated = String::new();

        while let Some(item) = tokens.next().await {
            match item {
                Ok(delta) => {
                    accumulated.push_str(&delta);
                    let event = Event::default().event(EVENT_TOKEN).data(delta);
                    if tx.send(Ok(event)).await.is_err() {
                        debug!("Stream consumer went away, abandoning");
                        return;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Provider stream error");
                    let event = Event::default()
                        .event("error")
                        .data("stream interrupted by upstream error");
                    let _ = tx.send(Ok(event)).await;
                    break;
                }
            }
        }

        // Terminal structured summary, delivered after the token channel
        // has drained.
        let flags = evaluate_answer(
            &accumulated,
            &retrieval.candidates,
            state.retrieval_config.evidence_similarity_floor,
            state.retrieval_config.min_overlap_ratio,
        );
        let metadata = ResponseMetadata {
            model_used,
            tier: route.tier,
            routing_score: route.score,
            // Token accounting is unavailable for streamed completions.
            tokens: TokenUsage { input: 0, output: 0 },
            latency_ms: started.elapsed().as_millis() as u64,
            retrieval_latency_ms: retrieval.metrics.total_latency_ms,
            candidate_count: retrieval.metrics.candidate_count,
            avg_similarity: retrieval.metrics.avg_similarity,
            evaluator_flags: flags,
            cache_hit: false,
        };

        match serde_json::to_string(&metadata) {
            Ok(json) => {
                let event = Event::default().event(EVENT_METADATA).data(json);
                let _ = tx.send(Ok(event)).await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize stream metadata");
                let _ = tx
                    .send(Ok(Event::default().comment("metadata-error")))
                    .await;
            }
        }

        let _ = tx
            .send(Ok(Event::default().data(STREAM_TERMINATOR)))
            .await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)))
}
