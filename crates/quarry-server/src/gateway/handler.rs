use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info, instrument};

use quarry::{
    evaluate_answer, route_query, sanitize_answer, CachedAnswer, EvidenceRef, QueryContext,
    QueryLogRecord, RankedCandidate,
};

use super::error::GatewayError;
use super::payload::{conversation_id_or_new, QueryRequest, QueryResponse};
use super::state::HandlerState;
use super::{QUARRY_STATUS_HEADER, QUARRY_STATUS_HIT, QUARRY_STATUS_MISS};

#[instrument(skip(state, request), fields(question_len = request.question.len()))]
pub async fn query_handler(
    State(state): State<HandlerState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, GatewayError> {
    let started = Instant::now();

    if request.question.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "question must not be empty".to_string(),
        ));
    }

    let history = request.history.clone().unwrap_or_default();
    let ctx = QueryContext::new(request.question.clone(), history);
    let conversation_id = conversation_id_or_new(request.conversation_id.clone());

    // A cache hit short-circuits routing, retrieval, and generation.
    let key = ctx.cache_key();
    if let Some(cached) = state.cache.get(&key) {
        info!("Response cache hit");
        let response = QueryResponse::from_answer(
            &cached,
            conversation_id,
            started.elapsed().as_millis() as u64,
            true,
        );
        return Ok(make_response(response, QUARRY_STATUS_HIT));
    }

    let route = route_query(ctx.question(), &state.router_config);
    debug!(tier = %route.tier, score = route.score, "Query routed");

    let retrieval = state.retriever.retrieve(&ctx).await?;

    let evidence = retrieval.passages();
    let completion = state
        .generator
        .answer(ctx.question(), &evidence, route.tier, ctx.history())
        .await?;

    let flags = evaluate_answer(
        &completion.text,
        &retrieval.candidates,
        state.retrieval_config.evidence_similarity_floor,
        state.retrieval_config.min_overlap_ratio,
    );
    let answer_text = sanitize_answer(&completion.text);

    let total_latency_ms = started.elapsed().as_millis() as u64;

    let cached_answer = Arc::new(CachedAnswer {
        answer: answer_text,
        sources: evidence_refs(&retrieval.candidates),
        model_used: state.generator.model_for(route.tier).to_string(),
        tier: route.tier,
        routing_score: route.score,
        tokens_input: completion.prompt_tokens,
        tokens_output: completion.completion_tokens,
        retrieval_latency_ms: retrieval.metrics.total_latency_ms,
        candidate_count: retrieval.metrics.candidate_count,
        avg_similarity: retrieval.metrics.avg_similarity,
        evaluator_flags: flags,
        created_at: chrono::Utc::now(),
    });

    state.cache.insert(key, Arc::clone(&cached_answer));

    state.query_log.record(QueryLogRecord {
        timestamp: cached_answer.created_at,
        query: request.question,
        tier: route.tier,
        model_used: cached_answer.model_used.clone(),
        routing_score: route.score,
        tokens_input: cached_answer.tokens_input,
        tokens_output: cached_answer.tokens_output,
        latency_ms: total_latency_ms,
        retrieval_latency_ms: cached_answer.retrieval_latency_ms,
        candidate_count: cached_answer.candidate_count,
        avg_similarity: cached_answer.avg_similarity,
        evaluator_flags: cached_answer.evaluator_flags.clone(),
        cache_hit: false,
    });

    let response =
        QueryResponse::from_answer(&cached_answer, conversation_id, total_latency_ms, false);
    Ok(make_response(response, QUARRY_STATUS_MISS))
}

/// Maps surfaced candidates to caller-facing evidence references.
pub(crate) fn evidence_refs(candidates: &[RankedCandidate]) -> Vec<EvidenceRef> {
    candidates
        .iter()
        .map(|c| EvidenceRef {
            document: c.passage.doc_id.clone(),
            section: c.passage.section.clone(),
            page: c.passage.page,
            relevance_score: round4(c.final_score()),
        })
        .collect()
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn make_response(response: QueryResponse, status: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(QUARRY_STATUS_HEADER, HeaderValue::from_static(status));
    (StatusCode::OK, headers, Json(response)).into_response()
}
