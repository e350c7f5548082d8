use std::sync::Arc;

use axum::response::IntoResponse;

use quarry::{
    EmbeddingError, GenerationError, Passage, RankedCandidate, RetrievalError,
};

use super::error::GatewayError;
use super::handler::evidence_refs;
use super::payload::conversation_id_or_new;
use super::QUARRY_STATUS_HEADER;

fn candidate(doc_id: &str, tiered: f32, rerank: Option<f32>) -> RankedCandidate {
    let mut c = RankedCandidate::from_passage(Arc::new(Passage {
        chunk_id: format!("{doc_id}_0"),
        doc_id: doc_id.to_string(),
        section: Some("Pricing".to_string()),
        page: Some(3),
        text: "Plans start at $10 per seat.".to_string(),
    }));
    c.tiered_score = tiered;
    c.rerank_score = rerank;
    c
}

#[test]
fn evidence_refs_prefer_rerank_scores_and_round() {
    let refs = evidence_refs(&[
        candidate("official_pricing.pdf", 0.03, Some(0.123456)),
        candidate("community_faq.pdf", 0.0321117, None),
    ]);

    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].document, "official_pricing.pdf");
    assert_eq!(refs[0].section.as_deref(), Some("Pricing"));
    assert_eq!(refs[0].page, Some(3));
    assert!((refs[0].relevance_score - 0.1235).abs() < 1e-6);
    // No rerank score: the tiered score is surfaced, rounded.
    assert!((refs[1].relevance_score - 0.0321).abs() < 1e-6);
}

#[test]
fn conversation_ids_pass_through_or_generate() {
    assert_eq!(
        conversation_id_or_new(Some("conv_abc".to_string())),
        "conv_abc"
    );

    let generated = conversation_id_or_new(None);
    assert!(generated.starts_with("conv_"));
    assert_ne!(generated, conversation_id_or_new(None));
}

#[test]
fn error_responses_map_to_expected_statuses() {
    let cases = [
        (
            GatewayError::InvalidRequest("empty".to_string()),
            axum::http::StatusCode::BAD_REQUEST,
        ),
        (
            GatewayError::Retrieval(RetrievalError::AllSourcesFailed),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            GatewayError::Retrieval(RetrievalError::Embedding(
                EmbeddingError::MalformedResponse {
                    reason: "bad".to_string(),
                },
            )),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            GatewayError::Generation(GenerationError::EmptyCompletion),
            axum::http::StatusCode::BAD_GATEWAY,
        ),
    ];

    for (error, expected) in cases {
        let response = error.into_response();
        assert_eq!(response.status(), expected);
        assert!(response.headers().contains_key(QUARRY_STATUS_HEADER));
    }
}
