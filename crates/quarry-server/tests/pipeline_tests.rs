//! End-to-end HTTP pipeline tests.

mod common;

use std::time::Duration;

use common::harness::{spawn_test_server, TestServerConfig, DEEP_MODEL, FAST_MODEL};
use common::http_client::TestClient;

#[tokio::test]
async fn health_and_ready_report_ok() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (status, body) = client.get_json("/healthz").await;
    assert!(status.is_success());
    assert_eq!(body["status"], "ok");

    let (status, body) = client.get_json("/ready").await;
    assert!(status.is_success());
    assert_eq!(body["components"]["corpus"], "ready");
    assert_eq!(body["components"]["embedder_mode"], "stub");
}

#[tokio::test]
async fn root_exposes_cache_stats() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (status, body) = client.get_json("/").await;
    assert!(status.is_success());
    assert_eq!(body["cache_stats"]["capacity"], 64);
}

#[tokio::test]
async fn query_returns_grounded_answer_with_metadata() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (status, body, header) = client
        .ask("what billing plans are available for the enterprise team tier")
        .await;

    assert!(status.is_success());
    assert_eq!(header, "miss");
    assert_eq!(
        body["answer"],
        "Plans start at $10 per seat for the starter tier [1]."
    );
    assert_eq!(body["metadata"]["cache_hit"], false);
    assert_eq!(body["metadata"]["tier"], "fast");
    assert_eq!(body["metadata"]["model_used"], FAST_MODEL);
    assert!(body["conversation_id"]
        .as_str()
        .unwrap()
        .starts_with("conv_"));
    assert!(!body["sources"].as_array().unwrap().is_empty());
    assert_eq!(
        body["sources"][0]["document"].as_str().unwrap(),
        "official_pricing.pdf"
    );
}

#[tokio::test]
async fn second_identical_query_is_served_from_cache() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    // Long enough to skip expansion so exactly one provider call happens.
    let question = "what billing plans are available for the enterprise team tier";

    let (_, first, header) = client.ask(question).await;
    assert_eq!(header, "miss");
    let calls_after_first = server.backend.call_count();
    assert_eq!(calls_after_first, 1);

    let (_, second, header) = client.ask(question).await;
    assert_eq!(header, "hit");
    assert_eq!(second["metadata"]["cache_hit"], true);
    assert_eq!(second["answer"], first["answer"]);
    // No retrieval or generation ran for the hit.
    assert_eq!(server.backend.call_count(), calls_after_first);
}

#[tokio::test]
async fn cache_expiry_reruns_the_full_pipeline() {
    let server = spawn_test_server(TestServerConfig {
        cache_ttl: Duration::from_millis(100),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.url());

    let question = "what billing plans are available for the enterprise team tier";

    let (_, _, header) = client.ask(question).await;
    assert_eq!(header, "miss");

    tokio::time::sleep(Duration::from_millis(250)).await;

    let (_, body, header) = client.ask(question).await;
    assert_eq!(header, "miss");
    assert_eq!(body["metadata"]["cache_hit"], false);
    assert_eq!(server.backend.call_count(), 2);
}

#[tokio::test]
async fn reasoning_queries_route_to_the_deep_tier() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (_, body, _) = client
        .ask("explain why oauth tokens rotate and compare the expiry policies between plans")
        .await;

    assert_eq!(body["metadata"]["tier"], "deep");
    assert_eq!(body["metadata"]["model_used"], DEEP_MODEL);
    assert!(body["metadata"]["routing_score"].as_u64().unwrap() >= 2);

    let answer_call = server.backend.calls().pop().unwrap();
    assert_eq!(answer_call.model, DEEP_MODEL);
}

#[tokio::test]
async fn short_queries_expand_before_embedding() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (status, _, _) = client.ask("pricing?").await;
    assert!(status.is_success());

    let calls = server.backend.calls();
    assert_eq!(calls.len(), 2, "expansion call plus answer call");

    // The expansion ran first, on the fast tier, with the HyDE prompt.
    assert_eq!(calls[0].model, FAST_MODEL);
    assert_eq!(calls[0].user, "pricing");
    assert!(calls[0]
        .system
        .as_deref()
        .unwrap()
        .contains("documentation assistant"));

    // The answer call carries the grounded system prompt instead.
    assert!(calls[1]
        .system
        .as_deref()
        .unwrap()
        .contains("Source Sections"));
}

#[tokio::test]
async fn empty_corpus_yields_no_context_without_failing() {
    let server = spawn_test_server(TestServerConfig {
        corpus: vec![],
        response_text: "I could not find this information in the documentation.".to_string(),
        ..Default::default()
    })
    .await;
    let client = TestClient::new(server.url());

    let (status, body, _) = client
        .ask("what billing plans are available for the enterprise team tier")
        .await;

    assert!(status.is_success(), "empty evidence is not an error");
    let flags: Vec<String> = body["metadata"]["evaluator_flags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap().to_string())
        .collect();
    assert!(flags.contains(&"no_context".to_string()));
    assert_eq!(body["metadata"]["candidate_count"], 0);
    assert!(body["sources"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let (status, _, header) = client.ask("   ").await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(header, "invalid_request");
}

#[tokio::test]
async fn persistent_provider_failure_is_fatal_to_the_request() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    // Both the initial attempt and the single retry fail.
    server.backend.fail_next(2);

    let (status, _, header) = client
        .ask("what billing plans are available for the enterprise team tier")
        .await;
    assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(header, "provider_error");
}

#[tokio::test]
async fn streaming_delivers_tokens_then_a_terminal_metadata_event() {
    let server = spawn_test_server(TestServerConfig::default()).await;
    let client = TestClient::new(server.url());

    let transcript = client
        .ask_stream("what billing plans are available for the enterprise team tier")
        .await;

    let first_token = transcript.find("event: token").expect("token events");
    let metadata_at = transcript.find("event: metadata").expect("metadata event");
    let done_at = transcript.find("[DONE]").expect("terminator");

    // Channel ordering: tokens, then the structured summary, then [DONE].
    assert!(first_token < metadata_at);
    assert!(metadata_at < done_at);

    // The metadata payload parses and carries the routing decision.
    let metadata_line = transcript[metadata_at..]
        .lines()
        .find(|l| l.starts_with("data: "))
        .expect("metadata data line");
    let metadata: serde_json::Value =
        serde_json::from_str(metadata_line.trim_start_matches("data: ")).expect("metadata json");
    assert_eq!(metadata["tier"], "fast");
    assert_eq!(metadata["cache_hit"], false);

    // Reassembling the token deltas yields the full answer.
    let answer: String = transcript[..metadata_at]
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();
    assert_eq!(
        answer,
        "Plans start at $10 per seat for the starter tier [1]."
    );
}
