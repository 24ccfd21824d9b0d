//! HTTP fetcher tests
//!
//! These tests use wiremock to create mock HTTP servers and check status
//! classification, retry counts and a full run over real HTTP.

use precinct_harvest::config::Config;
use precinct_harvest::crawler::{Fetch, FetchResult, HttpFetcher, RunCoordinator};
use precinct_harvest::endpoint::{Endpoint, EndpointKind};
use precinct_harvest::hierarchy::{LeafKey, Level, TreeKind};
use precinct_harvest::state::RunState;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fetcher configuration with near-zero backoff
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.source.base_url = base_url.to_string();
    config.harvester.max_attempts = 3;
    config.harvester.backoff_base_ms = 1;
    config.harvester.backoff_max_ms = 5;
    config.harvester.backoff_jitter_ms = 0;
    config.harvester.request_delay_ms = 0;
    config.harvester.request_timeout_ms = 2_000;
    config
}

fn leaf_endpoint(server: &MockServer, leaf_path: &str) -> Endpoint {
    Endpoint {
        url: Url::parse(&format!("{}{}", server.uri(), leaf_path)).unwrap(),
        level: Level::Precinct,
        kind: EndpointKind::Leaf,
    }
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_transient_twice_then_success() {
    let server = MockServer::start().await;

    // Higher priority mock answers the first two requests only
    Mock::given(method("GET"))
        .and(path("/data/er/010/0100001.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/er/010/0100001.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"information": {"location": "A, B, C"}})),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&server.uri())).unwrap();
    let result = fetcher
        .fetch(&leaf_endpoint(&server, "/data/er/010/0100001.json"))
        .await;

    match result {
        FetchResult::Success {
            document,
            content_hash,
        } => {
            assert_eq!(document["information"]["location"], "A, B, C");
            assert_eq!(content_hash.len(), 64);
        }
        other => panic!("Expected success, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&server.uri())).unwrap();
    let result = fetcher.fetch(&leaf_endpoint(&server, "/data/er/010/x.json")).await;

    match result {
        FetchResult::TransientFailure { cause } => assert!(cause.contains("429")),
        other => panic!("Expected transient failure, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&server.uri())).unwrap();
    let result = fetcher.fetch(&leaf_endpoint(&server, "/data/er/010/x.json")).await;

    assert!(matches!(result, FetchResult::NotFound));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&server.uri())).unwrap();
    let result = fetcher.fetch(&leaf_endpoint(&server, "/data/er/010/x.json")).await;

    match result {
        FetchResult::PermanentFailure { cause } => assert_eq!(cause, "HTTP 400"),
        other => panic!("Expected permanent failure, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_invalid_json_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&create_test_config(&server.uri())).unwrap();
    let result = fetcher.fetch(&leaf_endpoint(&server, "/data/er/010/x.json")).await;

    match result {
        FetchResult::PermanentFailure { cause } => assert!(cause.starts_with("invalid JSON")),
        other => panic!("Expected permanent failure, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 1);
}

async fn mount_json(server: &MockServer, at: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_over_http() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(
        &server,
        "/data/regions/local/R001000.json",
        json!({"regions": [{"code": "0128", "name": "ILOCOS NORTE"}]}),
    )
    .await;
    mount_json(
        &server,
        "/data/regions/local/0128.json",
        json!({"regions": [{"code": "012801", "name": "ADAMS"}]}),
    )
    .await;
    mount_json(
        &server,
        "/data/regions/local/012801.json",
        json!({"regions": [{"code": "01280001", "name": "ADAMS (POB.)"}]}),
    )
    .await;
    mount_json(
        &server,
        "/data/regions/precinct/01/01280001.json",
        json!({"regions": [
            {"code": "0100001", "name": "0100001"},
            {"code": "0100002", "name": "0100002"},
            {"code": "0100001", "name": "duplicate"}
        ]}),
    )
    .await;
    for code in ["0100001", "0100002"] {
        mount_json(
            &server,
            &format!("/data/er/010/{}.json", code),
            json!({"information": {"location": format!("REGION I, ILOCOS NORTE, ADAMS, {}", code)}}),
        )
        .await;
    }

    let mut config = create_test_config(&server.uri());
    config.output.artifact_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.output.index_path = dir.path().join("harvest.db").to_string_lossy().into_owned();
    config.scope.trees = vec![TreeKind::Local];
    config.scope.only = vec!["R001000".to_string()];

    let mut coordinator = RunCoordinator::new(config, "hash".to_string()).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.leaves_succeeded, 2);

    let stored = coordinator
        .writer()
        .list_under(&LeafKey::parse("R001000").unwrap())
        .unwrap();
    assert_eq!(
        stored,
        vec![
            LeafKey::parse("R001000/0128/012801/01280001/0100001").unwrap(),
            LeafKey::parse("R001000/0128/012801/01280001/0100002").unwrap(),
        ]
    );

    // 4 listings + 2 leaves; the duplicate precinct is fetched once
    assert_eq!(request_count(&server).await, 6);
}
