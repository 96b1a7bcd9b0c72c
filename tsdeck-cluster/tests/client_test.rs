use serde_json::{json, Value};
use std::time::Duration;
use tsdeck::{ConsoleError, ImportAction, SearchParameters, SearchSession};
use tsdeck_cluster::{ClientConfig, Node, TypesenseClient};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn node_for(server: &MockServer) -> Node {
    Node::parse(&server.uri()).unwrap()
}

fn config(servers: &[&MockServer], num_retries: u32) -> ClientConfig {
    ClientConfig::new(servers.iter().map(|s| node_for(s)).collect(), "xyz")
        .with_num_retries(num_retries)
        .with_retry_interval(0.0)
        .with_connection_timeout(2.0)
}

fn books_schema() -> Value {
    json!({
        "name": "books",
        "fields": [
            {"name": "title", "type": "string"},
            {"name": "author", "type": "string", "facet": true}
        ],
        "num_documents": 2,
        "created_at": 1700000000
    })
}

fn search_body(found: u64, facets: Value) -> Value {
    json!({
        "facet_counts": facets,
        "found": found,
        "out_of": 40,
        "page": 1,
        "request_params": {"collection_name": "books", "q": "dune", "per_page": 10},
        "search_time_ms": 1,
        "hits": [{
            "document": {"id": "1", "title": "Dune", "author": "Frank Herbert"},
            "highlights": [{"field": "title", "snippet": "<mark>Dune</mark>", "matched_tokens": ["Dune"]}],
            "text_match": 578730123365711993u64
        }]
    })
}

// ── retry and failover ──────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_retries_make_initial_plus_num_retries_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(4)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 3)).unwrap();
    let err = client.list_collections().await.unwrap_err();
    assert_eq!(
        err,
        ConsoleError::Http {
            status: 500,
            reason: "Internal Server Error".into()
        }
    );
}

#[tokio::test]
async fn zero_retries_make_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    assert!(client.list_collections().await.is_err());
}

#[tokio::test]
async fn failed_node_is_skipped_for_next_node() {
    let down = MockServer::start().await;
    let up = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&down)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([books_schema()])))
        .expect(2)
        .mount(&up)
        .await;

    let client = TypesenseClient::new(&config(&[&down, &up], 3)).unwrap();
    let collections = client.list_collections().await.unwrap();
    assert_eq!(collections[0].name, "books");
    assert_eq!(client.pool().current(), &node_for(&up));

    // The next request starts from the node that answered.
    client.list_collections().await.unwrap();
}

#[tokio::test]
async fn retries_wrap_around_a_small_pool() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    for server in [&a, &b] {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(server)
            .await;
    }

    let client = TypesenseClient::new(&config(&[&a, &b], 3)).unwrap();
    assert!(client.health().await.is_err());
}

#[tokio::test]
async fn final_failed_attempt_leaves_cursor_in_place() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    for server in [&a, &b] {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    let client = TypesenseClient::new(&config(&[&a, &b], 0)).unwrap();
    assert!(client.health().await.is_err());
    assert_eq!(client.pool().current_index(), 0);

    // One retry: the first failure moves the cursor, the last one does not.
    let client = TypesenseClient::new(&config(&[&a, &b], 1)).unwrap();
    assert!(client.health().await.is_err());
    assert_eq!(client.pool().current_index(), 1);
}

#[tokio::test]
async fn success_after_transient_failure_on_same_node() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/books"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books"))
        .respond_with(ResponseTemplate::new(200).set_body_json(books_schema()))
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 1)).unwrap();
    let schema = client.get_collection("books").await.unwrap();
    assert_eq!(schema.field_names(), vec!["title", "author"]);
}

// ── error surfacing ─────────────────────────────────────────────────────

#[tokio::test]
async fn structured_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
        )
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let err = client.get_collection("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Typesense Error (404): Not Found");
}

#[tokio::test]
async fn malformed_success_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 3)).unwrap();
    let err = client.list_collections().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Decode(_)));
}

#[tokio::test]
async fn unreachable_node_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cfg = ClientConfig::new(
        vec![Node::parse(&format!("http://127.0.0.1:{}", port)).unwrap()],
        "xyz",
    )
    .with_num_retries(1)
    .with_retry_interval(0.0);
    let client = TypesenseClient::new(&cfg).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Transport { .. }), "{:?}", err);
}

#[tokio::test]
async fn slow_node_times_out_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let cfg = config(&[&server], 1).with_connection_timeout(0.1);
    let client = TypesenseClient::new(&cfg).unwrap();
    match client.health().await {
        Err(ConsoleError::Transport { message, .. }) => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
}

// ── connect and headers ─────────────────────────────────────────────────

#[tokio::test]
async fn connect_checks_health_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("X-TYPESENSE-API-KEY", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    TypesenseClient::connect(&config(&[&server], 0)).await.unwrap();
}

#[tokio::test]
async fn connect_fails_when_service_reports_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false})))
        .mount(&server)
        .await;

    assert!(TypesenseClient::connect(&config(&[&server], 0)).await.is_err());
}

#[tokio::test]
async fn json_body_carries_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .and(header("content-type", "application/json"))
        .and(header("X-TYPESENSE-API-KEY", "xyz"))
        .respond_with(ResponseTemplate::new(201).set_body_json(books_schema()))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let schema = serde_json::from_value(books_schema()).unwrap();
    let created = client.create_collection(&schema).await.unwrap();
    assert_eq!(created.num_documents, Some(2));
}

// ── documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn document_ids_are_path_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/a%20b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a b"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let doc: Value = client.get_document("books", "a b").await.unwrap();
    assert_eq!(doc["id"], "a b");
}

#[tokio::test]
async fn delete_document_returns_deleted_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/collections/books/documents/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "1", "title": "Dune"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let deleted = client.delete_document("books", "1").await.unwrap();
    assert_eq!(deleted.id, "1");
}

#[tokio::test]
async fn partial_update_uses_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/collections/books/documents/1"))
        .and(body_string(r#"{"title":"Dune Messiah"}"#))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "1", "title": "Dune Messiah"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let updated = client
        .update_document("books", "1", &json!({"title": "Dune Messiah"}))
        .await
        .unwrap();
    assert_eq!(updated["title"], "Dune Messiah");
}

#[tokio::test]
async fn bulk_import_posts_ndjson_and_parses_each_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents/import"))
        .and(query_param("action", "upsert"))
        .and(header("content-type", "text/plain"))
        .and(body_string("{\"id\":\"1\"}\n{\"id\":\"2\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"success\":true}\n{\"success\":false,\"error\":\"Field `title` has been declared in the schema, but is not found in the document.\",\"code\":400,\"document\":\"{\\\"id\\\":\\\"2\\\"}\"}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 3)).unwrap();
    let docs = vec![json!({"id": "1"}), json!({"id": "2"})];
    let results = client
        .import_documents("books", &docs, ImportAction::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].code, Some(400));
}

#[tokio::test]
async fn bulk_import_is_never_retried() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents/import"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&second)
        .await;

    let client = TypesenseClient::new(&config(&[&first, &second], 3)).unwrap();
    let err = client
        .import_documents("books", &[json!({"id": "1"})], ImportAction::Create)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to index documents: 503 Service Unavailable"
    );
    assert_eq!(client.pool().current_index(), 0);
}

// ── search ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_sends_only_present_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/search"))
        .and(query_param("q", "dune"))
        .and(query_param("query_by", "title"))
        .and(query_param("per_page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(1, Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let params = SearchParameters {
        per_page: Some(10),
        ..SearchParameters::new("dune", "title")
    };
    let response = client.search::<Value>("books", &params).await.unwrap();
    assert_eq!(response.found, 1);
    assert_eq!(response.hits[0].document["title"], "Dune");

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(!query.contains("filter_by"), "{}", query);
    assert!(!query.contains("sort_by"), "{}", query);
}

#[tokio::test]
async fn multi_search_returns_result_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/multi_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [search_body(1, Value::Null), search_body(1, Value::Null)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let entries = vec![
        tsdeck::MultiSearchEntry {
            collection: "books".into(),
            params: SearchParameters::new("dune", "title"),
        },
        tsdeck::MultiSearchEntry {
            collection: "books".into(),
            params: SearchParameters::new("emma", "title"),
        },
    ];
    let results = client.multi_search::<Value>(entries).await.unwrap();
    assert_eq!(results.len(), 2);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["searches"][1]["q"], "emma");
    assert_eq!(body["searches"][0]["collection"], "books");
}

#[tokio::test]
async fn metrics_are_returned_as_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"system_cpu_active_percentage\":\"3.2\"}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"search_requests_per_second": 1.5})))
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    assert!(client.metrics().await.unwrap().contains("system_cpu"));
    assert_eq!(client.stats().await.unwrap()["search_requests_per_second"], 1.5);
}

#[tokio::test]
async fn metrics_fail_over_to_next_node() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&a)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&b)
        .await;

    let client = TypesenseClient::new(&config(&[&a, &b], 1)).unwrap();
    assert_eq!(client.metrics().await.unwrap(), "{}");
    assert_eq!(client.pool().current_index(), 1);
}

// ── session over HTTP ───────────────────────────────────────────────────

#[tokio::test]
async fn session_composes_facet_filter_from_previous_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([books_schema()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books"))
        .respond_with(ResponseTemplate::new(200).set_body_json(books_schema()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/search"))
        .and(query_param("filter_by", "(author:=\"Frank Herbert\")"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(1, json!([]))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(
            1,
            json!([{
                "field_name": "author",
                "counts": [{"count": 1, "highlighted": "Frank Herbert", "value": "Frank Herbert"}],
                "stats": {"total_values": 1}
            }]),
        )))
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let mut session = SearchSession::new();
    session.load_collections(&client).await.unwrap();
    assert_eq!(session.selected_collection(), Some("books"));
    assert_eq!(session.collection_fields(), &["title", "author"]);

    let mut params = session.params().clone();
    params.q = "dune".into();
    params.query_by = "title".into();
    params.facet_by = Some("author".into());
    session.set_params(params);
    session.search(&client).await.unwrap();

    session.toggle_facet("author", "Frank Herbert", true);
    session.search(&client).await.unwrap();
    let results = session.results().unwrap();
    assert_eq!(results.found, 1);
    assert_eq!(results.reported_facets(), Some(&[][..]));
}

#[tokio::test]
async fn rejected_search_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([books_schema()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books"))
        .respond_with(ResponseTemplate::new(200).set_body_json(books_schema()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(0, Value::Null)))
        .expect(0)
        .mount(&server)
        .await;

    let client = TypesenseClient::new(&config(&[&server], 0)).unwrap();
    let mut session = SearchSession::new();
    session.load_collections(&client).await.unwrap();

    let err = session.search(&client).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Precondition(_)));
    assert_eq!(
        session.last_error(),
        Some("Please enter a search query or select at least one search field.")
    );
}
