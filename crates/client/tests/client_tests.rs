//! Integration tests for the REST client

use rest_client::sink::DirectorySink;
use rest_client::token::LocalStorage;
use rest_client::{
    ClientError, DOWNLOAD_COMPLETE, FileData, FormValue, ResponseBody, ResponseType, RestClient,
    RestServiceConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(server: &MockServer, config: RestServiceConfig) -> RestClient {
    RestClient::builder()
        .config(config.end_point(format!("{}/api/", server.uri())))
        .local_storage(Arc::new(LocalStorage::in_memory()))
        .build()
        .unwrap()
}

fn header_str<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_get_sends_base_headers_and_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("page", "2"))
        .and(header("accept", "application/json"))
        .and(header("cache-control", "no-cache"))
        .and(header("pragma", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [1, 2] })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    let response = client
        .get("/items", Some(json!({ "page": 2 }).into()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response, ResponseBody::Json(json!({ "items": [1, 2] })));
}

#[tokio::test]
async fn test_secured_applies_to_one_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    client.set_token("abc").unwrap();

    client.secured().get("me", None).await.unwrap();
    client.get("me", None).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(header_str(&requests[0], "authorization"), Some("Bearer abc"));
    assert_eq!(header_str(&requests[1], "authorization"), None);
}

#[tokio::test]
async fn test_secured_with_local_storage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/profile"))
        .and(header("authorization", "Bearer stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&mock_server)
        .await;

    let client = client_for(
        &mock_server,
        RestServiceConfig::default().token_storage("localStorage"),
    );
    client.set_token("stored").unwrap();

    let response = client
        .secured()
        .put("profile", Some(json!({ "name": "Ada" }).into()))
        .await
        .unwrap();
    assert!(response.is_some());
}

#[tokio::test]
async fn test_with_files_applies_to_one_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    let payload = FormValue::object([
        ("a", FormValue::from(1)),
        ("b", FormValue::object([("c", 2)])),
        ("skip", FormValue::Null),
        (
            "avatar",
            FormValue::from(FileData::new("me.png", "image/png", &b"\x89PNG"[..])),
        ),
    ]);

    client
        .with_files()
        .post("upload", Some(payload.clone()))
        .await
        .unwrap();
    client
        .post("upload", Some(json!({ "a": 1 }).into()))
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();

    let multipart = &requests[0];
    assert!(header_str(multipart, "content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&multipart.body);
    assert!(body.contains("name=\"a\""));
    assert!(body.contains("name=\"b[c]\""));
    assert!(body.contains("filename=\"me.png\""));
    assert!(!body.contains("name=\"skip\""));

    let plain = &requests[1];
    assert_eq!(header_str(plain, "content-type"), Some("application/json"));
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&plain.body).unwrap(),
        json!({ "a": 1 })
    );
}

#[tokio::test]
async fn test_authorize_stores_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/authorize"))
        .and(body_json(json!({ "username": "alice", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok123" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/validate-token"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    assert!(!client.is_authorized().unwrap());

    let response = client.authorize("alice", "secret").await.unwrap().unwrap();
    assert_eq!(response.as_json().unwrap()["token"], "tok123");
    assert!(client.is_authorized().unwrap());
    assert_eq!(client.get_token().unwrap(), "tok123");

    // validation is public unless asked otherwise
    let public = client.validate_token().await;
    assert!(matches!(public, Err(ClientError::NotFound(_))));
    let secured = client.secured().validate_token().await.unwrap().unwrap();
    assert_eq!(secured.as_json().unwrap()["valid"], true);

    client.revoke().unwrap();
    assert!(!client.is_authorized().unwrap());
}

#[tokio::test]
async fn test_custom_auth_uris() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/check"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    client.configure(
        &RestServiceConfig::default()
            .auth_uri("/login")
            .validation_token_uri("check"),
    );

    client.authorize("bob", "pw").await.unwrap();
    assert_eq!(client.get_token().unwrap(), "t");

    let validated = client.validate_token().await.unwrap();
    assert_eq!(validated, Some(ResponseBody::Json(serde_json::Value::Null)));
}

#[tokio::test]
async fn test_error_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/locked"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());

    let result = client.delete("locked", None).await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(m)) if m == "Unauthorized"));

    let result = client.get("broken", None).await;
    assert!(matches!(
        result,
        Err(ClientError::ServerError { status: 500, message }) if message == "boom"
    ));
}

#[tokio::test]
async fn test_invalid_storage_fails_secure_requests() {
    let mock_server = MockServer::start().await;
    let client = client_for(
        &mock_server,
        RestServiceConfig::default().token_storage("session"),
    );

    let result = client.secured().get("me", None).await;
    assert!(matches!(result, Err(ClientError::InvalidStorageKind(k)) if k == "session"));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_response_types() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/readme"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());

    let text = client
        .public()
        .response_type(ResponseType::Text)
        .get("readme", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(text.as_text(), Some("hello"));

    let bytes = client
        .public()
        .response_type("arraybuffer".parse().unwrap())
        .get("readme", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bytes.into_bytes().as_ref(), b"hello");
}

#[tokio::test]
async fn test_cancel_pending_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fast": true })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());

    let started = Instant::now();
    let pending: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("slow", None).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(200)).await;
    client.cancel_pending_requests();

    for handle in pending {
        let result = handle.await.unwrap();
        assert!(matches!(result, Ok(None)));
    }
    assert!(started.elapsed() < Duration::from_secs(4));

    // cancellation does not latch
    let response = client.get("fast", None).await.unwrap();
    assert_eq!(response, Some(ResponseBody::Json(json!({ "fast": true }))));
}

#[tokio::test]
async fn test_mock_mode_serves_json_fixtures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, RestServiceConfig::default());
    client.configure(&RestServiceConfig::default().mock_data(true));

    let started = Instant::now();
    let response = client
        .post("/users", Some(json!({ "name": "Ada" }).into()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response, ResponseBody::Json(json!([{ "id": 1 }])));
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_download_saves_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/reports/42"))
        .and(query_param("format", "csv"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a,b\n1,2\n".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = RestClient::builder()
        .config(RestServiceConfig::default().end_point(format!("{}/api", mock_server.uri())))
        .local_storage(Arc::new(LocalStorage::in_memory()))
        .file_sink(Arc::new(DirectorySink::new(dir.path())))
        .build()
        .unwrap();
    client.set_token("abc").unwrap();

    let marker = client
        .secured()
        .download(
            "reports/42",
            "report.csv",
            "text/csv",
            Some(json!({ "format": "csv" }).into()),
        )
        .await
        .unwrap();

    assert_eq!(marker, Some(DOWNLOAD_COMPLETE));
    assert_eq!(
        std::fs::read(dir.path().join("report.csv")).unwrap(),
        b"a,b\n1,2\n"
    );
}
