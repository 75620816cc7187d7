use axum::{
    body::{to_bytes, Body},
    extract::Extension,
    http::{Method, Request, StatusCode},
    middleware,
    response::Response,
    routing::post,
    Json, Router,
};
use fieldcheck_core::{
    body, check_chains, create_app, query, AppConfig, AppState, ChainSet, Checked, RequestData,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn schema_state() -> AppState {
    AppState::default().with_chains(vec![
        body("email").trim().is_email().with_message("bad email"),
        query("page").optional_default().validator("isInt", vec![json!({"min": 1})]),
    ])
}

#[tokio::test]
async fn test_health() {
    let app = create_app(AppState::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["schema_chains"], 0);
}

#[tokio::test]
async fn test_validate_route_accepts_and_sanitizes() {
    let app = create_app(schema_state());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/validate?page=3",
            json!({"email": "  ada@example.com "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["body"]["email"], "ada@example.com");
    assert_eq!(body["data"]["query"]["page"], "3");
}

#[tokio::test]
async fn test_validate_route_reports_errors() {
    let app = create_app(schema_state());

    let response = app
        .oneshot(json_request(Method::POST, "/api/validate?page=0", json!({"email": "nope"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    assert_eq!(body["status"], 422);
    assert_eq!(
        body["errors"],
        json!([
            {"location": "body", "param": "email", "value": "nope", "msg": "bad email"},
            {"location": "query", "param": "page", "value": "0", "msg": "Invalid value"},
        ])
    );
}

#[tokio::test]
async fn test_signup_route_success() {
    let app = create_app(AppState::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/42")
        .header("Content-Type", "application/json")
        .header("X-Client-Version", "1.4.0")
        .header("Cookie", "locale=fr")
        .body(Body::from(
            json!({
                "email": " Ada.Lovelace@Gmail.com ",
                "name": "Ada",
                "age": "36",
                "password": "analytical-engine",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["message"], "user created");
    assert_eq!(body["data"]["id"], 42);
    assert_eq!(body["data"]["user"]["email"], "adalovelace@gmail.com");
    assert_eq!(body["data"]["user"]["age"], 36);
    assert!(body["data"]["user"].get("password").is_none());
    assert_eq!(body["data"]["locale"], "fr");
    assert_eq!(body["data"]["client_version"], "1.4.0");
}

#[tokio::test]
async fn test_signup_route_collects_errors_from_every_location() {
    let app = create_app(AppState::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/0")
        .header("Content-Type", "application/json")
        .header("X-Client-Version", "latest")
        .header("Cookie", "locale=xx")
        .body(Body::from(json!({"email": "a@b.co", "password": "a@b.co"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    let errors: Vec<(String, String)> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["location"].as_str().unwrap().to_string(),
                e["param"].as_str().unwrap().to_string(),
            )
        })
        .collect();

    assert!(errors.contains(&("params".to_string(), "id".to_string())));
    assert!(errors.contains(&("body".to_string(), "name".to_string())));
    assert!(errors.contains(&("body".to_string(), "password".to_string())));
    assert!(errors.contains(&("headers".to_string(), "X-Client-Version".to_string())));
    assert!(errors.contains(&("cookies".to_string(), "locale".to_string())));
    assert_eq!(errors[0], ("params".to_string(), "id".to_string()));
}

#[tokio::test]
async fn test_signup_route_validates_id_before_converting_it() {
    let app = create_app(AppState::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/5abc")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"email": "ada@example.com", "name": "Ada", "password": "analytical-engine"})
                .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    assert_eq!(
        body["errors"],
        json!([{
            "location": "params",
            "param": "id",
            "value": "5abc",
            "msg": "id must be a positive integer",
        }])
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = AppConfig::default();
    config.validation.max_body_bytes = 16;
    let app = create_app(AppState::new(config, vec![body("email").is_email()]));

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/validate",
            json!({"email": "someone-with-a-long-name@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let app = create_app(schema_state());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/validate")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stacked_layers_share_one_accumulator() {
    async fn echo(
        Extension(data): Extension<RequestData>,
        Json(payload): Json<Value>,
    ) -> Json<Value> {
        Json(json!({
            "errors": data.validation_errors().len(),
            "payload": payload,
        }))
    }

    let outer = ChainSet::from(body("name").trim());
    let inner = ChainSet::from(body("name").is_length(json!({"min": 5})));

    let app: Router = Router::new()
        .route("/", post(echo))
        .layer(middleware::from_fn_with_state(inner, check_chains))
        .layer(middleware::from_fn_with_state(outer, check_chains));

    let response = app
        .oneshot(json_request(Method::POST, "/", json!({"name": "  abc  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["errors"], 1);
    assert_eq!(body["payload"], json!({"name": "abc"}));
}

#[tokio::test]
async fn test_checked_without_middleware_is_a_server_error() {
    async fn handler(_checked: Checked) -> &'static str {
        "unreachable"
    }

    let app: Router = Router::new().route("/", post(handler));
    let response = app
        .oneshot(json_request(Method::POST, "/", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
