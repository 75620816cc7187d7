use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use fieldcheck_core::{
    check_schema, create_app,
    validation::{check_schema_with, Chain, Location, RequestData, Schema},
    AppConfig, AppError, AppState,
};
use serde_json::{json, Value};
use std::io::Write;
use tower::ServiceExt;

const SIGNUP_SCHEMA: &str = r#"
email:
  in: body
  errorMessage: email is invalid
  trim: true
  isEmail: true
  normalizeEmail: true
age:
  in: [query]
  optional:
    options:
      checkFalsy: true
  isInt:
    options:
      min: 18
    errorMessage: too young
  toInt: true
nickname:
  in: body
  isLength:
    options: [{ max: 8 }]
  not_a_method: true
"#;

fn write_schema(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_schema_file_drives_validate_route() {
    let file = write_schema(SIGNUP_SCHEMA, ".yaml");
    let mut config = AppConfig::default();
    config.validation.schema_path = Some(file.path().to_path_buf());

    let state = AppState::from_config(config).unwrap();
    assert_eq!(state.chains.chains().len(), 3);
    let app = create_app(state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/validate?age=12")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"email": "not-an-email", "nickname": "much-too-long"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let msgs: Vec<_> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["msg"].clone())
        .collect();
    assert_eq!(msgs, vec![json!("email is invalid"), json!("too young"), json!("Invalid value")]);
}

#[tokio::test]
async fn test_schema_file_with_unknown_location_fails_to_load() {
    let file = write_schema("{\"token\": {\"in\": \"session\", \"isJWT\": true}}", ".json");
    let mut config = AppConfig::default();
    config.validation.schema_path = Some(file.path().to_path_buf());

    let err = AppState::from_config(config).err().unwrap();
    assert!(matches!(err, AppError::Schema(_)));
}

#[tokio::test]
async fn test_missing_schema_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.validation.schema_path = Some(dir.path().join("absent.yaml"));

    let err = AppState::from_config(config).err().unwrap();
    assert!(matches!(err, AppError::IoError(_)));
}

#[tokio::test]
async fn test_empty_is_length_fails_with_schema_message() {
    let schema = Schema::from_value(json!({
        "foo": {"isLength": {"options": {"min": 1}, "errorMessage": "fail"}}
    }))
    .unwrap();

    let chains = check_schema(&schema, &[Location::Body]);
    let mut req = RequestData::new().with_body(json!({"foo": ""}));
    let errors = chains[0].run(&mut req).await;

    assert_eq!(
        serde_json::to_value(&errors).unwrap(),
        json!([{"location": "body", "param": "foo", "value": "", "msg": "fail"}])
    );
}

#[tokio::test]
async fn test_check_schema_with_wraps_chains() {
    let schema = Schema::from_yaml_str(SIGNUP_SCHEMA).unwrap();
    let mut fields = Vec::new();

    let chains: Vec<Chain> =
        check_schema_with(&schema, &[Location::Query], |field, locations, message| {
            fields.push(field.to_string());
            Chain::new(vec![field.to_string()], locations, message).trim()
        });

    assert_eq!(fields, vec!["email", "age", "nickname"]);
    assert_eq!(chains[2].context().locations(), &[Location::Body]);
    assert_eq!(chains[2].context().sanitizers().len(), 1);
    assert_eq!(chains[0].context().sanitizers().len(), 3);
}
