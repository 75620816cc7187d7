//! Demo routes: one driven by the configured schema, one by chains declared
//! in code.

use crate::{
    error::Result,
    handlers::health::handle_health,
    models::request::{ApiResponse, SignupPayload},
    validation::{body, check_chains, cookies, headers, params, Chain, ChainSet, Checked, Optional},
    AppState,
};
use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::info;

pub fn create_routes(state: &AppState) -> Router<AppState> {
    let body_limit = state.config.validation.max_body_bytes;
    let signup = ChainSet::new(signup_chains()).with_body_limit(body_limit);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/validate",
            post(handle_validate)
                .route_layer(middleware::from_fn_with_state(state.chains.clone(), check_chains)),
        )
        .route(
            "/api/users/:id",
            post(handle_create_user)
                .route_layer(middleware::from_fn_with_state(signup, check_chains)),
        )
}

/// Chains for `POST /api/users/:id`.
///
/// Sanitizers run before the validators of their own chain, so the
/// conversions come last, in chains of their own.
pub fn signup_chains() -> Vec<Chain> {
    vec![
        params("id")
            .is_int_with(json!({"min": 1, "allow_leading_zeroes": false}))
            .with_message("id must be a positive integer"),
        body("email")
            .exists()
            .with_message("email is required")
            .trim()
            .is_email()
            .with_message("email must be a valid address"),
        body("name")
            .exists()
            .with_message("name is required")
            .trim()
            .escape()
            .is_length(json!({"min": 1, "max": 64}))
            .with_message("name must be 1 to 64 characters"),
        body("age")
            .optional(Optional::check_falsy())
            .is_int_with(json!({"min": 13, "max": 130}))
            .with_message("age must be between 13 and 130"),
        body("password")
            .is_length(json!({"min": 8}))
            .with_message("password must be at least 8 characters")
            .custom(|password, meta| Ok(password != &meta.req.body["email"]))
            .with_message("password must differ from email"),
        headers("X-Client-Version")
            .optional_default()
            .matches(r"^\d+\.\d+\.\d+$")
            .with_message("client version must look like 1.2.3"),
        cookies("locale")
            .optional_default()
            .is_in(json!(["en", "fr", "de"])),
        params("id").to_int(),
        body("email").normalize_email(),
        body("age").to_int(),
    ]
}

async fn handle_validate(checked: Checked) -> Result<impl IntoResponse> {
    let data = checked.into_result()?;
    info!("POST /api/validate - request passed validation");

    Ok(Json(ApiResponse::success(json!({
        "body": data.body,
        "query": data.query,
        "params": data.params,
    }))))
}

async fn handle_create_user(checked: Checked) -> Result<impl IntoResponse> {
    let data = checked.into_result()?;
    let user: SignupPayload = serde_json::from_value(data.body.clone())?;
    info!("POST /api/users/{} - creating user {}", data.params["id"], user.email);

    let response = ApiResponse::success(json!({
        "id": data.params["id"],
        "user": user,
        "locale": data.cookies.get("locale"),
        "client_version": data.headers.get("x-client-version"),
    }))
    .with_message("user created");

    Ok((StatusCode::CREATED, Json(response)))
}
