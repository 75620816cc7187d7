//! axum glue: turns an HTTP request into [`RequestData`], runs chains over it
//! and hands the result to handlers.

use axum::{
    async_trait,
    body::{to_bytes, Body, Bytes},
    extract::{FromRequestParts, Query, RawPathParams, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::chain::Chain;
use super::request::{RequestData, ValidationError};
use crate::error::{AppError, Result};

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The chains one route runs, in order, plus the largest body it will read.
#[derive(Debug, Clone)]
pub struct ChainSet {
    chains: Arc<Vec<Chain>>,
    body_limit: usize,
}

impl ChainSet {
    pub fn new(chains: Vec<Chain>) -> Self {
        Self {
            chains: Arc::new(chains),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    /// Runs every chain in order, recording errors on `req`.
    pub async fn check(&self, req: &mut RequestData) {
        for chain in self.chains.iter() {
            chain.check_request(req).await;
        }
    }
}

impl Default for ChainSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Chain> for ChainSet {
    fn from(chain: Chain) -> Self {
        Self::new(vec![chain])
    }
}

impl From<Vec<Chain>> for ChainSet {
    fn from(chains: Vec<Chain>) -> Self {
        Self::new(chains)
    }
}

fn push_value(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map_or(false, |ct| {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
}

fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value> {
    if !is_json(headers) || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn parse_headers(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        match value.to_str() {
            Ok(value) => {
                push_value(&mut map, name.as_str().to_string(), Value::String(value.to_string()))
            }
            Err(_) => debug!(header = %name, "skipping non-visible header value"),
        }
    }
    Value::Object(map)
}

fn parse_cookies(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    let pairs = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='));

    for (name, value) in pairs {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let raw = value.trim().trim_matches('"');
        let value = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                debug!(cookie = name, "cookie value is not percent-encoded UTF-8");
                raw.to_string()
            }
        };
        map.entry(name.to_string()).or_insert(Value::String(value));
    }
    Value::Object(map)
}

fn parse_query(parts: &Parts) -> Result<Value> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e)))?;

    let mut map = Map::new();
    for (key, value) in pairs {
        push_value(&mut map, key, Value::String(value));
    }
    Ok(Value::Object(map))
}

/// Path parameters are only known once the router has matched a route, so
/// this is empty for layers applied outside of one.
async fn parse_params(parts: &mut Parts) -> Value {
    let mut map = Map::new();
    if let Ok(params) = RawPathParams::from_request_parts(parts, &()).await {
        for (key, value) in &params {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(map)
}

/// Builds the five request containers from an HTTP request's parts and its
/// already-buffered body.
pub async fn read_request_data(parts: &mut Parts, body: &[u8]) -> Result<RequestData> {
    Ok(RequestData::new()
        .with_body(parse_body(&parts.headers, body)?)
        .with_cookies(parse_cookies(&parts.headers))
        .with_headers(parse_headers(&parts.headers))
        .with_params(parse_params(parts).await)
        .with_query(parse_query(parts)?))
}

async fn buffer_body(parts: &Parts, body: Body, limit: usize) -> Result<Bytes> {
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|len| len.to_str().ok())
        .and_then(|len| len.parse::<usize>().ok());

    if let Some(length) = declared {
        if length > limit {
            warn!(length, limit, "rejecting oversized request body");
            return Err(AppError::PayloadTooLarge(format!(
                "Request body too large. Maximum size is {} bytes",
                limit
            )));
        }
    }

    to_bytes(body, limit).await.map_err(|e| {
        warn!(error = %e, limit, "failed to buffer request body");
        AppError::PayloadTooLarge(format!(
            "Request body too large. Maximum size is {} bytes",
            limit
        ))
    })
}

/// Runs a [`ChainSet`] over the request. Use with
/// `axum::middleware::from_fn_with_state`.
///
/// A [`RequestData`] left in the extensions by an outer `check_chains` layer
/// is reused, so errors accumulate across layers. A JSON body is replaced by
/// its sanitized form before the request continues.
pub async fn check_chains(
    State(chains): State<ChainSet>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let bytes = buffer_body(&parts, body, chains.body_limit()).await?;

    let mut data = match parts.extensions.remove::<RequestData>() {
        Some(mut existing) => {
            if existing.params.as_object().map_or(true, Map::is_empty) {
                existing.params = parse_params(&mut parts).await;
            }
            existing
        }
        None => read_request_data(&mut parts, &bytes).await?,
    };

    chains.check(&mut data).await;
    debug!(
        path = %parts.uri.path(),
        chains = chains.chains().len(),
        errors = data.validation_errors().len(),
        "request validation finished"
    );

    let body = if is_json(&parts.headers) {
        let rewritten = serde_json::to_vec(&data.body)?;
        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
        Body::from(rewritten)
    } else {
        Body::from(bytes)
    };

    parts.extensions.insert(data);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// The validated request as seen by a handler, errors included.
#[derive(Debug, Clone)]
pub struct Checked(pub RequestData);

impl Checked {
    pub fn errors(&self) -> &[ValidationError] {
        self.0.validation_errors()
    }

    pub fn is_valid(&self) -> bool {
        !self.0.has_validation_errors()
    }

    /// `Err(AppError::Validation)` when any chain failed.
    pub fn into_result(mut self) -> Result<RequestData> {
        let errors = self.0.take_validation_errors();
        if errors.is_empty() {
            Ok(self.0)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Checked
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestData>() {
            Some(data) => Ok(Checked(data.clone())),
            None => {
                error!(path = %parts.uri.path(), "Checked used on a route without check_chains");
                Err(AppError::InternalServerError)
            }
        }
    }
}
