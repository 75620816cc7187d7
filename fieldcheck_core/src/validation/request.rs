//! Request-like data the chains run against: five location containers and the
//! request-scoped error accumulator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Body,
    Cookies,
    Headers,
    Params,
    Query,
}

impl Location {
    /// Default lookup order when a chain doesn't name its locations.
    pub const ALL: [Location; 5] = [
        Location::Body,
        Location::Cookies,
        Location::Headers,
        Location::Params,
        Location::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Body => "body",
            Location::Cookies => "cookies",
            Location::Headers => "headers",
            Location::Params => "params",
            Location::Query => "query",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "body" => Ok(Location::Body),
            "cookies" => Ok(Location::Cookies),
            "headers" => Ok(Location::Headers),
            "params" => Ok(Location::Params),
            "query" => Ok(Location::Query),
            _ => Err(format!("Unknown request location: {}", s)),
        }
    }
}

/// One failed validator for one (field, location) instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub location: Location,
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub msg: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub cookies: Value,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub query: Value,
    #[serde(skip)]
    validation_errors: Option<Vec<ValidationError>>,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_cookies(mut self, cookies: Value) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn location(&self, location: Location) -> &Value {
        match location {
            Location::Body => &self.body,
            Location::Cookies => &self.cookies,
            Location::Headers => &self.headers,
            Location::Params => &self.params,
            Location::Query => &self.query,
        }
    }

    pub fn location_mut(&mut self, location: Location) -> &mut Value {
        match location {
            Location::Body => &mut self.body,
            Location::Cookies => &mut self.cookies,
            Location::Headers => &mut self.headers,
            Location::Params => &mut self.params,
            Location::Query => &mut self.query,
        }
    }

    /// Appends to the accumulator, creating it on first use. Nothing here ever
    /// clears it: every chain invoked on this request adds to the same list.
    pub fn record_errors(&mut self, errors: Vec<ValidationError>) {
        self.validation_errors
            .get_or_insert_with(Vec::new)
            .extend(errors);
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        self.validation_errors.as_deref().unwrap_or(&[])
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors().is_empty()
    }

    /// Whether any chain has recorded into this request yet.
    pub fn is_checked(&self) -> bool {
        self.validation_errors.is_some()
    }

    pub fn take_validation_errors(&mut self) -> Vec<ValidationError> {
        self.validation_errors.take().unwrap_or_default()
    }
}
