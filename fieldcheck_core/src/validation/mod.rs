//! Request field validation chains.
//!
//! Declare a chain per field with [`check`] or one of the location
//! shorthands, append validators and sanitizers in order, then run it over a
//! [`RequestData`] directly or through the [`check_chains`] axum middleware.
//! Chains can also be compiled from a declarative [`Schema`].

mod macros;

pub mod chain;
pub mod context;
pub mod locator;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod rules;
pub mod runner;
pub mod sanitizers;
pub mod schema;
pub mod value;

pub use chain::{body, check, cookies, headers, params, query, Chain, IntoFields};
pub use context::{Context, CustomValidator, FnValidator, Message, Meta, Optional};
pub use middleware::{check_chains, read_request_data, ChainSet, Checked};
pub use request::{Location, RequestData, ValidationError};
pub use rules::RuleError;
pub use runner::run;
pub use schema::{
    check_schema, check_schema_with, FieldSchema, MethodRole, MethodSchema, Schema, SchemaChain,
};
