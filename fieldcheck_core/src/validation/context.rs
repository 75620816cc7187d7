//! The declarative payload a chain builds and the runner consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::registry::{Predicate, RawCheck, SanitizerFn};
use super::request::{Location, RequestData};

/// What custom validators, custom sanitizers and dynamic messages get to see
/// besides the value itself.
#[derive(Debug, Clone, Copy)]
pub struct Meta<'a> {
    pub req: &'a RequestData,
    pub location: Location,
    pub path: &'a str,
}

/// A user-supplied validator that may suspend.
///
/// `Ok(true)` passes. `Ok(false)` fails with the chain's configured message.
/// `Err(reason)` always fails, even when negated, and `reason` becomes the
/// message when no other message is configured.
#[async_trait]
pub trait CustomValidator: Send + Sync {
    async fn validate(&self, value: &Value, meta: &Meta<'_>) -> Result<bool, Value>;
}

/// Adapts a synchronous closure to [`CustomValidator`].
pub struct FnValidator<F>(pub F);

#[async_trait]
impl<F> CustomValidator for FnValidator<F>
where
    F: Fn(&Value, &Meta<'_>) -> Result<bool, Value> + Send + Sync,
{
    async fn validate(&self, value: &Value, meta: &Meta<'_>) -> Result<bool, Value> {
        (self.0)(value, meta)
    }
}

pub type CustomSanitizerFn = Arc<dyn Fn(&Value, &Meta<'_>) -> Value + Send + Sync>;
pub type MessageFn = Arc<dyn Fn(&Value, &Meta<'_>) -> Value + Send + Sync>;

/// An error message: a fixed value or one computed from the original field
/// value when the validator fails.
#[derive(Clone)]
pub enum Message {
    Static(Value),
    Dynamic(MessageFn),
}

impl Message {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Value, &Meta<'_>) -> Value + Send + Sync + 'static,
    {
        Message::Dynamic(Arc::new(f))
    }

    pub fn resolve(&self, value: &Value, meta: &Meta<'_>) -> Value {
        match self {
            Message::Static(message) => message.clone(),
            Message::Dynamic(f) => f(value, meta),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Message::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Message {
    fn from(message: &str) -> Self {
        Message::Static(Value::String(message.to_string()))
    }
}

impl From<String> for Message {
    fn from(message: String) -> Self {
        Message::Static(Value::String(message))
    }
}

impl From<Value> for Message {
    fn from(message: Value) -> Self {
        Message::Static(message)
    }
}

/// When set, validators are skipped for absent values, and additionally for
/// falsy values (`check_falsy`) or nulls (`nullable`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Optional {
    #[serde(default, rename = "checkFalsy", alias = "check_falsy")]
    pub check_falsy: bool,
    #[serde(default)]
    pub nullable: bool,
}

impl Optional {
    pub fn check_falsy() -> Self {
        Self {
            check_falsy: true,
            nullable: false,
        }
    }

    pub fn nullable() -> Self {
        Self {
            check_falsy: false,
            nullable: true,
        }
    }
}

#[derive(Clone)]
pub enum Check {
    Builtin { name: &'static str, predicate: Predicate },
    Raw { name: &'static str, check: RawCheck },
    Custom(Arc<dyn CustomValidator>),
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::Builtin { name, .. } | Check::Raw { name, .. } => *name,
            Check::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorSpec {
    pub check: Check,
    pub options: Vec<Value>,
    pub negated: bool,
    pub message: Option<Message>,
}

impl ValidatorSpec {
    pub fn is_custom(&self) -> bool {
        matches!(self.check, Check::Custom(_))
    }

    pub fn is_existence_check(&self) -> bool {
        matches!(self.check, Check::Raw { name: "exists", .. })
    }
}

#[derive(Clone)]
pub enum Sanitizer {
    Builtin { name: &'static str, function: SanitizerFn },
    Custom(CustomSanitizerFn),
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sanitizer::Builtin { name, .. } => f.write_str(name),
            Sanitizer::Custom(_) => f.write_str("customSanitizer"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SanitizerSpec {
    pub sanitizer: Sanitizer,
    pub options: Vec<Value>,
}

impl SanitizerSpec {
    pub fn is_custom(&self) -> bool {
        matches!(self.sanitizer, Sanitizer::Custom(_))
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) fields: Vec<String>,
    pub(crate) locations: Vec<Location>,
    pub(crate) message: Option<Message>,
    pub(crate) optional: Option<Optional>,
    pub(crate) validators: Vec<ValidatorSpec>,
    pub(crate) sanitizers: Vec<SanitizerSpec>,
}

impl Context {
    /// Empty field lists mean "the whole container"; empty location lists
    /// mean every location.
    pub fn new(fields: Vec<String>, locations: Vec<Location>, message: Option<Message>) -> Self {
        let fields = if fields.is_empty() { vec![String::new()] } else { fields };
        let locations = if locations.is_empty() {
            Location::ALL.to_vec()
        } else {
            locations
        };

        Self {
            fields,
            locations,
            message,
            optional: None,
            validators: Vec::new(),
            sanitizers: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn optional(&self) -> Option<Optional> {
        self.optional
    }

    pub fn validators(&self) -> &[ValidatorSpec] {
        &self.validators
    }

    pub fn sanitizers(&self) -> &[SanitizerSpec] {
        &self.sanitizers
    }

    pub fn checks_existence(&self) -> bool {
        self.validators.iter().any(ValidatorSpec::is_existence_check)
    }
}
