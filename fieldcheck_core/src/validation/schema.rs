//! Declarative schemas compiled into chains.
//!
//! A schema maps field paths to a set of chain calls. Field order and the
//! order of keys within a field are both kept, so the compiled chains run
//! their methods in the order the schema lists them.
//!
//! ```yaml
//! email:
//!   in: [body]
//!   errorMessage: email is required
//!   trim: true
//!   isEmail:
//!     errorMessage: not an email
//! age:
//!   in: query
//!   optional: { checkFalsy: true }
//!   isInt:
//!     options: { min: 18 }
//! ```

use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::chain::Chain;
use super::context::{CustomValidator, Message, Optional};
use super::registry;
use super::request::Location;
use super::value::is_truthy;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    Validator,
    Sanitizer,
}

/// The operations the schema compiler needs from a chain.
///
/// [`Chain`] implements this; [`check_schema_with`] accepts any other
/// builder that does.
pub trait SchemaChain {
    /// `None` when the chain has no method called `method`.
    fn method_role(&self, method: &str) -> Option<MethodRole> {
        registry::lookup(method).map(|descriptor| {
            if descriptor.is_validator() {
                MethodRole::Validator
            } else {
                MethodRole::Sanitizer
            }
        })
    }

    fn negate_next(&mut self);
    fn apply_method(&mut self, method: &str, options: Vec<Value>);
    fn apply_custom(&mut self, validator: Arc<dyn CustomValidator>);
    /// Message of the most recently applied validator.
    fn set_message(&mut self, message: Message);
    fn set_optional(&mut self, optional: Optional);
}

#[derive(Clone)]
pub enum SchemaMethod {
    Named { name: String, options: Vec<Value> },
    Custom(Arc<dyn CustomValidator>),
}

impl fmt::Debug for SchemaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMethod::Named { name, options } => f
                .debug_struct("Named")
                .field("name", name)
                .field("options", options)
                .finish(),
            SchemaMethod::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodSchema {
    pub method: SchemaMethod,
    pub error_message: Option<Message>,
    pub negated: bool,
}

impl MethodSchema {
    pub fn named(name: impl Into<String>, options: Vec<Value>) -> Self {
        Self {
            method: SchemaMethod::Named { name: name.into(), options },
            error_message: None,
            negated: false,
        }
    }

    pub fn custom<V>(validator: V) -> Self
    where
        V: CustomValidator + 'static,
    {
        Self {
            method: SchemaMethod::Custom(Arc::new(validator)),
            error_message: None,
            negated: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    fn from_value(name: &str, value: Value) -> Self {
        let mut method = MethodSchema::named(name, Vec::new());

        if let Value::Object(mut map) = value {
            let options = match map.remove("options") {
                Some(Value::Array(options)) => options,
                Some(Value::Null) | None => Vec::new(),
                Some(option) => vec![option],
            };
            method.method = SchemaMethod::Named { name: name.to_string(), options };
            method.error_message = take_message(&mut map);
            method.negated = map.get("negated").map_or(false, is_truthy);
        }

        method
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    pub locations: Option<Vec<Location>>,
    pub error_message: Option<Message>,
    pub optional: Option<Optional>,
    pub methods: Vec<MethodSchema>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_locations(mut self, locations: &[Location]) -> Self {
        self.locations = Some(locations.to_vec());
        self
    }

    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn optional(mut self, optional: Optional) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn method(mut self, method: MethodSchema) -> Self {
        self.methods.push(method);
        self
    }

    fn from_value(field: &str, value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(AppError::Schema(format!(
                "field '{}' must map to an object of methods",
                field
            )));
        };

        let mut schema = FieldSchema::new();
        for (key, value) in map {
            match key.as_str() {
                "in" => schema.locations = Some(parse_locations(field, value)?),
                "errorMessage" | "error_message" => {
                    schema.error_message = Some(Message::from(value))
                }
                "optional" => schema.optional = parse_optional(value)?,
                _ if !is_truthy(&value) => {
                    debug!(field, method = %key, "schema method disabled");
                }
                _ => schema.methods.push(MethodSchema::from_value(&key, value)),
            }
        }

        Ok(schema)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSchema)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.push((field.into(), schema));
        self
    }

    pub fn fields(&self) -> &[(String, FieldSchema)] {
        &self.fields
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(AppError::Schema("schema must be an object".to_string()));
        };

        let fields = map
            .into_iter()
            .map(|(field, value)| {
                FieldSchema::from_value(&field, value).map(|schema| (field, schema))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { fields })
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(source)?)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Self::from_value(serde_yaml::from_str(source)?)
    }

    /// Loads a schema file; `.json` files are read as JSON, anything else as
    /// YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let schema = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source)?,
            _ => Self::from_yaml_str(&source)?,
        };

        debug!(path = %path.display(), fields = schema.fields.len(), "loaded validation schema");
        Ok(schema)
    }
}

fn take_message(map: &mut Map<String, Value>) -> Option<Message> {
    map.remove("errorMessage")
        .or_else(|| map.remove("error_message"))
        .map(Message::from)
}

fn parse_locations(field: &str, value: Value) -> Result<Vec<Location>> {
    let names = match value {
        Value::String(name) => vec![Value::String(name)],
        Value::Array(names) => names,
        other => {
            return Err(AppError::Schema(format!(
                "field '{}': 'in' must be a location or a list of locations, got {}",
                field, other
            )))
        }
    };

    names
        .into_iter()
        .map(|name| match name {
            Value::String(name) => name
                .parse::<Location>()
                .map_err(|e| AppError::Schema(format!("field '{}': {}", field, e))),
            other => Err(AppError::Schema(format!(
                "field '{}': location must be a string, got {}",
                field, other
            ))),
        })
        .collect()
}

fn parse_optional(value: Value) -> Result<Option<Optional>> {
    match value {
        Value::Object(mut map) => {
            let options = match map.remove("options") {
                Some(options @ Value::Object(_)) => options,
                _ => Value::Object(map),
            };
            Ok(Some(serde_json::from_value(options)?))
        }
        other if is_truthy(&other) => Ok(Some(Optional::default())),
        _ => Ok(None),
    }
}

fn apply_field<C: SchemaChain>(chain: &mut C, field: &str, schema: &FieldSchema) {
    if let Some(optional) = schema.optional {
        chain.set_optional(optional);
    }

    for method in &schema.methods {
        let is_validator = match &method.method {
            SchemaMethod::Custom(validator) => {
                if method.negated {
                    chain.negate_next();
                }
                chain.apply_custom(Arc::clone(validator));
                true
            }
            SchemaMethod::Named { name, options } => {
                let Some(role) = chain.method_role(name) else {
                    debug!(field, method = %name, "ignoring unknown schema key");
                    continue;
                };
                let is_validator = role == MethodRole::Validator;
                if is_validator && method.negated {
                    chain.negate_next();
                }
                chain.apply_method(name, options.clone());
                is_validator
            }
        };

        if is_validator {
            if let Some(message) = &method.error_message {
                chain.set_message(message.clone());
            }
        }
    }
}

/// Compiles `schema` with a caller-supplied chain factory. The factory is
/// called once per field, in schema order, with the field's locations (its
/// own `in`, else `default_locations`) and its field-level message.
pub fn check_schema_with<C, F>(
    schema: &Schema,
    default_locations: &[Location],
    mut factory: F,
) -> Vec<C>
where
    C: SchemaChain,
    F: FnMut(&str, Vec<Location>, Option<Message>) -> C,
{
    schema
        .fields
        .iter()
        .map(|(field, field_schema)| {
            let locations = field_schema
                .locations
                .clone()
                .unwrap_or_else(|| default_locations.to_vec());
            let mut chain = factory(field, locations, field_schema.error_message.clone());
            apply_field(&mut chain, field, field_schema);
            chain
        })
        .collect()
}

/// Compiles `schema` into one chain per field.
pub fn check_schema(schema: &Schema, default_locations: &[Location]) -> Vec<Chain> {
    let chains = check_schema_with(schema, default_locations, |field, locations, message| {
        Chain::new(vec![field.to_string()], locations, message)
    });
    debug!(chains = chains.len(), "compiled validation schema");
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::context::{FnValidator, Message, Meta};
    use crate::validation::RequestData;
    use serde_json::json;

    #[tokio::test]
    async fn test_is_length_with_message_end_to_end() {
        let schema = Schema::from_value(json!({
            "foo": {
                "isLength": {"options": {"min": 1}, "errorMessage": "fail"}
            }
        }))
        .unwrap();
        let chains = check_schema(&schema, &[Location::Body]);
        let mut req = RequestData::new().with_body(json!({"foo": ""}));

        let errors = chains[0].run(&mut req).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, Location::Body);
        assert_eq!(errors[0].param, "foo");
        assert_eq!(errors[0].value, Some(json!("")));
        assert_eq!(errors[0].msg, json!("fail"));
    }

    #[test]
    fn test_field_and_key_order_is_kept() {
        let schema = Schema::from_yaml_str(
            "zeta:\n  trim: true\n  isInt: true\nalpha:\n  isEmail: true\n  escape: true\n",
        )
        .unwrap();
        let names: Vec<_> = schema.fields().iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let chains = check_schema(&schema, &[]);
        assert_eq!(chains[0].context().locations(), &Location::ALL);
        assert_eq!(chains[0].context().validators()[0].check.name(), "isInt");
        assert_eq!(chains[1].context().sanitizers().len(), 1);
    }

    #[test]
    fn test_in_overrides_defaults() {
        let schema = Schema::from_value(json!({
            "a": {"in": "query", "isInt": true},
            "b": {"in": ["headers", "cookies"], "isInt": true},
            "c": {"isInt": true},
        }))
        .unwrap();
        let chains = check_schema(&schema, &[Location::Body]);
        assert_eq!(chains[0].context().locations(), &[Location::Query]);
        assert_eq!(chains[1].context().locations(), &[Location::Headers, Location::Cookies]);
        assert_eq!(chains[2].context().locations(), &[Location::Body]);
    }

    #[test]
    fn test_unknown_location_is_an_error() {
        let err = Schema::from_value(json!({"a": {"in": "session", "isInt": true}})).unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
    }

    #[test]
    fn test_options_spread_and_wrap() {
        let schema = Schema::from_value(json!({
            "code": {
                "matches": {"options": ["^ab", "i"]},
                "isInt": {"options": {"max": 5}},
                "isEmail": {},
            }
        }))
        .unwrap();
        let chains = check_schema(&schema, &[]);
        let validators = chains[0].context().validators();
        assert_eq!(validators[0].options, vec![json!("^ab"), json!("i")]);
        assert_eq!(validators[1].options, vec![json!({"max": 5})]);
        assert!(validators[2].options.is_empty());
    }

    #[test]
    fn test_falsy_and_unknown_keys_are_skipped() {
        let schema = Schema::from_value(json!({
            "x": {"isInt": false, "isEmail": null, "isUUID": 0, "bogus": true, "isAlpha": 1}
        }))
        .unwrap();
        let chains = check_schema(&schema, &[]);
        let validators = chains[0].context().validators();
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].check.name(), "isAlpha");
    }

    #[test]
    fn test_message_and_negated_only_reach_validators() {
        let schema = Schema::from_value(json!({
            "x": {
                "isEmpty": {"negated": true, "errorMessage": "required"},
                "trim": {"negated": true, "errorMessage": "ignored"},
                "isInt": true,
            }
        }))
        .unwrap();
        let chains = check_schema(&schema, &[]);
        let validators = chains[0].context().validators();

        assert!(validators[0].negated);
        assert!(matches!(
            &validators[0].message,
            Some(Message::Static(m)) if m == &json!("required")
        ));
        assert!(!validators[1].negated);
        assert!(validators[1].message.is_none());
    }

    #[test]
    fn test_field_message_and_optional() {
        let schema = Schema::from_value(json!({
            "a": {"errorMessage": "bad a", "optional": true, "isInt": true},
            "b": {"optional": {"options": {"checkFalsy": true}}, "isInt": true},
            "c": {"optional": {"nullable": true}, "isInt": true},
            "d": {"optional": false, "isInt": true},
        }))
        .unwrap();
        let chains = check_schema(&schema, &[]);

        assert!(matches!(
            chains[0].context().message(),
            Some(Message::Static(m)) if m == &json!("bad a")
        ));
        assert_eq!(chains[0].context().optional(), Some(Optional::default()));
        assert_eq!(chains[1].context().optional(), Some(Optional::check_falsy()));
        assert_eq!(chains[2].context().optional(), Some(Optional::nullable()));
        assert_eq!(chains[3].context().optional(), None);
    }

    #[tokio::test]
    async fn test_programmatic_schema_with_custom_validator() {
        let differs_from_username = FnValidator(|value: &Value, meta: &Meta<'_>| {
            Ok::<bool, Value>(value != &meta.req.body["username"])
        });
        let schema = Schema::new().field(
            "password",
            FieldSchema::new()
                .in_locations(&[Location::Body])
                .method(MethodSchema::named("isLength", vec![json!({"min": 4})]))
                .method(
                    MethodSchema::custom(differs_from_username)
                        .with_message("must differ from username"),
                ),
        );
        let chains = check_schema(&schema, &[]);
        let mut req = RequestData::new().with_body(json!({"username": "abcd", "password": "abcd"}));

        let errors = chains[0].run(&mut req).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].msg, json!("must differ from username"));
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl SchemaChain for Recorder {
        fn negate_next(&mut self) {
            self.calls.push("not".to_string());
        }

        fn apply_method(&mut self, method: &str, options: Vec<Value>) {
            self.calls.push(format!("{}{}", method, Value::Array(options)));
        }

        fn apply_custom(&mut self, _validator: Arc<dyn CustomValidator>) {
            self.calls.push("custom".to_string());
        }

        fn set_message(&mut self, message: Message) {
            self.calls.push(format!("message {:?}", message));
        }

        fn set_optional(&mut self, optional: Optional) {
            self.calls.push(format!("optional {:?}", optional));
        }
    }

    #[test]
    fn test_check_schema_with_custom_factory() {
        let schema = Schema::from_value(json!({
            "f": {"in": "params", "not_a_method": true, "is_int": {"negated": 1, "options": 3}}
        }))
        .unwrap();
        let mut seen = Vec::new();
        let recorders = check_schema_with(&schema, &[], |field, locations, message| {
            seen.push((field.to_string(), locations, message.is_some()));
            Recorder::default()
        });

        assert_eq!(seen, vec![("f".to_string(), vec![Location::Params], false)]);
        assert_eq!(recorders[0].calls, vec!["not".to_string(), "is_int[3]".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"b": {"isInt": true}, "a": {"trim": true}}"#).unwrap();

        let schema = Schema::load(&path).unwrap();
        let names: Vec<_> = schema.fields().iter().map(|(f, _)| f.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
