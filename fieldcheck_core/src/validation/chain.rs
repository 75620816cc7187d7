//! Fluent chain builder.
//!
//! A chain owns one [`Context`] shared by every field it was created for.
//! Builder methods take and return the chain by value; the finished chain is
//! used directly as request middleware or through [`Chain::into_context`].

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::{
    Check, Context, CustomValidator, FnValidator, Message, Meta, Optional, Sanitizer,
    SanitizerSpec, ValidatorSpec,
};
use super::macros::builtin_methods;
use super::registry::{self, MethodKind};
use super::request::{Location, RequestData, ValidationError};
use super::runner;
use super::schema::SchemaChain;

/// Anything that names one or more field paths.
pub trait IntoFields {
    fn into_fields(self) -> Vec<String>;
}

impl IntoFields for &str {
    fn into_fields(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoFields for String {
    fn into_fields(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoFields for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl IntoFields for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl<const N: usize> IntoFields for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|field| field.to_string()).collect()
    }
}

impl IntoFields for &[&str] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|field| field.to_string()).collect()
    }
}

/// Starts a chain over `fields` looked up in `locations`, in the given order.
/// An empty `locations` slice means every location.
pub fn check(fields: impl IntoFields, locations: &[Location]) -> Chain {
    Chain::new(fields.into_fields(), locations.to_vec(), None)
}

pub fn body(fields: impl IntoFields) -> Chain {
    check(fields, &[Location::Body])
}

pub fn cookies(fields: impl IntoFields) -> Chain {
    check(fields, &[Location::Cookies])
}

pub fn headers(fields: impl IntoFields) -> Chain {
    check(fields, &[Location::Headers])
}

pub fn params(fields: impl IntoFields) -> Chain {
    check(fields, &[Location::Params])
}

pub fn query(fields: impl IntoFields) -> Chain {
    check(fields, &[Location::Query])
}

#[derive(Debug, Clone)]
pub struct Chain {
    context: Context,
    negate_next: bool,
}

impl Chain {
    pub fn new(fields: Vec<String>, locations: Vec<Location>, message: Option<Message>) -> Self {
        Self {
            context: Context::new(fields, locations, message),
            negate_next: false,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    pub(crate) fn push_validator(&mut self, check: Check, options: Vec<Value>) {
        // Custom validators consume a pending not() but are never negated.
        let negated = std::mem::take(&mut self.negate_next) && !matches!(check, Check::Custom(_));
        self.context.validators.push(ValidatorSpec {
            check,
            options,
            negated,
            message: None,
        });
    }

    pub(crate) fn push_sanitizer(&mut self, sanitizer: Sanitizer, options: Vec<Value>) {
        self.context.sanitizers.push(SanitizerSpec { sanitizer, options });
    }

    /// Appends the registered method `name`, which may be spelled camelCase
    /// or snake_case. Unknown names are ignored with a warning.
    pub(crate) fn append_method(&mut self, name: &str, mut options: Vec<Value>) {
        let Some(descriptor) = registry::lookup(name) else {
            warn!(method = name, "ignoring unknown validation method");
            return;
        };

        if options.len() > descriptor.arity {
            debug!(
                method = descriptor.name,
                given = options.len(),
                arity = descriptor.arity,
                "dropping extra method options"
            );
            options.truncate(descriptor.arity);
        }

        match descriptor.kind {
            MethodKind::Validator(predicate) => self.push_validator(
                Check::Builtin { name: descriptor.name, predicate },
                options,
            ),
            MethodKind::RawValidator(check) => {
                self.push_validator(Check::Raw { name: descriptor.name, check }, options)
            }
            MethodKind::Sanitizer(function) => self.push_sanitizer(
                Sanitizer::Builtin { name: descriptor.name, function },
                options,
            ),
        }
    }

    pub(crate) fn set_last_message(&mut self, message: Message) {
        if let Some(last) = self.context.validators.last_mut() {
            last.message = Some(message);
        }
    }

    /// Generic form of every builtin validator and sanitizer method.
    pub fn method(mut self, name: &str, options: Vec<Value>) -> Self {
        self.append_method(name, options);
        self
    }

    /// Appends the builtin validator `name`; sanitizer names are ignored.
    pub fn validator(self, name: &str, options: Vec<Value>) -> Self {
        match registry::lookup(name) {
            Some(descriptor) if descriptor.is_validator() => self.method(name, options),
            _ => {
                warn!(method = name, "ignoring unknown validator");
                self
            }
        }
    }

    /// Appends the builtin sanitizer `name`; validator names are ignored.
    pub fn sanitizer(self, name: &str, options: Vec<Value>) -> Self {
        match registry::lookup(name) {
            Some(descriptor) if descriptor.is_sanitizer() => self.method(name, options),
            _ => {
                warn!(method = name, "ignoring unknown sanitizer");
                self
            }
        }
    }

    /// Negates the next validator appended to this chain.
    pub fn not(mut self) -> Self {
        self.negate_next = true;
        self
    }

    /// Sets the message of the most recently appended validator.
    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.set_last_message(message.into());
        self
    }

    /// Message used by validators that have none of their own.
    pub fn with_default_message(mut self, message: impl Into<Message>) -> Self {
        self.context.message = Some(message.into());
        self
    }

    pub fn optional(mut self, optional: Optional) -> Self {
        self.context.optional = Some(optional);
        self
    }

    pub fn optional_default(self) -> Self {
        self.optional(Optional::default())
    }

    pub fn custom<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value, &Meta<'_>) -> Result<bool, Value> + Send + Sync + 'static,
    {
        self.push_validator(Check::Custom(Arc::new(FnValidator(validator))), Vec::new());
        self
    }

    pub fn custom_async<V>(mut self, validator: V) -> Self
    where
        V: CustomValidator + 'static,
    {
        self.push_validator(Check::Custom(Arc::new(validator)), Vec::new());
        self
    }

    pub fn custom_sanitizer<F>(mut self, sanitizer: F) -> Self
    where
        F: Fn(&Value, &Meta<'_>) -> Value + Send + Sync + 'static,
    {
        self.push_sanitizer(Sanitizer::Custom(Arc::new(sanitizer)), Vec::new());
        self
    }

    builtin_methods! {
        contains => "contains"(seed);
        equals => "equals"(comparison);
        /// `flags` may contain `i`, `m` and `s`.
        matches => "matches"(pattern) | matches_with(pattern, flags);
        is_after => "isAfter"(date);
        is_before => "isBefore"(date);
        is_alpha => "isAlpha" | is_alpha_with(locale);
        is_alphanumeric => "isAlphanumeric" | is_alphanumeric_with(locale);
        is_ascii => "isAscii";
        is_base64 => "isBase64";
        is_boolean => "isBoolean";
        is_credit_card => "isCreditCard";
        is_decimal => "isDecimal" | is_decimal_with(options);
        is_divisible_by => "isDivisibleBy"(number);
        is_email => "isEmail" | is_email_with(options);
        is_empty => "isEmpty" | is_empty_with(options);
        is_float => "isFloat" | is_float_with(options);
        is_fqdn => "isFQDN" | is_fqdn_with(options);
        is_hex_color => "isHexColor";
        is_hexadecimal => "isHexadecimal";
        /// Value must equal one of `values` (an array).
        is_in => "isIn"(values);
        /// `options` takes `min`, `max`, `gt`, `lt` and `allow_leading_zeroes`.
        is_int => "isInt" | is_int_with(options);
        /// `version` is `4` or `6`.
        is_ip => "isIP" | is_ip_with(version);
        is_iso8601 => "isISO8601" | is_iso8601_with(options);
        is_json => "isJSON";
        is_jwt => "isJWT";
        is_lat_long => "isLatLong";
        /// `options` is an object with optional `min` and `max`, or a bare
        /// minimum followed by `max`.
        is_length => "isLength"(options) | is_length_between(min, max);
        is_lowercase => "isLowercase";
        is_mac_address => "isMACAddress";
        is_md5 => "isMD5";
        is_mongo_id => "isMongoId";
        is_numeric => "isNumeric" | is_numeric_with(options);
        is_port => "isPort";
        is_uppercase => "isUppercase";
        is_url => "isURL" | is_url_with(options);
        is_uuid => "isUUID" | is_uuid_with(version);
        is_whitelisted => "isWhitelisted"(chars);
        /// Passes when the field is present in the request, even as null.
        exists => "exists";
        is_array => "isArray";
        blacklist => "blacklist"(chars);
        whitelist => "whitelist"(chars);
        escape => "escape";
        unescape => "unescape";
        ltrim => "ltrim" | ltrim_chars(chars);
        rtrim => "rtrim" | rtrim_chars(chars);
        trim => "trim" | trim_chars(chars);
        strip_low => "stripLow" | strip_low_with(keep_new_lines);
        normalize_email => "normalizeEmail" | normalize_email_with(options);
        /// Strict mode only accepts `1` and `true`.
        to_boolean => "toBoolean" | to_boolean_with(strict);
        to_date => "toDate";
        to_float => "toFloat";
        to_int => "toInt" | to_int_with(radix);
    }

    /// Runs this chain against `req` without recording anything on it.
    pub async fn run(&self, req: &mut RequestData) -> Vec<ValidationError> {
        runner::run(req, &self.context).await
    }

    /// Runs this chain and appends its errors to the request accumulator.
    pub async fn check_request(&self, req: &mut RequestData) {
        let errors = self.run(req).await;
        debug!(
            fields = ?self.context.fields,
            errors = errors.len(),
            "validation chain finished"
        );
        req.record_errors(errors);
    }

    /// Middleware form: records errors on `req`, then continues with `next`.
    pub async fn handle<F>(&self, req: &mut RequestData, next: F)
    where
        F: FnOnce(),
    {
        self.check_request(req).await;
        next();
    }
}

impl SchemaChain for Chain {
    fn negate_next(&mut self) {
        self.negate_next = true;
    }

    fn apply_method(&mut self, method: &str, options: Vec<Value>) {
        self.append_method(method, options);
    }

    fn apply_custom(&mut self, validator: Arc<dyn CustomValidator>) {
        self.push_validator(Check::Custom(validator), Vec::new());
    }

    fn set_message(&mut self, message: Message) {
        self.set_last_message(message);
    }

    fn set_optional(&mut self, optional: Optional) {
        self.context.optional = Some(optional);
    }
}
