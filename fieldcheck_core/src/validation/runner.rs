//! Executes a [`Context`] against a request.
//!
//! Field/location pairs are visited field-major, location-minor. For each
//! pair the sanitizers run first and write back into the request, then the
//! validators run one at a time, each awaited before the next starts.
//! Validator failures never escape: every `false`, `Err` or rule error turns
//! into a [`ValidationError`].

use serde_json::Value;
use tracing::{debug, trace};

use super::context::{Check, Context, Meta, Optional, Sanitizer, ValidatorSpec};
use super::locator;
use super::request::{Location, RequestData, ValidationError};
use super::value::{is_truthy, to_validator_input};

pub const DEFAULT_MESSAGE: &str = "Invalid value";

static NULL: Value = Value::Null;

#[derive(Debug, Clone)]
struct FieldInstance {
    location: Location,
    path: String,
    found: bool,
}

/// Header names are stored lowercase, so header paths are matched that way.
fn lookup_path(location: Location, path: &str) -> String {
    match location {
        Location::Headers => path.to_lowercase(),
        _ => path.to_string(),
    }
}

fn select_instances(req: &RequestData, context: &Context) -> Vec<FieldInstance> {
    let mut instances = Vec::new();

    for field in context.fields() {
        let before = instances.len();
        for &location in context.locations() {
            let path = lookup_path(location, field);
            if locator::locate(req.location(location), &path).is_some() {
                instances.push(FieldInstance {
                    location,
                    path: field.clone(),
                    found: true,
                });
            }
        }

        // Absent everywhere: only an existence check has anything to say.
        if instances.len() == before && context.checks_existence() {
            instances.push(FieldInstance {
                location: context.locations()[0],
                path: field.clone(),
                found: false,
            });
        }
    }

    instances
}

fn sanitize(req: &mut RequestData, context: &Context, instance: &FieldInstance, lookup: &str) {
    for spec in context.sanitizers() {
        let Some(current) = locator::locate(req.location(instance.location), lookup).cloned() else {
            break;
        };

        let updated = match &spec.sanitizer {
            // Builtins work on the canonical string; null stays null.
            Sanitizer::Builtin { function, .. } => match &current {
                Value::Null => continue,
                value => function(&to_validator_input(Some(value)), &spec.options),
            },
            Sanitizer::Custom(function) => {
                let meta = Meta {
                    req: &*req,
                    location: instance.location,
                    path: &instance.path,
                };
                function(&current, &meta)
            }
        };

        trace!(
            location = %instance.location,
            path = %instance.path,
            sanitizer = ?spec.sanitizer,
            "sanitized field"
        );
        locator::assign(req.location_mut(instance.location), lookup, updated);
    }
}

fn skipped_by_optional(optional: Optional, original: Option<&Value>) -> bool {
    match original {
        None => true,
        Some(value) => {
            (optional.check_falsy && !is_truthy(value)) || (optional.nullable && value.is_null())
        }
    }
}

async fn evaluate(
    spec: &ValidatorSpec,
    value: Option<&Value>,
    meta: &Meta<'_>,
) -> Result<bool, Value> {
    match &spec.check {
        Check::Builtin { predicate, .. } => predicate(&to_validator_input(value), &spec.options)
            .map_err(|e| Value::String(e.to_string())),
        Check::Raw { check, .. } => Ok(check(value)),
        Check::Custom(validator) => validator.validate(value.unwrap_or(&NULL), meta).await,
    }
}

fn resolve_message(
    spec: &ValidatorSpec,
    context: &Context,
    original: &Value,
    meta: &Meta<'_>,
    reason: Option<Value>,
) -> Value {
    if let Some(message) = spec.message.as_ref().or(context.message()) {
        return message.resolve(original, meta);
    }
    reason.unwrap_or_else(|| Value::String(DEFAULT_MESSAGE.to_string()))
}

/// Runs every sanitizer and validator of `context` against `req` and returns
/// the failures in order. Sanitized values are written back into `req`;
/// nothing is recorded on its error accumulator.
pub async fn run(req: &mut RequestData, context: &Context) -> Vec<ValidationError> {
    let instances = select_instances(req, context);
    debug!(
        fields = context.fields().len(),
        instances = instances.len(),
        validators = context.validators().len(),
        sanitizers = context.sanitizers().len(),
        "running validation context"
    );

    let mut errors = Vec::new();

    for instance in instances {
        let lookup = lookup_path(instance.location, &instance.path);
        let original = if instance.found {
            locator::locate(req.location(instance.location), &lookup).cloned()
        } else {
            None
        };

        if original.is_some() {
            sanitize(req, context, &instance, &lookup);
        }

        let req: &RequestData = req;
        let current = locator::locate(req.location(instance.location), &lookup);
        let skip = context
            .optional()
            .map_or(false, |optional| skipped_by_optional(optional, original.as_ref()));

        let meta = Meta {
            req,
            location: instance.location,
            path: &instance.path,
        };

        for spec in context.validators() {
            if skip && !spec.is_existence_check() {
                continue;
            }

            let outcome = evaluate(spec, current, &meta).await;
            let passed = matches!(outcome, Ok(result) if result != spec.negated);
            trace!(
                location = %instance.location,
                path = %instance.path,
                validator = ?spec.check,
                negated = spec.negated,
                passed,
                "evaluated validator"
            );
            if passed {
                continue;
            }

            let msg = resolve_message(
                spec,
                context,
                original.as_ref().unwrap_or(&NULL),
                &meta,
                outcome.err(),
            );
            errors.push(ValidationError {
                location: instance.location,
                param: instance.path.clone(),
                value: original.clone(),
                msg,
            });
        }
    }

    errors
}
