//! Static method registry: canonical name -> descriptor.
//!
//! Chains and the schema compiler resolve method names here instead of
//! reflecting over functions at runtime. Lookups ignore case and
//! underscores, so `isLength`, `is_length` and `IS_LENGTH` all resolve.

use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::HashMap;

use super::rules::{self, RuleResult};
use super::sanitizers;

pub type Predicate = fn(&str, &[Value]) -> RuleResult;
pub type SanitizerFn = fn(&str, &[Value]) -> Value;
/// Runs on the located value itself; `None` means the field was not found.
pub type RawCheck = fn(Option<&Value>) -> bool;

#[derive(Clone, Copy)]
pub enum MethodKind {
    Validator(Predicate),
    RawValidator(RawCheck),
    Sanitizer(SanitizerFn),
}

#[derive(Clone, Copy)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: MethodKind,
    /// Maximum number of positional options the method reads.
    pub arity: usize,
}

impl MethodDescriptor {
    pub fn is_validator(&self) -> bool {
        !matches!(self.kind, MethodKind::Sanitizer(_))
    }

    pub fn is_sanitizer(&self) -> bool {
        matches!(self.kind, MethodKind::Sanitizer(_))
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            MethodKind::Validator(_) => "validator",
            MethodKind::RawValidator(_) => "raw validator",
            MethodKind::Sanitizer(_) => "sanitizer",
        };
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("arity", &self.arity)
            .finish()
    }
}

fn exists(value: Option<&Value>) -> bool {
    value.is_some()
}

fn is_array(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(_)))
}

const VALIDATORS: &[(&str, Predicate, usize)] = &[
    ("contains", rules::contains, 1),
    ("equals", rules::equals, 1),
    ("matches", rules::matches, 2),
    ("isAfter", rules::is_after, 1),
    ("isAlpha", rules::is_alpha, 1),
    ("isAlphanumeric", rules::is_alphanumeric, 1),
    ("isAscii", rules::is_ascii, 0),
    ("isBase64", rules::is_base64, 0),
    ("isBefore", rules::is_before, 1),
    ("isBoolean", rules::is_boolean, 0),
    ("isCreditCard", rules::is_credit_card, 0),
    ("isDecimal", rules::is_decimal, 1),
    ("isDivisibleBy", rules::is_divisible_by, 1),
    ("isEmail", rules::is_email, 1),
    ("isEmpty", rules::is_empty, 1),
    ("isFloat", rules::is_float, 1),
    ("isFQDN", rules::is_fqdn, 1),
    ("isHexColor", rules::is_hex_color, 0),
    ("isHexadecimal", rules::is_hexadecimal, 0),
    ("isIn", rules::is_in, 1),
    ("isInt", rules::is_int, 1),
    ("isIP", rules::is_ip, 1),
    ("isISO8601", rules::is_iso8601, 1),
    ("isJSON", rules::is_json, 0),
    ("isJWT", rules::is_jwt, 0),
    ("isLatLong", rules::is_lat_long, 0),
    ("isLength", rules::is_length, 2),
    ("isLowercase", rules::is_lowercase, 0),
    ("isMACAddress", rules::is_mac_address, 0),
    ("isMD5", rules::is_md5, 0),
    ("isMongoId", rules::is_mongo_id, 0),
    ("isNumeric", rules::is_numeric, 1),
    ("isPort", rules::is_port, 0),
    ("isUppercase", rules::is_uppercase, 0),
    ("isURL", rules::is_url, 1),
    ("isUUID", rules::is_uuid, 1),
    ("isWhitelisted", rules::is_whitelisted, 1),
];

const RAW_VALIDATORS: &[(&str, RawCheck)] = &[("exists", exists), ("isArray", is_array)];

const SANITIZERS: &[(&str, SanitizerFn, usize)] = &[
    ("blacklist", sanitizers::blacklist, 1),
    ("escape", sanitizers::escape, 0),
    ("ltrim", sanitizers::ltrim, 1),
    ("normalizeEmail", sanitizers::normalize_email, 1),
    ("rtrim", sanitizers::rtrim, 1),
    ("stripLow", sanitizers::strip_low, 1),
    ("toBoolean", sanitizers::to_boolean, 1),
    ("toDate", sanitizers::to_date, 0),
    ("toFloat", sanitizers::to_float, 0),
    ("toInt", sanitizers::to_int, 1),
    ("trim", sanitizers::trim, 1),
    ("unescape", sanitizers::unescape, 0),
    ("whitelist", sanitizers::whitelist, 1),
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

lazy_static! {
    static ref REGISTRY: HashMap<String, MethodDescriptor> = {
        let mut map = HashMap::new();
        for &(name, predicate, arity) in VALIDATORS {
            map.insert(normalize(name), MethodDescriptor {
                name,
                kind: MethodKind::Validator(predicate),
                arity,
            });
        }
        for &(name, check) in RAW_VALIDATORS {
            map.insert(normalize(name), MethodDescriptor {
                name,
                kind: MethodKind::RawValidator(check),
                arity: 0,
            });
        }
        for &(name, sanitizer, arity) in SANITIZERS {
            map.insert(normalize(name), MethodDescriptor {
                name,
                kind: MethodKind::Sanitizer(sanitizer),
                arity,
            });
        }
        map
    };
}

pub fn lookup(name: &str) -> Option<&'static MethodDescriptor> {
    REGISTRY.get(&normalize(name))
}

/// Canonical names of every registered method, sorted.
pub fn method_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.values().map(|d| d.name).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_both_spellings() {
        let camel = lookup("isLength").unwrap();
        let snake = lookup("is_length").unwrap();
        assert_eq!(camel.name, "isLength");
        assert_eq!(snake.name, "isLength");
        assert_eq!(lookup("is_ip").unwrap().name, "isIP");
        assert_eq!(lookup("to_int").unwrap().name, "toInt");
        assert!(lookup("isBanana").is_none());
    }

    #[test]
    fn test_validator_names_follow_convention() {
        for name in method_names() {
            let descriptor = lookup(name).unwrap();
            let validator_named = name.starts_with("is")
                || matches!(name, "contains" | "equals" | "matches" | "exists");
            assert_eq!(descriptor.is_validator(), validator_named, "{}", name);
        }
    }

    #[test]
    fn test_sanitizer_allowlist_is_registered() {
        for name in [
            "blacklist", "escape", "unescape", "normalizeEmail", "ltrim", "rtrim", "trim",
            "stripLow", "whitelist", "toInt", "toFloat", "toBoolean", "toDate",
        ] {
            assert!(lookup(name).map_or(false, |d| d.is_sanitizer()), "{}", name);
        }
    }
}
