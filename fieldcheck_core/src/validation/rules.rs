//! Builtin string predicates.
//!
//! Every rule takes the canonical string form of the field value plus the
//! positional options declared on the chain. Rules report bad options or an
//! uncompilable pattern as `Err`, which the runner treats as a thrown error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use validator::{ValidateEmail, ValidateIp, ValidateUrl};

use super::value::to_validator_input;

pub type RuleResult = Result<bool, RuleError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid option for {rule}: {reason}")]
    InvalidOption { rule: &'static str, reason: String },
}

lazy_static! {
    static ref ALPHA_REGEX: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();
    static ref ALPHANUMERIC_REGEX: Regex = Regex::new(r"^[0-9A-Za-z]+$").unwrap();
    static ref ASCII_REGEX: Regex = Regex::new(r"^[\x00-\x7F]+$").unwrap();
    static ref NOT_BASE64_REGEX: Regex = Regex::new(r"[^A-Za-z0-9+/=]").unwrap();
    static ref DECIMAL_REGEX: Regex = Regex::new(r"^[-+]?([0-9]+)?(\.[0-9]+)?$").unwrap();
    static ref FLOAT_REGEX: Regex =
        Regex::new(r"^[-+]?([0-9]+)?(\.[0-9]*)?([eE][-+]?[0-9]+)?$").unwrap();
    static ref INT_REGEX: Regex = Regex::new(r"^[-+]?(0|[1-9][0-9]*)$").unwrap();
    static ref INT_LEADING_ZEROES_REGEX: Regex = Regex::new(r"^[-+]?[0-9]+$").unwrap();
    static ref HEX_COLOR_REGEX: Regex =
        Regex::new(r"^#?([0-9A-Fa-f]{3}|[0-9A-Fa-f]{4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").unwrap();
    static ref HEXADECIMAL_REGEX: Regex = Regex::new(r"^(0[xX]|0[hH])?[0-9A-Fa-f]+$").unwrap();
    static ref FQDN_LABEL_REGEX: Regex = Regex::new(r"^[A-Za-z0-9-]{1,63}$").unwrap();
    static ref TLD_REGEX: Regex = Regex::new(r"^([A-Za-z]{2,}|xn--[A-Za-z0-9-]{2,})$").unwrap();
    static ref JWT_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9\-_~+/]+=*\.[A-Za-z0-9\-_~+/]+=*(\.[A-Za-z0-9\-_~+/]+=*)?$"
    ).unwrap();
    static ref MAC_REGEX: Regex = Regex::new(
        r"^([0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{2}(-[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{2}( [0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{12})$"
    ).unwrap();
    static ref MD5_REGEX: Regex = Regex::new(r"^[a-f0-9]{32}$").unwrap();
    static ref MONGO_ID_REGEX: Regex = Regex::new(r"^[0-9A-Fa-f]{24}$").unwrap();
    static ref NUMERIC_REGEX: Regex = Regex::new(r"^[+-]?([0-9]*[.])?[0-9]+$").unwrap();
    static ref NUMERIC_NO_SYMBOLS_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$"
    ).unwrap();
}

fn option_object(options: &[Value]) -> Option<&Map<String, Value>> {
    options.first().and_then(Value::as_object)
}

fn option_string(options: &[Value], index: usize) -> Option<String> {
    options.get(index).map(|value| to_validator_input(Some(value)))
}

fn option_f64(options: &Map<String, Value>, key: &str) -> Option<f64> {
    match options.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn option_bool(options: &Map<String, Value>, key: &str, default: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn within_bounds(value: f64, options: Option<&Map<String, Value>>) -> bool {
    let Some(options) = options else {
        return true;
    };

    option_f64(options, "min").map_or(true, |min| value >= min)
        && option_f64(options, "max").map_or(true, |max| value <= max)
        && option_f64(options, "gt").map_or(true, |gt| value > gt)
        && option_f64(options, "lt").map_or(true, |lt| value < lt)
}

/// Parses the date shapes accepted by `isAfter`, `isBefore`, `isISO8601`
/// and the `toDate` sanitizer. Naive values are taken as UTC.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn comparison_date(options: &[Value]) -> Option<DateTime<Utc>> {
    match options.first() {
        None | Some(Value::Null) => Some(Utc::now()),
        Some(value) => parse_date(&to_validator_input(Some(value))),
    }
}

pub fn contains(input: &str, options: &[Value]) -> RuleResult {
    let seed = option_string(options, 0).unwrap_or_default();
    Ok(input.contains(&seed))
}

pub fn equals(input: &str, options: &[Value]) -> RuleResult {
    Ok(option_string(options, 0).map_or(false, |comparison| input == comparison))
}

/// `matches(pattern, flags)`; the `i`, `m` and `s` flags are honoured.
pub fn matches(input: &str, options: &[Value]) -> RuleResult {
    let pattern = option_string(options, 0).ok_or_else(|| RuleError::InvalidOption {
        rule: "matches",
        reason: "a pattern is required".to_string(),
    })?;
    let flags: String = option_string(options, 1)
        .unwrap_or_default()
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's'))
        .collect();

    let source = if flags.is_empty() {
        pattern
    } else {
        format!("(?{}){}", flags, pattern)
    };

    let regex = Regex::new(&source).map_err(|e| RuleError::InvalidPattern(e.to_string()))?;
    Ok(regex.is_match(input))
}

pub fn is_after(input: &str, options: &[Value]) -> RuleResult {
    Ok(match (parse_date(input), comparison_date(options)) {
        (Some(date), Some(comparison)) => date > comparison,
        _ => false,
    })
}

pub fn is_before(input: &str, options: &[Value]) -> RuleResult {
    Ok(match (parse_date(input), comparison_date(options)) {
        (Some(date), Some(comparison)) => date < comparison,
        _ => false,
    })
}

fn is_default_locale(options: &[Value]) -> bool {
    option_string(options, 0).map_or(true, |locale| locale == "en-US" || locale.is_empty())
}

pub fn is_alpha(input: &str, options: &[Value]) -> RuleResult {
    if is_default_locale(options) {
        return Ok(ALPHA_REGEX.is_match(input));
    }
    Ok(!input.is_empty() && input.chars().all(char::is_alphabetic))
}

pub fn is_alphanumeric(input: &str, options: &[Value]) -> RuleResult {
    if is_default_locale(options) {
        return Ok(ALPHANUMERIC_REGEX.is_match(input));
    }
    Ok(!input.is_empty() && input.chars().all(char::is_alphanumeric))
}

pub fn is_ascii(input: &str, _options: &[Value]) -> RuleResult {
    Ok(ASCII_REGEX.is_match(input))
}

pub fn is_base64(input: &str, _options: &[Value]) -> RuleResult {
    let len = input.len();
    if len == 0 || len % 4 != 0 || NOT_BASE64_REGEX.is_match(input) {
        return Ok(false);
    }
    Ok(match input.find('=') {
        None => true,
        Some(first) if first == len - 1 => true,
        Some(first) => first == len - 2 && input.ends_with('='),
    })
}

pub fn is_boolean(input: &str, _options: &[Value]) -> RuleResult {
    Ok(matches!(input, "true" | "false" | "1" | "0"))
}

pub fn is_credit_card(input: &str, _options: &[Value]) -> RuleResult {
    let digits: Vec<u32> = input
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();

    if !(13..=19).contains(&digits.len()) {
        return Ok(false);
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, digit)| {
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                *digit
            }
        })
        .sum();

    Ok(checksum % 10 == 0)
}

pub fn is_decimal(input: &str, _options: &[Value]) -> RuleResult {
    Ok(!matches!(input, "" | "-" | "+" | ".") && DECIMAL_REGEX.is_match(input))
}

pub fn is_divisible_by(input: &str, options: &[Value]) -> RuleResult {
    let divisor = option_string(options, 0)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| RuleError::InvalidOption {
            rule: "isDivisibleBy",
            reason: "a numeric divisor is required".to_string(),
        })?;

    Ok(match input.trim().parse::<f64>() {
        Ok(value) if divisor != 0.0 => value % divisor == 0.0,
        _ => false,
    })
}

pub fn is_email(input: &str, _options: &[Value]) -> RuleResult {
    Ok(input.validate_email())
}

pub fn is_empty(input: &str, options: &[Value]) -> RuleResult {
    let ignore_whitespace = option_object(options)
        .map_or(false, |o| option_bool(o, "ignore_whitespace", false));
    Ok(if ignore_whitespace {
        input.trim().is_empty()
    } else {
        input.is_empty()
    })
}

pub fn is_float(input: &str, options: &[Value]) -> RuleResult {
    if matches!(input, "" | "." | "-" | "+") || !FLOAT_REGEX.is_match(input) {
        return Ok(false);
    }
    let Ok(value) = input.parse::<f64>() else {
        return Ok(false);
    };
    Ok(within_bounds(value, option_object(options)))
}

pub fn is_fqdn(input: &str, options: &[Value]) -> RuleResult {
    let opts = option_object(options);
    let require_tld = opts.map_or(true, |o| option_bool(o, "require_tld", true));
    let allow_trailing_dot = opts.map_or(false, |o| option_bool(o, "allow_trailing_dot", false));

    let host = match input.strip_suffix('.') {
        Some(stripped) if allow_trailing_dot => stripped,
        _ => input,
    };

    let labels: Vec<&str> = host.split('.').collect();
    if require_tld {
        if labels.len() < 2 {
            return Ok(false);
        }
        let tld = labels[labels.len() - 1];
        if !TLD_REGEX.is_match(tld) {
            return Ok(false);
        }
    }

    Ok(labels.iter().all(|label| {
        FQDN_LABEL_REGEX.is_match(label) && !label.starts_with('-') && !label.ends_with('-')
    }))
}

pub fn is_hex_color(input: &str, _options: &[Value]) -> RuleResult {
    Ok(HEX_COLOR_REGEX.is_match(input))
}

pub fn is_hexadecimal(input: &str, _options: &[Value]) -> RuleResult {
    Ok(HEXADECIMAL_REGEX.is_match(input))
}

pub fn is_in(input: &str, options: &[Value]) -> RuleResult {
    Ok(match options.first() {
        Some(Value::Array(values)) => values
            .iter()
            .any(|candidate| to_validator_input(Some(candidate)) == input),
        Some(Value::Object(map)) => map.contains_key(input),
        Some(Value::String(haystack)) => haystack.contains(input),
        _ => false,
    })
}

pub fn is_int(input: &str, options: &[Value]) -> RuleResult {
    let opts = option_object(options);
    let allow_leading_zeroes = opts.map_or(true, |o| option_bool(o, "allow_leading_zeroes", true));
    let regex: &Regex = if allow_leading_zeroes {
        &INT_LEADING_ZEROES_REGEX
    } else {
        &INT_REGEX
    };

    if !regex.is_match(input) {
        return Ok(false);
    }
    let Ok(value) = input.parse::<f64>() else {
        return Ok(false);
    };
    Ok(within_bounds(value, opts))
}

pub fn is_ip(input: &str, options: &[Value]) -> RuleResult {
    match option_string(options, 0).as_deref() {
        None | Some("") => Ok(input.validate_ip()),
        Some("4") => Ok(input.validate_ipv4()),
        Some("6") => Ok(input.validate_ipv6()),
        Some(other) => Err(RuleError::InvalidOption {
            rule: "isIP",
            reason: format!("unknown IP version {}", other),
        }),
    }
}

pub fn is_iso8601(input: &str, _options: &[Value]) -> RuleResult {
    Ok(parse_date(input).is_some())
}

pub fn is_json(input: &str, _options: &[Value]) -> RuleResult {
    Ok(matches!(
        serde_json::from_str::<Value>(input),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    ))
}

pub fn is_jwt(input: &str, _options: &[Value]) -> RuleResult {
    Ok(JWT_REGEX.is_match(input))
}

pub fn is_lat_long(input: &str, _options: &[Value]) -> RuleResult {
    let trimmed = input.trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Ok(false);
    }
    Ok(match (parts[0].parse::<f64>(), parts[1].parse::<f64>()) {
        (Ok(lat), Ok(long)) => (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&long),
        _ => false,
    })
}

/// `isLength({min, max})`, or the positional `isLength(min, max)` form.
pub fn is_length(input: &str, options: &[Value]) -> RuleResult {
    let (min, max) = match options.first() {
        Some(Value::Object(opts)) => (
            option_f64(opts, "min").unwrap_or(0.0),
            option_f64(opts, "max"),
        ),
        Some(Value::Number(min)) => (
            min.as_f64().unwrap_or(0.0),
            options.get(1).and_then(Value::as_f64),
        ),
        _ => (0.0, None),
    };

    let len = input.chars().count() as f64;
    Ok(len >= min && max.map_or(true, |max| len <= max))
}

pub fn is_lowercase(input: &str, _options: &[Value]) -> RuleResult {
    Ok(input == input.to_lowercase())
}

pub fn is_mac_address(input: &str, _options: &[Value]) -> RuleResult {
    Ok(MAC_REGEX.is_match(input))
}

pub fn is_md5(input: &str, _options: &[Value]) -> RuleResult {
    Ok(MD5_REGEX.is_match(input))
}

pub fn is_mongo_id(input: &str, _options: &[Value]) -> RuleResult {
    Ok(MONGO_ID_REGEX.is_match(input))
}

pub fn is_numeric(input: &str, options: &[Value]) -> RuleResult {
    let no_symbols = option_object(options).map_or(false, |o| option_bool(o, "no_symbols", false));
    Ok(if no_symbols {
        NUMERIC_NO_SYMBOLS_REGEX.is_match(input)
    } else {
        NUMERIC_REGEX.is_match(input)
    })
}

pub fn is_port(input: &str, _options: &[Value]) -> RuleResult {
    Ok(INT_REGEX.is_match(input) && input.parse::<u32>().map_or(false, |port| port <= 65535))
}

pub fn is_uppercase(input: &str, _options: &[Value]) -> RuleResult {
    Ok(input == input.to_uppercase())
}

pub fn is_url(input: &str, _options: &[Value]) -> RuleResult {
    Ok(input.validate_url())
}

/// `isUUID(version)`, version one of 1-5 or `all` (the default).
pub fn is_uuid(input: &str, options: &[Value]) -> RuleResult {
    if !UUID_REGEX.is_match(input) {
        return Ok(false);
    }
    let Ok(uuid) = uuid::Uuid::parse_str(input) else {
        return Ok(false);
    };

    match option_string(options, 0).as_deref() {
        None | Some("") | Some("all") => Ok(true),
        Some(version) => {
            let expected = version.parse::<usize>().map_err(|_| RuleError::InvalidOption {
                rule: "isUUID",
                reason: format!("unknown UUID version {}", version),
            })?;
            Ok(uuid.get_version_num() == expected)
        }
    }
}

pub fn is_whitelisted(input: &str, options: &[Value]) -> RuleResult {
    let allowed = option_string(options, 0).unwrap_or_default();
    Ok(input.chars().all(|c| allowed.contains(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length_rule() {
        assert!(!is_length("", &[json!({"min": 1})]).unwrap());
        assert!(is_length("abc", &[json!({"min": 1, "max": 3})]).unwrap());
        assert!(!is_length("abcd", &[json!({"max": 3})]).unwrap());
        assert!(is_length("ab", &[json!(2), json!(4)]).unwrap());
        assert!(is_length("héllo", &[json!({"max": 5})]).unwrap());
    }

    #[test]
    fn test_numeric_rules() {
        assert!(is_int("42", &[]).unwrap());
        assert!(is_int("007", &[]).unwrap());
        assert!(!is_int("007", &[json!({"allow_leading_zeroes": false})]).unwrap());
        assert!(!is_int("4.2", &[]).unwrap());
        assert!(!is_int("5", &[json!({"min": 10})]).unwrap());
        assert!(is_float("4.2", &[json!({"gt": 4, "lt": 5})]).unwrap());
        assert!(!is_float(".", &[]).unwrap());
        assert!(is_numeric("-12.5", &[]).unwrap());
        assert!(!is_numeric("-12.5", &[json!({"no_symbols": true})]).unwrap());
        assert!(is_decimal("0.25", &[]).unwrap());
        assert!(!is_decimal("-", &[]).unwrap());
        assert!(is_divisible_by("12", &[json!(4)]).unwrap());
        assert!(is_divisible_by("12", &[]).is_err());
        assert!(is_port("8080", &[]).unwrap());
        assert!(!is_port("70000", &[]).unwrap());
    }

    #[test]
    fn test_matches_rule() {
        assert!(matches("Hello", &[json!("^hello$"), json!("i")]).unwrap());
        assert!(!matches("Hello", &[json!("^hello$")]).unwrap());
        assert!(matches!(
            matches("x", &[json!("(unclosed")]),
            Err(RuleError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_string_shape_rules() {
        assert!(is_email("foo@example.com", &[]).unwrap());
        assert!(!is_email("not-an-email", &[]).unwrap());
        assert!(is_url("https://example.com/path", &[]).unwrap());
        assert!(is_alpha("abcXYZ", &[]).unwrap());
        assert!(!is_alpha("abc1", &[]).unwrap());
        assert!(is_alpha("ÀÉÎ", &[json!("fr-FR")]).unwrap());
        assert!(is_base64("Zm9vYmFy", &[]).unwrap());
        assert!(!is_base64("Zm9vYmF", &[]).unwrap());
        assert!(is_hex_color("#fff", &[]).unwrap());
        assert!(is_mongo_id("507f1f77bcf86cd799439011", &[]).unwrap());
        assert!(is_mac_address("01:23:45:67:89:ab", &[]).unwrap());
        assert!(!is_mac_address("01:23-45:67:89:ab", &[]).unwrap());
        assert!(is_fqdn("api.example.com", &[]).unwrap());
        assert!(!is_fqdn("localhost", &[]).unwrap());
        assert!(is_lat_long("(40.7, -74.0)", &[]).unwrap());
        assert!(is_json(r#"{"a": 1}"#, &[]).unwrap());
        assert!(!is_json("1", &[]).unwrap());
    }

    #[test]
    fn test_membership_rules() {
        assert!(is_in("b", &[json!(["a", "b"])]).unwrap());
        assert!(is_in("1", &[json!([1, 2])]).unwrap());
        assert!(!is_in("c", &[json!(["a", "b"])]).unwrap());
        assert!(is_in("key", &[json!({"key": true})]).unwrap());
        assert!(contains("foobar", &[json!("oba")]).unwrap());
        assert!(equals("42", &[json!(42)]).unwrap());
        assert!(is_whitelisted("abba", &[json!("ab")]).unwrap());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_uuid("a3bb189e-8bf9-3888-9912-ace4e6543002", &[json!("3")]).unwrap());
        assert!(!is_uuid("a3bb189e-8bf9-3888-9912-ace4e6543002", &[json!(4)]).unwrap());
        assert!(is_uuid("a3bb189e-8bf9-3888-9912-ace4e6543002", &[]).unwrap());
        assert!(!is_uuid("a3bb189e8bf938889912ace4e6543002", &[]).unwrap());
        assert!(is_credit_card("4111 1111 1111 1111", &[]).unwrap());
        assert!(!is_credit_card("4111 1111 1111 1112", &[]).unwrap());
        assert!(is_ip("127.0.0.1", &[json!(4)]).unwrap());
        assert!(!is_ip("127.0.0.1", &[json!(6)]).unwrap());
        assert!(is_ip("::1", &[]).unwrap());
    }

    #[test]
    fn test_date_rules() {
        assert!(is_iso8601("2012-12-12", &[]).unwrap());
        assert!(is_iso8601("2012-12-12T10:00:00Z", &[]).unwrap());
        assert!(!is_iso8601("12/12/2012", &[]).unwrap());
        assert!(is_after("2012-12-13", &[json!("2012-12-12")]).unwrap());
        assert!(is_before("2012-12-11", &[json!("2012-12-12")]).unwrap());
        assert!(!is_after("garbage", &[json!("2012-12-12")]).unwrap());
    }
}
