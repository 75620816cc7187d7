//! Builtin sanitizers. Each takes the current string value plus positional
//! options and returns the replacement value, which need not be a string
//! (`toInt` yields a number, `normalizeEmail` yields `false` for non-emails).

use serde_json::{Map, Number, Value};
use validator::ValidateEmail;

use super::rules::parse_date;
use super::value::to_validator_input;

fn option_string(options: &[Value], index: usize) -> Option<String> {
    options
        .get(index)
        .filter(|value| !value.is_null())
        .map(|value| to_validator_input(Some(value)))
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

pub fn blacklist(input: &str, options: &[Value]) -> Value {
    let chars = option_string(options, 0).unwrap_or_default();
    Value::String(input.chars().filter(|c| !chars.contains(*c)).collect())
}

pub fn whitelist(input: &str, options: &[Value]) -> Value {
    let chars = option_string(options, 0).unwrap_or_default();
    Value::String(input.chars().filter(|c| chars.contains(*c)).collect())
}

pub fn escape(input: &str, _options: &[Value]) -> Value {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '/' => escaped.push_str("&#x2F;"),
            '\\' => escaped.push_str("&#x5C;"),
            '`' => escaped.push_str("&#96;"),
            other => escaped.push(other),
        }
    }
    Value::String(escaped)
}

pub fn unescape(input: &str, _options: &[Value]) -> Value {
    // &amp; goes last so "&amp;lt;" decodes to "&lt;" rather than "<".
    Value::String(
        input
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&#x2F;", "/")
            .replace("&#x5C;", "\\")
            .replace("&#96;", "`")
            .replace("&amp;", "&"),
    )
}

fn trim_set(options: &[Value]) -> Option<String> {
    option_string(options, 0).filter(|chars| !chars.is_empty())
}

pub fn ltrim(input: &str, options: &[Value]) -> Value {
    let trimmed = match trim_set(options) {
        Some(chars) => input.trim_start_matches(|c| chars.contains(c)),
        None => input.trim_start(),
    };
    Value::String(trimmed.to_string())
}

pub fn rtrim(input: &str, options: &[Value]) -> Value {
    let trimmed = match trim_set(options) {
        Some(chars) => input.trim_end_matches(|c| chars.contains(c)),
        None => input.trim_end(),
    };
    Value::String(trimmed.to_string())
}

pub fn trim(input: &str, options: &[Value]) -> Value {
    let trimmed = match trim_set(options) {
        Some(chars) => input.trim_matches(|c| chars.contains(c)),
        None => input.trim(),
    };
    Value::String(trimmed.to_string())
}

/// Removes ASCII control characters; `stripLow(true)` keeps `\n` and `\r`.
pub fn strip_low(input: &str, options: &[Value]) -> Value {
    let keep_new_lines = options.first().and_then(Value::as_bool).unwrap_or(false);
    Value::String(
        input
            .chars()
            .filter(|c| {
                let code = *c as u32;
                let is_low = code < 32 || code == 127;
                !is_low || (keep_new_lines && (*c == '\n' || *c == '\r'))
            })
            .collect(),
    )
}

fn flag(options: Option<&Map<String, Value>>, key: &str) -> bool {
    options
        .and_then(|o| o.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// Canonicalizes an address: lowercases it, and for the large providers
/// strips sub-addresses (and dots, for Gmail). Yields `false` for input that
/// isn't an email.
pub fn normalize_email(input: &str, options: &[Value]) -> Value {
    if !input.validate_email() {
        return Value::Bool(false);
    }
    let Some((local, domain)) = input.rsplit_once('@') else {
        return Value::Bool(false);
    };

    let opts = options.first().and_then(Value::as_object);
    let mut local = local.to_string();
    let mut domain = domain.to_lowercase();

    match domain.as_str() {
        "gmail.com" | "googlemail.com" => {
            if flag(opts, "gmail_remove_subaddress") {
                if let Some((head, _)) = local.split_once('+') {
                    local = head.to_string();
                }
            }
            if flag(opts, "gmail_remove_dots") {
                local = local.replace('.', "");
            }
            if flag(opts, "gmail_convert_googlemaildotcom") {
                domain = "gmail.com".to_string();
            }
            local = local.to_lowercase();
        }
        "hotmail.com" | "outlook.com" | "live.com" => {
            if flag(opts, "outlookdotcom_remove_subaddress") {
                if let Some((head, _)) = local.split_once('+') {
                    local = head.to_string();
                }
            }
            if flag(opts, "all_lowercase") {
                local = local.to_lowercase();
            }
        }
        "yahoo.com" | "ymail.com" | "rocketmail.com" => {
            if flag(opts, "yahoo_remove_subaddress") {
                if let Some((head, _)) = local.split_once('-') {
                    local = head.to_string();
                }
            }
            if flag(opts, "all_lowercase") {
                local = local.to_lowercase();
            }
        }
        "icloud.com" | "me.com" => {
            if flag(opts, "icloud_remove_subaddress") {
                if let Some((head, _)) = local.split_once('+') {
                    local = head.to_string();
                }
            }
            if flag(opts, "all_lowercase") {
                local = local.to_lowercase();
            }
        }
        _ => {
            if flag(opts, "all_lowercase") {
                local = local.to_lowercase();
            }
        }
    }

    Value::String(format!("{}@{}", local, domain))
}

/// Loose by default: anything but `0`, `false` and the empty string is true.
/// `toBoolean(true)` only accepts `1` and `true`.
pub fn to_boolean(input: &str, options: &[Value]) -> Value {
    let strict = options.first().and_then(Value::as_bool).unwrap_or(false);
    let lowered = input.to_lowercase();
    if strict {
        Value::Bool(input == "1" || lowered == "true")
    } else {
        Value::Bool(input != "0" && lowered != "false" && !input.is_empty())
    }
}

/// ISO-8601 with millisecond precision, or null when unparsable.
pub fn to_date(input: &str, _options: &[Value]) -> Value {
    parse_date(input)
        .map(|date| Value::String(date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()))
        .unwrap_or(Value::Null)
}

/// Longest numeric prefix, like `parseFloat`. Null when there is none.
pub fn to_float(input: &str, _options: &[Value]) -> Value {
    let trimmed = input.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &trimmed[digits_start..end] == "." {
        return Value::Null;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    trimmed[..end]
        .parse::<f64>()
        .map(float_value)
        .unwrap_or(Value::Null)
}

/// Leading integer in the given radix (default 10), like `parseInt`.
pub fn to_int(input: &str, options: &[Value]) -> Value {
    let radix = options
        .first()
        .and_then(Value::as_u64)
        .filter(|radix| (2..=36).contains(radix))
        .unwrap_or(10) as u32;

    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };

    let prefix: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if prefix.is_empty() {
        return Value::Null;
    }

    match i64::from_str_radix(&prefix, radix) {
        Ok(value) => Value::from(if negative { -value } else { value }),
        Err(_) => {
            // Out of i64 range; fall back to a float like the browser does.
            let magnitude = prefix
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0f64, |acc, digit| acc * radix as f64 + digit as f64);
            float_value(if negative { -magnitude } else { magnitude })
        }
    }
}
