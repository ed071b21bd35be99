//! Resolution of condition placeholders against a probe result.

use crate::jsonpath;
use crate::result::ProbeResult;
use upwatch_common::context::SuiteContext;

/// HTTP status code placeholder (`200`, `404`, ...).
pub const STATUS_PLACEHOLDER: &str = "[STATUS]";

/// Resolved IP placeholder (`127.0.0.1`, ...).
pub const IP_PLACEHOLDER: &str = "[IP]";

/// Hostname placeholder, extracted from the endpoint target.
pub const HOSTNAME_PLACEHOLDER: &str = "[HOSTNAME]";

/// DNS response code placeholder (`NOERROR`, `NXDOMAIN`, ...).
pub const DNS_RCODE_PLACEHOLDER: &str = "[DNS_RCODE]";

/// Response time placeholder, in milliseconds.
pub const RESPONSE_TIME_PLACEHOLDER: &str = "[RESPONSE_TIME]";

/// Response body placeholder; may carry a JSON path suffix
/// (`[BODY].user.id`, `[BODY].items[0]`).
pub const BODY_PLACEHOLDER: &str = "[BODY]";

/// Connection establishment placeholder (`true`/`false`).
pub const CONNECTED_PLACEHOLDER: &str = "[CONNECTED]";

/// Time before certificate expiration, in milliseconds.
pub const CERTIFICATE_EXPIRATION_PLACEHOLDER: &str = "[CERTIFICATE_EXPIRATION]";

/// Time before domain expiration, in milliseconds.
pub const DOMAIN_EXPIRATION_PLACEHOLDER: &str = "[DOMAIN_EXPIRATION]";

/// Suite context placeholder; always carries a path (`[CONTEXT].user.id`).
pub const CONTEXT_PLACEHOLDER: &str = "[CONTEXT]";

/// Prefix of the pattern function: `[IP] == pat(192.168.*.*)`.
pub const PATTERN_FUNCTION_PREFIX: &str = "pat(";

/// Prefix of the any function: `[IP] == any(1.1.1.1, 1.0.0.1)`.
pub const ANY_FUNCTION_PREFIX: &str = "any(";

/// Prefix of the length function: `len([BODY].items) == 10`.
pub const LENGTH_FUNCTION_PREFIX: &str = "len(";

/// Prefix of the has function: `has([BODY].errors) == false`.
pub const HAS_FUNCTION_PREFIX: &str = "has(";

/// Suffix closing every function form.
pub const FUNCTION_SUFFIX: &str = ")";

/// Marker appended to a condition element that could not be resolved.
pub const INVALID_CONDITION_ELEMENT_SUFFIX: &str = "(INVALID)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaceholderFunction {
    None,
    Len,
    Has,
}

/// Resolves a condition element to its string value.
///
/// Recognized placeholders resolve from the result (or, for `[CONTEXT]`,
/// from the suite context); unrecognized elements resolve to themselves so
/// that literal operands pass through untouched. A recognized placeholder
/// whose path cannot be resolved yields `<element> (INVALID)`, which the
/// evaluator treats as a failed comparison rather than a hard error.
pub fn resolve_placeholder(
    element: &str,
    result: &ProbeResult,
    context: Option<&SuiteContext>,
) -> String {
    let original = element.trim();
    let (function, placeholder) = extract_function(original);
    let uppercase = placeholder.to_uppercase();

    if uppercase.starts_with(CONTEXT_PLACEHOLDER) {
        if let Some(ctx) = context {
            return resolve_context_placeholder(placeholder, function, original, ctx);
        }
    }

    match uppercase.as_str() {
        STATUS_PLACEHOLDER => {
            return apply_function(result.http_status.to_string(), function);
        }
        IP_PLACEHOLDER => return apply_function(result.ip.clone(), function),
        HOSTNAME_PLACEHOLDER => return apply_function(result.hostname.clone(), function),
        DNS_RCODE_PLACEHOLDER => return apply_function(result.dns_rcode.clone(), function),
        RESPONSE_TIME_PLACEHOLDER => {
            return apply_function(result.duration.as_millis().to_string(), function);
        }
        CONNECTED_PLACEHOLDER => {
            return apply_function(result.connected.to_string(), function);
        }
        CERTIFICATE_EXPIRATION_PLACEHOLDER => {
            return apply_function(
                result.certificate_expiration.as_millis().to_string(),
                function,
            );
        }
        DOMAIN_EXPIRATION_PLACEHOLDER => {
            return apply_function(result.domain_expiration.as_millis().to_string(), function);
        }
        BODY_PLACEHOLDER => {
            let body = String::from_utf8_lossy(&result.body).trim().to_string();
            return match function {
                PlaceholderFunction::Has => (!body.is_empty()).to_string(),
                PlaceholderFunction::Len => match jsonpath::eval("", &result.body) {
                    Ok((_, length)) => length.to_string(),
                    Err(_) => body.len().to_string(),
                },
                PlaceholderFunction::None => body,
            };
        }
        _ => {}
    }

    if uppercase.starts_with(&format!("{BODY_PLACEHOLDER}."))
        || uppercase.starts_with(&format!("{BODY_PLACEHOLDER}["))
    {
        return resolve_body_path_placeholder(placeholder, function, original, result);
    }

    // Not a recognized placeholder: literal operand, unless a function was
    // wrapped around it.
    match function {
        PlaceholderFunction::Has => "false".to_string(),
        PlaceholderFunction::Len => invalid(original),
        PlaceholderFunction::None => original.to_string(),
    }
}

fn extract_function(element: &str) -> (PlaceholderFunction, &str) {
    if let Some(inner) = element
        .strip_prefix(LENGTH_FUNCTION_PREFIX)
        .and_then(|rest| rest.strip_suffix(FUNCTION_SUFFIX))
    {
        return (PlaceholderFunction::Len, inner);
    }
    if let Some(inner) = element
        .strip_prefix(HAS_FUNCTION_PREFIX)
        .and_then(|rest| rest.strip_suffix(FUNCTION_SUFFIX))
    {
        return (PlaceholderFunction::Has, inner);
    }
    (PlaceholderFunction::None, element)
}

fn resolve_body_path_placeholder(
    placeholder: &str,
    function: PlaceholderFunction,
    original: &str,
    result: &ProbeResult,
) -> String {
    let path = placeholder[BODY_PLACEHOLDER.len()..].trim_start_matches('.');
    match jsonpath::eval(path, &result.body) {
        Ok((value, length)) => match function {
            PlaceholderFunction::Has => "true".to_string(),
            PlaceholderFunction::Len => length.to_string(),
            PlaceholderFunction::None => value,
        },
        Err(_) => match function {
            PlaceholderFunction::Has => "false".to_string(),
            _ => invalid(original),
        },
    }
}

fn resolve_context_placeholder(
    placeholder: &str,
    function: PlaceholderFunction,
    original: &str,
    context: &SuiteContext,
) -> String {
    let path = placeholder[CONTEXT_PLACEHOLDER.len()..].trim_start_matches('.');
    if path.is_empty() {
        return match function {
            PlaceholderFunction::Has => "false".to_string(),
            _ => invalid(original),
        };
    }
    match context.get(path) {
        Ok(value) => match function {
            PlaceholderFunction::Has => "true".to_string(),
            PlaceholderFunction::Len => value.len().to_string(),
            PlaceholderFunction::None => value.to_string(),
        },
        Err(_) => match function {
            PlaceholderFunction::Has => "false".to_string(),
            _ => invalid(original),
        },
    }
}

fn apply_function(value: String, function: PlaceholderFunction) -> String {
    match function {
        PlaceholderFunction::Has => (!value.is_empty()).to_string(),
        PlaceholderFunction::Len => value.len().to_string(),
        PlaceholderFunction::None => value,
    }
}

fn invalid(original: &str) -> String {
    format!("{original} {INVALID_CONDITION_ELEMENT_SUFFIX}")
}
