//! Condition parsing and evaluation.

use crate::duration::{format_duration, parse_duration};
use crate::placeholder::{
    self, resolve_placeholder, ANY_FUNCTION_PREFIX, CERTIFICATE_EXPIRATION_PLACEHOLDER,
    DOMAIN_EXPIRATION_PLACEHOLDER, FUNCTION_SUFFIX, INVALID_CONDITION_ELEMENT_SUFFIX,
    PATTERN_FUNCTION_PREFIX,
};
use crate::result::{ConditionResult, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use upwatch_common::context::SuiteContext;
use upwatch_common::pattern;

/// Maximum length a value compared against a `pat(...)` may have before
/// being truncated in the annotated condition output. Display only; has no
/// bearing on the evaluation outcome.
const MAXIMUM_LENGTH_BEFORE_TRUNCATING_WHEN_COMPARED_WITH_PATTERN: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("invalid condition format: does not match '<VALUE> <COMPARATOR> <VALUE>': {0}")]
    InvalidFormat(String),
}

/// A condition that needs to be met for an endpoint to be healthy, of the
/// form `<element> <operator> <element>`.
///
/// Elements are placeholders or literals; operators are `==`, `!=`, `<`,
/// `<=`, `>`, `>=`. Ordering operators coerce both sides numerically
/// (integer, float, or duration literal); an operand that is none of those
/// coerces to 0, which the annotated output makes visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(pub String);

impl Condition {
    /// Checks the condition's grammar without a real result. Called at
    /// configuration load time so malformed conditions never reach the
    /// monitoring loop.
    pub fn validate(&self) -> Result<(), ConditionError> {
        let mut result = ProbeResult::default();
        self.evaluate(&mut result, None);
        match result.errors.first() {
            Some(error) => Err(ConditionError::InvalidFormat(error.clone())),
            None => Ok(()),
        }
    }

    /// Evaluates the condition against a result, appending a
    /// [`ConditionResult`] to it and returning whether the condition passed.
    pub fn evaluate(&self, result: &mut ProbeResult, context: Option<&SuiteContext>) -> bool {
        let condition = self.0.as_str();
        let (success, display) = if let Some((left, right)) = condition.split_once(" == ") {
            let (parameters, resolved) = sanitize_and_resolve([left, right], result, context);
            let success = is_equal(&resolved[0], &resolved[1]);
            (success, annotate(success, condition, &parameters, resolved, "=="))
        } else if let Some((left, right)) = condition.split_once(" != ") {
            let (parameters, resolved) = sanitize_and_resolve([left, right], result, context);
            let success = !is_equal(&resolved[0], &resolved[1]);
            (success, annotate(success, condition, &parameters, resolved, "!="))
        } else if let Some((left, right)) = condition.split_once(" <= ") {
            let (parameters, resolved) = sanitize_and_resolve_numerical([left, right], result, context);
            let success = resolved[0] <= resolved[1];
            (success, annotate_numerical(success, condition, &parameters, resolved, "<="))
        } else if let Some((left, right)) = condition.split_once(" >= ") {
            let (parameters, resolved) = sanitize_and_resolve_numerical([left, right], result, context);
            let success = resolved[0] >= resolved[1];
            (success, annotate_numerical(success, condition, &parameters, resolved, ">="))
        } else if let Some((left, right)) = condition.split_once(" > ") {
            let (parameters, resolved) = sanitize_and_resolve_numerical([left, right], result, context);
            let success = resolved[0] > resolved[1];
            (success, annotate_numerical(success, condition, &parameters, resolved, ">"))
        } else if let Some((left, right)) = condition.split_once(" < ") {
            let (parameters, resolved) = sanitize_and_resolve_numerical([left, right], result, context);
            let success = resolved[0] < resolved[1];
            (success, annotate_numerical(success, condition, &parameters, resolved, "<"))
        } else {
            result.add_error(format!("invalid condition: {condition}"));
            return false;
        };
        result.condition_results.push(ConditionResult {
            condition: display,
            success,
        });
        success
    }

    /// Whether evaluating this condition requires the response body.
    pub fn has_body_placeholder(&self) -> bool {
        self.0.contains(placeholder::BODY_PLACEHOLDER)
    }

    /// Whether evaluating this condition requires an IP lookup.
    pub fn has_ip_placeholder(&self) -> bool {
        self.0.contains(placeholder::IP_PLACEHOLDER)
    }

    /// Whether evaluating this condition requires a whois query.
    pub fn has_domain_expiration_placeholder(&self) -> bool {
        self.0.contains(DOMAIN_EXPIRATION_PLACEHOLDER)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        Condition(s.to_string())
    }
}

fn sanitize_and_resolve(
    elements: [&str; 2],
    result: &ProbeResult,
    context: Option<&SuiteContext>,
) -> ([String; 2], [String; 2]) {
    let parameters = [elements[0].trim().to_string(), elements[1].trim().to_string()];
    let resolved = [
        resolve_placeholder(&parameters[0], result, context),
        resolve_placeholder(&parameters[1], result, context),
    ];
    (parameters, resolved)
}

fn sanitize_and_resolve_numerical(
    elements: [&str; 2],
    result: &ProbeResult,
    context: Option<&SuiteContext>,
) -> ([String; 2], [i64; 2]) {
    let (parameters, resolved) = sanitize_and_resolve(elements, result, context);
    let numerical = [to_numerical(&resolved[0]), to_numerical(&resolved[1])];
    (parameters, numerical)
}

/// Numeric coercion for ordering operators: duration literals become
/// milliseconds, then integers, then floats (truncated), then 0.
fn to_numerical(element: &str) -> i64 {
    if let Ok(duration) = parse_duration(element) {
        if duration != Duration::ZERO {
            return duration.as_millis() as i64;
        }
    }
    if let Ok(number) = element.parse::<i64>() {
        return number;
    }
    if let Ok(number) = element.parse::<f64>() {
        return number as i64;
    }
    0
}

/// Compares two resolved elements, honoring the `pat(...)` and `any(...)`
/// function forms and comparing numerically when both sides are integers.
fn is_equal(first: &str, second: &str) -> bool {
    let mut first = first;
    let mut second = second;
    let first_has_function_suffix = first.ends_with(FUNCTION_SUFFIX);
    let second_has_function_suffix = second.ends_with(FUNCTION_SUFFIX);
    if first_has_function_suffix || second_has_function_suffix {
        let mut is_first_pattern = false;
        let mut is_second_pattern = false;
        if let Some(inner) = strip_function(first, PATTERN_FUNCTION_PREFIX) {
            is_first_pattern = true;
            first = inner;
        }
        if let Some(inner) = strip_function(second, PATTERN_FUNCTION_PREFIX) {
            is_second_pattern = true;
            second = inner;
        }
        if is_first_pattern && !is_second_pattern {
            return pattern::matches(first, second);
        } else if !is_first_pattern && is_second_pattern {
            return pattern::matches(second, first);
        }
        let mut is_first_any = false;
        let mut is_second_any = false;
        if let Some(inner) = strip_function(first, ANY_FUNCTION_PREFIX) {
            is_first_any = true;
            first = inner;
        }
        if let Some(inner) = strip_function(second, ANY_FUNCTION_PREFIX) {
            is_second_any = true;
            second = inner;
        }
        if is_first_any && !is_second_any {
            return first.split(',').any(|option| option.trim() == second);
        } else if !is_first_any && is_second_any {
            return second.split(',').any(|option| option.trim() == first);
        }
    }
    if let (Ok(first_int), Ok(second_int)) = (first.parse::<i64>(), second.parse::<i64>()) {
        return first_int == second_int;
    }
    first == second
}

fn strip_function<'a>(element: &'a str, prefix: &str) -> Option<&'a str> {
    element
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(FUNCTION_SUFFIX))
}

fn annotate(
    success: bool,
    condition: &str,
    parameters: &[String; 2],
    resolved: [String; 2],
    operator: &str,
) -> String {
    // Successful conditions keep their original text; failed ones get the
    // resolved values spelled out so the display explains the failure.
    if success {
        condition.to_string()
    } else {
        prettify(parameters, resolved, operator)
    }
}

fn annotate_numerical(
    success: bool,
    condition: &str,
    parameters: &[String; 2],
    resolved: [i64; 2],
    operator: &str,
) -> String {
    if success {
        return condition.to_string();
    }
    let mut resolved_strings = [String::new(), String::new()];
    for i in 0..2 {
        let as_duration = Duration::from_millis(resolved[i].max(0) as u64);
        if parameters[i] == CERTIFICATE_EXPIRATION_PLACEHOLDER
            || parameters[i] == DOMAIN_EXPIRATION_PLACEHOLDER
            || parse_duration(&parameters[i]).is_ok()
        {
            // Duration-typed sides render back as duration literals so the
            // annotation matches the operand notation.
            resolved_strings[i] = format_duration(as_duration);
        } else {
            resolved_strings[i] = resolved[i].to_string();
        }
    }
    prettify(parameters, resolved_strings, operator)
}

/// Renders `<left> <operator> <right>` with resolved values in parentheses
/// next to the parameters that changed during resolution.
fn prettify(parameters: &[String; 2], mut resolved: [String; 2], operator: &str) -> String {
    for (pattern_side, value_side) in [(0, 1), (1, 0)] {
        if parameters[pattern_side].starts_with(PATTERN_FUNCTION_PREFIX)
            && parameters[pattern_side].ends_with(FUNCTION_SUFFIX)
            && resolved[value_side].len() > MAXIMUM_LENGTH_BEFORE_TRUNCATING_WHEN_COMPARED_WITH_PATTERN
        {
            let truncated: String = resolved[value_side]
                .chars()
                .take(MAXIMUM_LENGTH_BEFORE_TRUNCATING_WHEN_COMPARED_WITH_PATTERN)
                .collect();
            resolved[value_side] = format!("{truncated}...(truncated)");
        }
    }
    let mut sides = [String::new(), String::new()];
    for i in 0..2 {
        let is_invalid =
            resolved[i] == format!("{} {INVALID_CONDITION_ELEMENT_SUFFIX}", parameters[i]);
        if is_invalid {
            sides[i] = resolved[i].clone();
        } else if parameters[i] != resolved[i] {
            sides[i] = format!("{} ({})", parameters[i], resolved[i]);
        } else {
            sides[i] = parameters[i].clone();
        }
    }
    format!("{} {} {}", sides[0], operator, sides[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_status(status: u16) -> ProbeResult {
        ProbeResult {
            http_status: status,
            ..ProbeResult::new()
        }
    }

    #[test]
    fn status_equality() {
        let condition = Condition::from("[STATUS] == 200");
        let mut result = result_with_status(200);
        assert!(condition.evaluate(&mut result, None));
        let mut result = result_with_status(500);
        assert!(!condition.evaluate(&mut result, None));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let condition = Condition::from("[STATUS] == 200");
        let mut result = result_with_status(200);
        let first = condition.evaluate(&mut result, None);
        let second = condition.evaluate(&mut result, None);
        assert_eq!(first, second);
        assert_eq!(result.condition_results.len(), 2);
        assert_eq!(
            result.condition_results[0].success,
            result.condition_results[1].success
        );
    }

    #[test]
    fn ordering_uses_numeric_comparison_not_lexicographic() {
        // "5" < "10" is false lexicographically; the evaluator must coerce.
        let condition = Condition::from("[STATUS] < 10");
        let mut result = result_with_status(5);
        assert!(condition.evaluate(&mut result, None));
        let mut result = result_with_status(9999);
        assert!(!condition.evaluate(&mut result, None));
    }

    #[test]
    fn response_time_compares_against_duration_literals() {
        let condition = Condition::from("[RESPONSE_TIME] < 500ms");
        let mut result = ProbeResult {
            duration: Duration::from_millis(50),
            ..ProbeResult::new()
        };
        assert!(condition.evaluate(&mut result, None));
        let mut result = ProbeResult {
            duration: Duration::from_millis(750),
            ..ProbeResult::new()
        };
        assert!(!condition.evaluate(&mut result, None));
    }

    #[test]
    fn certificate_expiration_compares_against_duration_literals() {
        let condition = Condition::from("[CERTIFICATE_EXPIRATION] > 48h");
        let mut result = ProbeResult {
            certificate_expiration: Duration::from_secs(60 * 24 * 3600),
            ..ProbeResult::new()
        };
        assert!(condition.evaluate(&mut result, None));
        let mut result = ProbeResult {
            certificate_expiration: Duration::from_secs(12 * 3600),
            ..ProbeResult::new()
        };
        assert!(!condition.evaluate(&mut result, None));
    }

    #[test]
    fn body_path_conditions() {
        let mut result = ProbeResult {
            body: br#"{"user": {"id": 42}, "items": [1, 2, 3]}"#.to_vec(),
            ..ProbeResult::new()
        };
        assert!(Condition::from("[BODY].user.id == 42").evaluate(&mut result, None));
        assert!(Condition::from("len([BODY].items) == 3").evaluate(&mut result, None));
        assert!(Condition::from("has([BODY].user) == true").evaluate(&mut result, None));
        assert!(Condition::from("has([BODY].admin) == false").evaluate(&mut result, None));
    }

    #[test]
    fn invalid_body_path_fails_only_that_condition() {
        let conditions = [
            Condition::from("[BODY].missing == 1"),
            Condition::from("[STATUS] == 200"),
        ];
        let mut result = ProbeResult {
            http_status: 200,
            body: br#"{"present": 1}"#.to_vec(),
            ..ProbeResult::new()
        };
        let outcomes: Vec<bool> = conditions
            .iter()
            .map(|c| c.evaluate(&mut result, None))
            .collect();
        assert_eq!(outcomes, vec![false, true]);
        assert!(result.condition_results[0]
            .condition
            .contains("(INVALID)"));
    }

    #[test]
    fn pattern_function_matches_globs() {
        let mut result = ProbeResult {
            body: b"status: healthy".to_vec(),
            ..ProbeResult::new()
        };
        assert!(Condition::from("[BODY] == pat(*healthy*)").evaluate(&mut result, None));
        assert!(!Condition::from("[BODY] == pat(*degraded*)").evaluate(&mut result, None));
    }

    #[test]
    fn any_function_matches_options() {
        let mut result = ProbeResult {
            ip: "1.0.0.1".to_string(),
            ..ProbeResult::new()
        };
        assert!(Condition::from("[IP] == any(1.1.1.1, 1.0.0.1)").evaluate(&mut result, None));
        assert!(!Condition::from("[IP] == any(8.8.8.8, 8.8.4.4)").evaluate(&mut result, None));
    }

    #[test]
    fn connected_compares_as_boolean() {
        let mut result = ProbeResult {
            connected: true,
            ..ProbeResult::new()
        };
        assert!(Condition::from("[CONNECTED] == true").evaluate(&mut result, None));
        assert!(Condition::from("[CONNECTED] != false").evaluate(&mut result, None));
    }

    #[test]
    fn malformed_condition_records_an_error() {
        let condition = Condition::from("[STATUS] IS 200");
        let mut result = ProbeResult::new();
        assert!(!condition.evaluate(&mut result, None));
        assert_eq!(result.errors, vec!["invalid condition: [STATUS] IS 200"]);
        assert!(result.condition_results.is_empty());
    }

    #[test]
    fn validate_accepts_well_formed_and_rejects_malformed() {
        assert!(Condition::from("[STATUS] == 200").validate().is_ok());
        assert!(Condition::from("[RESPONSE_TIME] < 1s").validate().is_ok());
        assert!(Condition::from("[STATUS] equals 200").validate().is_err());
    }

    #[test]
    fn failed_conditions_are_annotated_with_resolved_values() {
        let condition = Condition::from("[STATUS] == 200");
        let mut result = result_with_status(503);
        condition.evaluate(&mut result, None);
        assert_eq!(
            result.condition_results[0].condition,
            "[STATUS] (503) == 200"
        );
    }

    #[test]
    fn successful_conditions_keep_their_original_text() {
        let condition = Condition::from("[STATUS] == 200");
        let mut result = result_with_status(200);
        condition.evaluate(&mut result, None);
        assert_eq!(result.condition_results[0].condition, "[STATUS] == 200");
    }

    #[test]
    fn long_values_compared_with_patterns_are_truncated_in_display() {
        let condition = Condition::from("[BODY] == pat(*impossible*)");
        let mut result = ProbeResult {
            body: b"this body is much longer than twenty-five characters".to_vec(),
            ..ProbeResult::new()
        };
        condition.evaluate(&mut result, None);
        assert!(result.condition_results[0]
            .condition
            .contains("...(truncated)"));
    }

    #[test]
    fn failed_duration_comparison_renders_durations() {
        let condition = Condition::from("[CERTIFICATE_EXPIRATION] > 48h");
        let mut result = ProbeResult {
            certificate_expiration: Duration::from_secs(24 * 3600),
            ..ProbeResult::new()
        };
        condition.evaluate(&mut result, None);
        assert_eq!(
            result.condition_results[0].condition,
            "[CERTIFICATE_EXPIRATION] (24h) > 48h"
        );
    }
}
