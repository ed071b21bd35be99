//! Dotted/indexed path evaluation over JSON response bodies.
//!
//! Backs the `[BODY].path` placeholder family. Paths address object keys
//! with dots (`user.name`), array elements with brackets (`items[0]`,
//! including a bare root index `[0]`), and evaluation reports both the
//! value's string form and a length usable by the `len()` function
//! (element count for arrays, byte length otherwise).

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unclosed bracket in path")]
    UnclosedBracket,

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    #[error("null value at path element: {0}")]
    NullValue(String),

    #[error("cannot access '{0}' on this value type")]
    TypeMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Key(String),
    Index(usize),
}

/// Evaluates `path` against a JSON document and returns the resolved value
/// as a string along with its length.
///
/// An empty path addresses the document root.
pub fn eval(path: &str, data: &[u8]) -> Result<(String, usize), JsonPathError> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| JsonPathError::InvalidJson(e.to_string()))?;
    let tokens = tokenize(path)?;
    if tokens.is_empty() {
        // The whole document; strings keep their quotes so that a JSON
        // string body is distinguishable from a plain-text one.
        return match &value {
            Value::String(_) => {
                let rendered = value.to_string();
                let length = rendered.len();
                Ok((rendered, length))
            }
            _ => format_value(&value),
        };
    }
    // A primitive root cannot be walked; resolve to the primitive itself.
    if !value.is_object() && !value.is_array() {
        return format_value(&value);
    }
    walk(&value, &tokens)
}

fn tokenize(path: &str) -> Result<Vec<Token>, JsonPathError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = path.trim().chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => i += 1,
            '[' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(JsonPathError::UnclosedBracket);
                }
                let raw: String = chars[start..i].iter().collect();
                let index = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| JsonPathError::InvalidIndex(raw.trim().to_string()))?;
                tokens.push(Token::Index(index));
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                let key = key.trim().to_string();
                if !key.is_empty() {
                    tokens.push(Token::Key(key));
                }
            }
        }
    }
    Ok(tokens)
}

fn walk(value: &Value, tokens: &[Token]) -> Result<(String, usize), JsonPathError> {
    let Some(token) = tokens.first() else {
        return format_value(value);
    };
    match token {
        Token::Key(key) => match value {
            Value::Object(map) => match map.get(key) {
                Some(Value::Null) => Err(JsonPathError::NullValue(key.clone())),
                Some(next) => walk(next, &tokens[1..]),
                None => Err(JsonPathError::KeyNotFound(key.clone())),
            },
            _ => Err(JsonPathError::TypeMismatch(key.clone())),
        },
        Token::Index(index) => match value {
            Value::Array(items) => match items.get(*index) {
                Some(Value::Null) => Err(JsonPathError::NullValue(index.to_string())),
                Some(next) => walk(next, &tokens[1..]),
                None => Err(JsonPathError::IndexOutOfBounds(*index)),
            },
            _ => Err(JsonPathError::TypeMismatch(index.to_string())),
        },
    }
}

fn format_value(value: &Value) -> Result<(String, usize), JsonPathError> {
    match value {
        Value::Null => Ok(("null".to_string(), 4)),
        Value::String(s) => Ok((s.clone(), s.len())),
        Value::Number(n) => {
            let rendered = if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().unwrap_or_default().to_string()
            };
            let length = rendered.len();
            Ok((rendered, length))
        }
        Value::Bool(b) => {
            let rendered = b.to_string();
            let length = rendered.len();
            Ok((rendered, length))
        }
        // Arrays report their element count as the length, which is what
        // len([BODY].items) measures.
        Value::Array(items) => Ok((value.to_string(), items.len())),
        Value::Object(_) => {
            let rendered = value.to_string();
            let length = rendered.len();
            Ok((rendered, length))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_nested_keys() {
        let body = br#"{"user": {"name": "john", "id": 42}}"#;
        assert_eq!(eval("user.name", body).unwrap().0, "john");
        assert_eq!(eval("user.id", body).unwrap().0, "42");
    }

    #[test]
    fn resolves_array_indexing() {
        let body = br#"{"items": [{"id": 1}, {"id": 2}]}"#;
        assert_eq!(eval("items[1].id", body).unwrap().0, "2");
        let root_array = br#"[{"id": 7}]"#;
        assert_eq!(eval("[0].id", root_array).unwrap().0, "7");
    }

    #[test]
    fn array_length_is_element_count() {
        let body = br#"{"items": [1, 2, 3]}"#;
        assert_eq!(eval("items", body).unwrap().1, 3);
        assert_eq!(eval("", br#"[1, 2, 3, 4]"#).unwrap().1, 4);
    }

    #[test]
    fn missing_key_and_out_of_bounds_are_errors() {
        let body = br#"{"items": [1]}"#;
        assert_eq!(
            eval("nope", body),
            Err(JsonPathError::KeyNotFound("nope".to_string()))
        );
        assert_eq!(eval("items[3]", body), Err(JsonPathError::IndexOutOfBounds(3)));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            eval("key", b"not json"),
            Err(JsonPathError::InvalidJson(_))
        ));
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        let body = br#"{"count": 4, "ratio": 4.5}"#;
        assert_eq!(eval("count", body).unwrap().0, "4");
        assert_eq!(eval("ratio", body).unwrap().0, "4.5");
    }

    #[test]
    fn whole_document_string_keeps_quotes() {
        assert_eq!(eval("", br#""hello""#).unwrap().0, "\"hello\"");
    }
}
