use serde_json::Value;

use crate::error::{OracleError, OracleResult};

/// Strips a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses a model reply into JSON, tolerating fenced replies.
pub fn parse_json_response(text: &str) -> OracleResult<Value> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(OracleError::Parse("empty response".to_string()));
    }
    serde_json::from_str(body).map_err(|e| OracleError::Parse(format!("Invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let value = parse_json_response(r#" {"vote": "Bob"} "#).unwrap();
        assert_eq!(value["vote"], "Bob");
    }

    #[test]
    fn test_fenced_json() {
        let value = parse_json_response("```json\n{\"target\": \"Eve\"}\n```").unwrap();
        assert_eq!(value["target"], "Eve");

        let value = parse_json_response("```\n{\"target\": \"Eve\"}\n```").unwrap();
        assert_eq!(value["target"], "Eve");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_json_response("I vote for Bob"),
            Err(OracleError::Parse(_))
        ));
        assert!(matches!(parse_json_response("  "), Err(OracleError::Parse(_))));
    }
}
