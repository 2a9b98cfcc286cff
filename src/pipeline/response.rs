//! Response cleanup: recover the JSON object from a model reply.
//!
//! Models asked for bare JSON still sometimes wrap it in ```` ```json ````
//! fences, prefix it with a sentence, or trail a remark after the closing
//! brace. These rules strip that packaging without touching the object
//! itself, so a reply that *contains* a valid object parses as one.
//!
//! Rules (applied in order):
//! 1. Strip a leading BOM / zero-width characters
//! 2. Strip outer code fences (```` ```json ```` or bare ```` ``` ````)
//! 3. If the text is not already valid JSON, take the span from the
//!    first `{` to the last `}`

use crate::error::MalformedResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Remove the packaging around a JSON reply.
pub fn clean_json_text(input: &str) -> String {
    let s = input
        .trim_start_matches(['\u{FEFF}', '\u{200B}'])
        .trim();
    let s = match RE_OUTER_FENCES.captures(s) {
        Some(caps) => caps[1].trim().to_string(),
        None => s.to_string(),
    };
    if s.starts_with('{') || serde_json::from_str::<Value>(&s).is_ok() {
        return s;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s,
    }
}

/// Parse a reply as a JSON object.
pub fn parse_object(input: &str) -> Result<Map<String, Value>, MalformedResponse> {
    let cleaned = clean_json_text(input);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(MalformedResponse {
            detail: format!("expected a JSON object, got {}", json_kind(&other)),
            raw: input.to_string(),
        }),
        Err(e) => Err(MalformedResponse {
            detail: e.to_string(),
            raw: input.to_string(),
        }),
    }
}

/// Parse a reply into a typed structure.
pub fn parse_typed<T: DeserializeOwned>(input: &str) -> Result<T, MalformedResponse> {
    serde_json::from_str(&clean_json_text(input)).map_err(|e| MalformedResponse {
        detail: e.to_string(),
        raw: input.to_string(),
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_json_text(input), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fences() {
        let input = "```\n{\"a\": 1}\n```\n";
        assert_eq!(clean_json_text(input), "{\"a\": 1}");
    }

    #[test]
    fn extracts_object_from_prose() {
        let input = "Here is the data:\n{\"a\": {\"b\": 2}}\nLet me know!";
        assert_eq!(clean_json_text(input), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn plain_object_passthrough() {
        assert_eq!(clean_json_text("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn top_level_array_is_not_unwrapped() {
        assert_eq!(clean_json_text(r#"[{"id": 1}]"#), r#"[{"id": 1}]"#);
        assert!(parse_object("```json\n[{\"id\": 1}]\n```").is_err());
    }

    #[test]
    fn parse_object_rejects_arrays_and_garbage() {
        assert!(parse_object("[1, 2]").is_err());
        let err = parse_object("I could not read this page.").unwrap_err();
        assert_eq!(err.raw, "I could not read this page.");
        assert!(parse_object("\u{FEFF}{\"ok\": true}").is_ok());
    }
}
