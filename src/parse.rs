//! Lenient JSON extraction from model output
//!
//! Model replies frequently arrive inside code fences, with trailing commas,
//! single-quoted strings, comments, or wrapped in prose. This module
//! centralizes recovery in one fallback chain so every stage's parse site
//! stays trivial:
//!
//! 1. Direct parse of the trimmed input
//! 2. De-fence: strip markdown code fences and surrounding backticks
//! 3. Repair: trailing commas, bare keys, single quotes, comments
//! 4. Extract: first `{...}` (greedy) or `[...]` substring
//!
//! Extraction is a pure function of its inputs and never panics.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// How much of the raw text an error keeps for diagnostics
const PREVIEW_LEN: usize = 200;

/// Options controlling the recovery chain
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Caller-supplied context prefixed to diagnostics
    pub context: String,

    /// When false only the direct parse runs
    pub enable_cleanup: bool,
}

impl ParseOptions {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            enable_cleanup: true,
        }
    }

    /// Direct parse only, no recovery strategies
    pub fn strict(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            enable_cleanup: false,
        }
    }
}

/// Failure to recover a typed value from model text
#[derive(Debug, Clone, Error)]
#[error("{context}: {diagnostic} (response preview: {preview:?})")]
pub struct ParseError {
    pub context: String,
    pub diagnostic: String,
    pub preview: String,
    /// The original, unmodified input text
    pub raw: String,
}

impl ParseError {
    fn new(context: &str, diagnostic: impl Into<String>, raw: &str) -> Self {
        Self {
            context: context.to_string(),
            diagnostic: diagnostic.into(),
            preview: truncate_chars(raw.trim(), PREVIEW_LEN),
            raw: raw.to_string(),
        }
    }
}

/// Recover a value of type `T` from raw model output.
///
/// Strategies run in strict order; the first success wins.
pub fn parse_lenient<T: DeserializeOwned>(text: &str, options: &ParseOptions) -> Result<T, ParseError> {
    let trimmed = text.trim();

    let direct_err = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if !options.enable_cleanup {
        return Err(ParseError::new(
            &options.context,
            format!("invalid JSON: {}", direct_err),
            text,
        ));
    }

    let defenced = strip_fences(trimmed);
    if let Ok(value) = serde_json::from_str::<T>(defenced.trim()) {
        debug!(context = %options.context, "parse recovered by de-fencing");
        return Ok(value);
    }

    let repaired = repair_json(&defenced);
    if let Ok(value) = serde_json::from_str::<T>(repaired.trim()) {
        debug!(context = %options.context, "parse recovered by repair");
        return Ok(value);
    }

    if let Some(extracted) = extract_json(&defenced) {
        if let Ok(value) = serde_json::from_str::<T>(extracted) {
            debug!(context = %options.context, "parse recovered by extraction");
            return Ok(value);
        }
        let extracted_repaired = repair_json(extracted);
        if let Ok(value) = serde_json::from_str::<T>(&extracted_repaired) {
            debug!(context = %options.context, "parse recovered by extraction + repair");
            return Ok(value);
        }
    }

    Err(ParseError::new(
        &options.context,
        format!("no strategy produced valid JSON: {}", direct_err),
        text,
    ))
}

/// Like [`parse_lenient`] but rejects values that fail the predicate
pub fn parse_with_validation<T, F>(text: &str, options: &ParseOptions, validate: F) -> Result<T, ParseError>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> Result<(), String>,
{
    let value = parse_lenient::<T>(text, options)?;
    validate(&value).map_err(|reason| {
        ParseError::new(&options.context, format!("validation rejected value: {}", reason), text)
    })?;
    Ok(value)
}

/// Like [`parse_lenient`] but falls back to a caller-supplied default
pub fn parse_or_default<T: DeserializeOwned>(text: &str, options: &ParseOptions, default: T) -> T {
    match parse_lenient(text, options) {
        Ok(value) => value,
        Err(e) => {
            debug!(context = %options.context, error = %e.diagnostic, "parse failed, using default");
            default
        }
    }
}

/// Strip markdown code fences and surrounding single backticks
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();

    // Fences wrapping the whole input
    if trimmed.starts_with("```") {
        if let Some(inner) = fence_interior(trimmed) {
            return inner;
        }
    }

    // A fenced block somewhere inside prose
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start..];
        if let Some(inner) = fence_interior(after) {
            return inner;
        }
    }

    // Surrounding single backticks
    let backtick = trimmed.trim_start_matches('`').trim_end_matches('`');
    backtick.to_string()
}

/// Interior of a leading fenced block, with any language tag removed
fn fence_interior(text: &str) -> Option<String> {
    let body = text.strip_prefix("```")?;
    let close = body.find("```")?;
    let mut inner = &body[..close];

    for tag in ["json", "javascript", "js"] {
        if let Some(rest) = inner.strip_prefix(tag) {
            inner = rest;
            break;
        }
    }

    Some(inner.trim().to_string())
}

/// Repair common JSON defects while respecting string boundaries:
/// line and block comments, single-quoted strings, bare identifier keys,
/// and trailing commas.
fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let (string, next) = consume_string(&chars, i, c);
                out.push_str(&string);
                i = next;
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                // Trailing comma before a closing bracket
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    i += 1;
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let is_key = j < chars.len() && chars[j] == ':';
                let is_literal = matches!(word.as_str(), "true" | "false" | "null");

                if is_key && !is_literal {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Consume a string starting at `start` (which holds `quote`), emitting a
/// double-quoted JSON string. Returns the emitted text and the index after
/// the closing quote.
fn consume_string(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut out = String::from('"');
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            if quote == '\'' && escaped == '\'' {
                // \' has no meaning in JSON
                out.push('\'');
            } else {
                out.push('\\');
                out.push(escaped);
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return (out, i + 1);
        }
        if quote == '\'' && c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
        i += 1;
    }

    // Unterminated string; emit what we have
    (out, i)
}

/// First `{...}` substring (greedy to the last brace), else `[...]`
fn extract_json(text: &str) -> Option<&str> {
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(start) = text.find(open)
            && let Some(end) = text.rfind(close)
            && end > start
        {
            return Some(&text[start..=end]);
        }
    }
    None
}

/// Truncate to at most `max` characters on a char boundary
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        success: bool,
        message: String,
    }

    fn opts() -> ParseOptions {
        ParseOptions::new("test")
    }

    #[test]
    fn test_direct_parse() {
        let reply: Reply = parse_lenient(r#"{"success": true, "message": "ok"}"#, &opts()).unwrap();
        assert!(reply.success);
        assert_eq!(reply.message, "ok");
    }

    #[test]
    fn test_fenced_json() {
        let text = "```json\n{\"success\": true, \"message\": \"ok\"}\n```";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);
    }

    #[test]
    fn test_fenced_with_prose_and_trailing_comma() {
        // De-fence plus trailing-comma repair
        let text = "Here's your answer:\n```json\n{\"success\":true,\"message\":\"ok\",}\n```\nDone.";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert_eq!(
            reply,
            Reply {
                success: true,
                message: "ok".to_string()
            }
        );
    }

    #[test]
    fn test_generic_fence_and_backticks() {
        let text = "```\n{\"success\": true, \"message\": \"ok\"}\n```";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);

        let text = "`{\"success\": true, \"message\": \"ok\"}`";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);
    }

    #[test]
    fn test_trailing_commas_everywhere() {
        let text = r#"{"items": [1, 2, 3,], "message": "ok",}"#;
        let value: serde_json::Value = parse_lenient(text, &opts()).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_bare_keys() {
        let text = r#"{ success: true, message: "ok" }"#;
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);
    }

    #[test]
    fn test_single_quotes() {
        let text = r#"{'success': true, 'message': 'it is "fine"'}"#;
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert_eq!(reply.message, r#"it is "fine""#);
    }

    #[test]
    fn test_comments_stripped() {
        let text = "{\n  // status flag\n  \"success\": true, /* inline */ \"message\": \"ok\"\n}";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);
    }

    #[test]
    fn test_extraction_from_prose() {
        let text = "The plan looks good. {\"success\": true, \"message\": \"ok\"} Let me know.";
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert!(reply.success);
    }

    #[test]
    fn test_array_extraction() {
        let text = "Results: [1, 2, 3] as requested";
        let values: Vec<u32> = parse_lenient(text, &opts()).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_comment_slashes_inside_strings_preserved() {
        let text = r#"{"message": "https://example.com/path", "success": true}"#;
        let reply: Reply = parse_lenient(text, &opts()).unwrap();
        assert_eq!(reply.message, "https://example.com/path");
    }

    #[test]
    fn test_strict_mode_skips_cleanup() {
        let text = "```json\n{\"success\": true, \"message\": \"ok\"}\n```";
        let result: Result<Reply, _> = parse_lenient(text, &ParseOptions::strict("test"));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_carries_context_and_preview() {
        let err = parse_lenient::<Reply>("not json at all", &ParseOptions::new("assessment parse")).unwrap_err();
        assert_eq!(err.context, "assessment parse");
        assert!(err.preview.contains("not json"));
        assert_eq!(err.raw, "not json at all");
        assert!(err.to_string().starts_with("assessment parse:"));
    }

    #[test]
    fn test_parse_with_validation() {
        let ok: Result<Reply, _> = parse_with_validation(
            r#"{"success": true, "message": "ok"}"#,
            &opts(),
            |r: &Reply| if r.success { Ok(()) } else { Err("not successful".into()) },
        );
        assert!(ok.is_ok());

        let rejected: Result<Reply, _> = parse_with_validation(
            r#"{"success": false, "message": "ok"}"#,
            &opts(),
            |r: &Reply| if r.success { Ok(()) } else { Err("not successful".into()) },
        );
        let err = rejected.unwrap_err();
        assert!(err.diagnostic.contains("not successful"));
    }

    #[test]
    fn test_parse_or_default() {
        let value: Vec<u32> = parse_or_default("garbage", &opts(), vec![9]);
        assert_eq!(value, vec![9]);

        let value: Vec<u32> = parse_or_default("[1,2]", &opts(), vec![9]);
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_unterminated_string_does_not_panic() {
        let result: Result<serde_json::Value, _> = parse_lenient("{\"a\": \"unterminated", &opts());
        assert!(result.is_err());
    }

    proptest! {
        // The extractor must terminate and return a Result for any input
        #[test]
        fn prop_parse_never_panics(text in "\\PC*") {
            let _ = parse_lenient::<serde_json::Value>(&text, &opts());
        }

        // Valid JSON always round-trips untouched
        #[test]
        fn prop_valid_json_parses(n in any::<i64>(), s in "[a-z]{0,16}") {
            let json = format!(r#"{{"n": {}, "s": "{}"}}"#, n, s);
            let value: serde_json::Value = parse_lenient(&json, &opts()).unwrap();
            prop_assert_eq!(value["n"].as_i64().unwrap(), n);
            prop_assert_eq!(value["s"].as_str().unwrap(), s.as_str());
        }

        // Fenced valid JSON is always recovered
        #[test]
        fn prop_fenced_json_recovered(n in any::<u32>()) {
            let fenced = format!("```json\n{{\"n\": {}}}\n```", n);
            let value: serde_json::Value = parse_lenient(&fenced, &opts()).unwrap();
            prop_assert_eq!(value["n"].as_u64().unwrap(), n as u64);
        }
    }
}
