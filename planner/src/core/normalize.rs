//! Typed extraction from untrusted reasoning-service responses.
//!
//! A response may arrive as an already-decoded mapping, as JSON text (possibly
//! wrapped in a Markdown code fence), as a language-native literal, or as free
//! text. Extraction never fails: when nothing usable is found the caller's
//! default is returned, tagged [`Extraction::Fallback`] so the degraded path
//! stays observable.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::literal::parse_literal;

/// Sub-fields preferred when a nested mapping stands in for a text value.
const DESCRIPTION_KEYS: [&str; 4] = ["description", "text", "title", "step"];

/// Raw answer from the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasonerResponse {
    /// The service already decoded its answer.
    Json(Value),
    /// Plain text output.
    Text(String),
    /// A chat-style message object; `content` is its text payload.
    Message { content: String },
}

impl ReasonerResponse {
    /// Text form of the response (JSON is serialized compactly).
    pub fn raw_text(&self) -> String {
        match self {
            ReasonerResponse::Json(value) => match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            ReasonerResponse::Text(text) => text.clone(),
            ReasonerResponse::Message { content } => content.clone(),
        }
    }
}

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    /// The value came from the response.
    Parsed(T),
    /// The response was unusable; the value is the caller's default.
    Fallback(T),
}

impl<T> Extraction<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Extraction::Parsed(value) | Extraction::Fallback(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extraction<U> {
        match self {
            Extraction::Parsed(value) => Extraction::Parsed(f(value)),
            Extraction::Fallback(value) => Extraction::Fallback(f(value)),
        }
    }
}

/// Expected shape of an extracted field, carrying its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
}

impl FieldValue {
    pub fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::TextList(items) => items.join("\n"),
        }
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            FieldValue::Text(text) => vec![text],
            FieldValue::TextList(items) => items,
        }
    }
}

/// Extract `field` from `raw`, coerced to the shape of `default`.
///
/// Rules, in order: read a decoded mapping directly; decode text as JSON;
/// decode text as a lenient literal; otherwise (or when the field is absent,
/// `null` or blank) return `default` as a fallback.
pub fn extract_field(raw: &ReasonerResponse, field: &str, default: FieldValue) -> Extraction<FieldValue> {
    let Some(value) = decode_response(raw).and_then(|doc| take_field(doc, field)) else {
        return Extraction::Fallback(default);
    };
    let coerced = match default {
        FieldValue::Text(_) => coerce_text(value).map(FieldValue::Text),
        FieldValue::TextList(_) => coerce_list(value).map(FieldValue::TextList),
    };
    match coerced {
        Some(value) => Extraction::Parsed(value),
        None => Extraction::Fallback(default),
    }
}

/// Clarified goal from a clarify-phase response; falls back to `goal`.
pub fn extract_clarified_goal(raw: &ReasonerResponse, goal: &str) -> Extraction<String> {
    extract_field(raw, "clarified_goal", FieldValue::Text(goal.to_string()))
        .map(FieldValue::into_text)
}

/// Plan steps from a plan-phase response; falls back to the raw text as one step.
pub fn extract_plan(raw: &ReasonerResponse) -> Extraction<Vec<String>> {
    extract_field(raw, "steps", FieldValue::TextList(vec![raw.raw_text()]))
        .map(FieldValue::into_list)
}

/// Report text from a free-text response.
///
/// Message payloads win; a mapping yields its `report` or `text` field, else
/// its full serialized form; text is returned unchanged.
pub fn extract_report(raw: &ReasonerResponse) -> String {
    match raw {
        ReasonerResponse::Message { content } => content.clone(),
        ReasonerResponse::Text(text) => text.clone(),
        ReasonerResponse::Json(Value::Object(map)) => ["report", "text"]
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        ReasonerResponse::Json(other) => raw_text_of(other),
    }
}

fn raw_text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn the response into a document value, if any structure can be found.
fn decode_response(raw: &ReasonerResponse) -> Option<Value> {
    match raw {
        ReasonerResponse::Json(Value::String(text)) => decode_text(text),
        ReasonerResponse::Json(value) => Some(value.clone()),
        ReasonerResponse::Text(text) | ReasonerResponse::Message { content: text } => {
            decode_text(text)
        }
    }
}

/// Strict JSON first, then the lenient literal dialect.
pub fn decode_text(text: &str) -> Option<Value> {
    let body = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Some(value);
    }
    parse_literal(body)
}

fn strip_code_fence(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\n?(.*?)\s*```\s*$").unwrap()
    });
    match FENCE_RE.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str(),
        None => text.trim(),
    }
}

fn take_field(doc: Value, field: &str) -> Option<Value> {
    let Value::Object(mut map) = doc else {
        return None;
    };
    match map.remove(field)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(value),
    }
}

fn coerce_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            if s.trim_start().starts_with('{')
                && let Some(Value::Object(map)) = decode_text(&s)
            {
                return Some(describe_mapping(map));
            }
            Some(s)
        }
        Value::Object(map) => Some(describe_mapping(map)),
        other => Some(other.to_string()),
    }
}

fn coerce_list(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(items.into_iter().map(element_text).collect()),
        Value::String(s) => {
            if s.trim_start().starts_with('[')
                && let Some(Value::Array(items)) = decode_text(&s)
            {
                return Some(items.into_iter().map(element_text).collect());
            }
            Some(vec![s])
        }
        other => Some(vec![element_text(other)]),
    }
}

fn element_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Object(map) => describe_mapping(map),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Prefer a description-like string sub-field, else the whole mapping as JSON.
fn describe_mapping(map: Map<String, Value>) -> String {
    for key in DESCRIPTION_KEYS {
        if let Some(Value::String(s)) = map.get(key)
            && !s.trim().is_empty()
        {
            return s.clone();
        }
    }
    Value::Object(map).to_string()
}
