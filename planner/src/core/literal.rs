//! Lenient parser for language-native literal structures.
//!
//! Reasoning services sometimes answer with a Python-style mapping instead of
//! strict JSON: single-quoted strings, `True`/`False`/`None`, tuples and
//! trailing commas. The grammar in `literal.pest` accepts that dialect (and
//! plain JSON); [`parse_literal`] turns the parse tree into a `serde_json::Value`.

use pest::Parser;
use pest::iterators::Pair;
use serde_json::{Map, Number, Value};

/// Deepest container nesting accepted.
pub const MAX_DEPTH: usize = 64;

#[derive(pest_derive::Parser)]
#[grammar = "core/literal.pest"]
struct LiteralParser;

/// Parse `input` as a literal. Returns `None` unless the whole input matches.
///
/// Input nested deeper than [`MAX_DEPTH`] is rejected before parsing so that
/// hostile text cannot exhaust the stack.
pub fn parse_literal(input: &str) -> Option<Value> {
    if nesting_exceeds(input, MAX_DEPTH) {
        return None;
    }
    let literal = LiteralParser::parse(Rule::literal, input).ok()?.next()?;
    let value = literal.into_inner().next()?;
    build_value(value)
}

/// Iterative bracket scan; brackets inside quoted strings do not count.
fn nesting_exceeds(input: &str, limit: usize) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in input.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '{' | '(' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}

fn build_value(pair: Pair<'_, Rule>) -> Option<Value> {
    match pair.as_rule() {
        Rule::mapping => {
            let mut map = Map::new();
            for entry in pair.into_inner() {
                let mut parts = entry.into_inner();
                let key = match build_value(parts.next()?)? {
                    Value::String(s) => s,
                    Value::Null => "None".to_string(),
                    other => other.to_string(),
                };
                let value = build_value(parts.next()?)?;
                map.insert(key, value);
            }
            Some(Value::Object(map))
        }
        Rule::list | Rule::tuple => pair
            .into_inner()
            .map(build_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Rule::string => pair
            .into_inner()
            .map(|part| unescape(part.as_str()))
            .collect::<Option<String>>()
            .map(Value::String),
        Rule::number => number(pair.as_str()),
        Rule::boolean => Some(Value::Bool(matches!(pair.as_str(), "True" | "true"))),
        Rule::none => Some(Value::Null),
        _ => None,
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
    }
    Some(out)
}

fn number(raw: &str) -> Option<Value> {
    let raw: String = raw.chars().filter(|c| *c != '_').collect();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    let float = raw.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}
