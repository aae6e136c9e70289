//! Salvaging structured output from generative backends
//!
//! Two stages: [`strip_fences`] removes markdown fencing, then
//! [`parse_lenient`] parses the remainder, repairing the usual model
//! mistakes when strict JSON parsing fails. Nothing here panics or returns
//! an opaque error; callers get a [`Parsed`] to branch on.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Outcome of a lenient parse
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Value(Value),
    Unparsable { reason: String },
}

impl Parsed {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Parsed::Value(v) => Some(v),
            Parsed::Unparsable { .. } => None,
        }
    }
}

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").expect("valid fence regex"))
}

fn embedded_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid block regex")
    })
}

/// Remove markdown code fences (with optional language tag) around a payload
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with("```") {
        let body = opening_fence().replace(trimmed, "");
        let body = body.trim_end();
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim().to_string();
    }

    if let Some(caps) = embedded_block().captures(trimmed) {
        debug!("extracted fenced block from surrounding text");
        return caps[1].trim().to_string();
    }

    trimmed.to_string()
}

/// Parse JSON, tolerating unquoted keys, bare values, single quotes, trailing
/// commas, Python literals, comments, truncation and surrounding prose
pub fn parse_lenient(text: &str) -> Parsed {
    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(v) => return Parsed::Value(v),
        Err(e) => e,
    };

    let Some(start) = text.find(|c| c == '[' || c == '{') else {
        return Parsed::Unparsable {
            reason: format!("no JSON payload found ({})", strict_err),
        };
    };

    let repaired = repair(&text[start..]);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(v) => {
            debug!("lenient parse succeeded after repair");
            Parsed::Value(v)
        }
        Err(e) => Parsed::Unparsable {
            reason: format!("unrecoverable JSON: {}", e),
        },
    }
}

/// Rewrite one JSON-ish value (starting at `{` or `[`) into strict JSON.
/// Text after the top-level value closes is dropped.
fn repair(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut closers: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
            }
            '{' | '[' => {
                if matches!(last_significant(&out), Some('}') | Some(']')) {
                    out.push(',');
                }
                closers.push(if c == '{' { '}' } else { ']' });
                out.push(c);
                i += 1;
            }
            '}' | ']' => {
                i += 1;
                if !closers.contains(&c) {
                    continue;
                }
                while let Some(closer) = closers.pop() {
                    trim_trailing_comma(&mut out);
                    out.push(closer);
                    if closer == c {
                        break;
                    }
                }
                if closers.is_empty() {
                    break;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                i = copy_bare_word(&chars, i, &mut out);
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                i = copy_numeric(&chars, i, &mut out);
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    while let Some(closer) = closers.pop() {
        trim_trailing_comma(&mut out);
        out.push(closer);
    }

    out
}

/// Copy a single- or double-quoted string as a double-quoted JSON string.
/// Returns the index after the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => {
                match chars.get(i) {
                    Some('\'') => out.push('\''),
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => {}
                }
                i += 1;
            }
            // apostrophe inside a single-quoted string: isn't, O'Brien
            '\'' if quote == '\'' && chars.get(i).is_some_and(|n| n.is_alphabetic()) => {
                out.push('\'');
            }
            c if c == quote => {
                out.push('"');
                return i;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }

    // unterminated
    out.push('"');
    chars.len()
}

/// Handle an unquoted token: a key, a literal, or a bare string value
fn copy_bare_word(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut end = start;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    let word: String = chars[start..end].iter().collect();

    let mut look = end;
    while look < chars.len() && chars[look].is_whitespace() {
        look += 1;
    }
    if chars.get(look) == Some(&':') {
        push_json_string(&word, out);
        return end;
    }

    if let Some(literal) = literal_for(&word) {
        out.push_str(literal);
        return end;
    }

    // Bare value: runs to the next delimiter
    let run_end = value_end(chars, end);
    let run: String = chars[start..run_end].iter().collect();
    push_json_string(run.trim(), out);
    run_end
}

/// Handle a token starting with a digit or minus sign. A lone number
/// (exponents included) is kept; anything longer, like `500 errors on
/// checkout`, becomes one bare string. Numeric keys are quoted.
fn copy_numeric(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut end = start;
    while end < chars.len() && (is_word_char(chars[end]) || chars[end] == '+') {
        end += 1;
    }

    let mut look = end;
    while look < chars.len() && chars[look].is_whitespace() {
        look += 1;
    }
    if chars.get(look) == Some(&':') && matches!(last_significant(out), Some('{') | Some(',')) {
        let key: String = chars[start..end].iter().collect();
        push_json_string(&key, out);
        return end;
    }

    let run_end = value_end(chars, start);
    let run: String = chars[start..run_end].iter().collect();
    let run = run.trim();
    match serde_json::from_str::<Value>(run) {
        Ok(Value::Number(_)) => out.push_str(run),
        _ => push_json_string(run, out),
    }
    run_end
}

/// End of an unquoted value: the next `,`, `}`, `]`, newline or comment
fn value_end(chars: &[char], from: usize) -> usize {
    let mut end = from;
    while end < chars.len() && !matches!(chars[end], ',' | '}' | ']' | '\n') {
        if chars[end] == '/'
            && matches!(chars.get(end + 1), Some('/') | Some('*'))
            && end > 0
            && chars[end - 1].is_whitespace()
        {
            break;
        }
        end += 1;
    }
    end
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

fn literal_for(word: &str) -> Option<&'static str> {
    match word {
        "true" | "True" | "TRUE" => Some("true"),
        "false" | "False" | "FALSE" => Some("false"),
        "null" | "None" | "NULL" | "undefined" => Some("null"),
        _ => None,
    }
}

fn push_json_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

fn last_significant(out: &str) -> Option<char> {
    out.chars().rev().find(|c| !c.is_whitespace())
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
}
