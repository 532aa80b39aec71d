//! Payload extraction and parsing.
//!
//! `extract` turns a raw span body into clean payload text by stripping the
//! carrier's own decoration (comment prefixes, block-comment stars, fixed
//! columns) and normalizing indentation. `parse_payload` then reads the
//! key/value body: scalars, quoted scalars, `- item` lists, `key: |` block
//! scalars and nested maps, with duplicate keys resolved last-wins.

use crate::diag::ParseFailure;
use crate::model::{CanonicalPayload, CarrierKind, CarrierSignature, CarrierSpan, PayloadMap, Value};

// -- Extraction ---------------------------------------------------------------

/// Strip carrier decoration from a span body and normalize it for parsing.
pub fn extract(span: &CarrierSpan, sig: &CarrierSignature) -> String {
    let body = span.raw_body.replace("\r\n", "\n").replace('\r', "\n");
    let stripped: Vec<String> = match sig.kind {
        CarrierKind::LineCommentRun => body
            .lines()
            .map(|line| strip_line_prefix(line, &sig.open_token))
            .collect(),
        CarrierKind::Positional => {
            let column = sig.column_rule.map_or(0, |r| r.column);
            body.lines()
                .map(|line| line.chars().skip(column).collect())
                .collect()
        }
        CarrierKind::BlockComment => body
            .lines()
            .map(|line| strip_block_decoration(line, &sig.open_token))
            .collect(),
        CarrierKind::StringLiteral | CarrierKind::Attribute => {
            body.lines().map(str::to_string).collect()
        }
    };
    dedent(&stripped)
}

/// Remove the full doc prefix, or just its leading word on continuation
/// lines (`%% @doc` starts, plain `%%` continues), plus one padding space.
fn strip_line_prefix(line: &str, open: &str) -> String {
    let trimmed = line.trim_start();
    let leader = open.split_whitespace().next().unwrap_or(open);
    let rest = trimmed
        .strip_prefix(open)
        .or_else(|| trimmed.strip_prefix(leader))
        .unwrap_or(trimmed);
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// Remove a decorative gutter character inherited from the open token
/// (`*` inside `/** */`, `+` inside `/++ +/`).
fn strip_block_decoration(line: &str, open: &str) -> String {
    let decoration = match open.chars().nth(1) {
        Some(c @ ('*' | '+')) => c,
        _ => return line.to_string(),
    };
    let trimmed = line.trim_start();
    match trimmed.strip_prefix(decoration) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        None => line.to_string(),
    }
}

/// Drop leading/trailing blank lines and the common leading whitespace.
fn dedent(lines: &[String]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let Some(start) = start else {
        return String::new();
    };
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).unwrap_or(start);
    let lines = &lines[start..=end];

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.chars().skip(indent).collect()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// -- Parsing ------------------------------------------------------------------

/// Parse a payload body into an ordered key/value map.
///
/// Oversize bodies are rejected before any parsing work. Duplicate keys are
/// resolved last-wins and reported through `PayloadMap::duplicates` so the
/// validator can warn without failing the record.
pub fn parse_payload(body: &str, max_bytes: usize) -> Result<PayloadMap, ParseFailure> {
    if body.len() > max_bytes {
        return Err(ParseFailure {
            line: None,
            message: format!("payload is {} bytes, limit is {max_bytes}", body.len()),
        });
    }
    let mut parser = Parser {
        lines: body.lines().collect(),
        pos: 0,
    };
    let root_indent = parser.peek_content().map_or(0, |(indent, _)| indent);
    let map = parser.parse_map(root_indent)?;
    if let Some((_, _)) = parser.peek_content() {
        return Err(fail_at(parser.pos + 1, "unexpected indentation"));
    }
    Ok(map)
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

fn fail_at(line: usize, message: &str) -> ParseFailure {
    ParseFailure {
        line: Some(line),
        message: message.to_string(),
    }
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

impl<'a> Parser<'a> {
    /// Next content line (skipping blanks and `#` comments) without
    /// consuming it.
    fn peek_content(&self) -> Option<(usize, &'a str)> {
        self.lines[self.pos..].iter().find_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                None
            } else {
                Some((indent_width(line), trimmed))
            }
        })
    }

    fn parse_map(&mut self, indent: usize) -> Result<PayloadMap, ParseFailure> {
        let mut map = PayloadMap::default();
        while let Some(line) = self.lines.get(self.pos).copied() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos += 1;
                continue;
            }
            let ind = indent_width(line);
            if ind < indent {
                break;
            }
            let number = self.pos + 1;
            if ind > indent {
                return Err(fail_at(number, "unexpected indentation"));
            }
            let Some(colon) = trimmed.find(':') else {
                return Err(fail_at(number, "expected `key: value`"));
            };
            let key = trimmed[..colon].trim_end();
            if key.is_empty() {
                return Err(fail_at(number, "empty key"));
            }
            let rest = trimmed[colon + 1..].trim();
            self.pos += 1;

            let value = if rest == "|" {
                Value::Scalar(self.block_scalar(indent))
            } else if rest.is_empty() {
                match self.peek_content() {
                    Some((child, text)) if child > indent => {
                        if text == "-" || text.starts_with("- ") {
                            Value::List(self.list_items(child)?)
                        } else {
                            let nested = self.parse_map(child)?;
                            for dup in nested.duplicates {
                                map.duplicates.push(format!("{key}.{dup}"));
                            }
                            Value::Map(nested.entries)
                        }
                    }
                    _ => Value::Scalar(String::new()),
                }
            } else {
                Value::Scalar(unquote(rest, number)?)
            };
            insert(&mut map, key, value);
        }
        Ok(map)
    }

    /// Collect a `key: |` block: every following line deeper than the key,
    /// blanks included, with the common block indent removed.
    fn block_scalar(&mut self, key_indent: usize) -> String {
        let mut collected: Vec<&str> = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            if line.trim().is_empty() || indent_width(line) > key_indent {
                collected.push(line);
                self.pos += 1;
            } else {
                break;
            }
        }
        while collected.last().is_some_and(|l| l.trim().is_empty()) {
            collected.pop();
        }
        let owned: Vec<String> = collected.iter().map(|l| l.to_string()).collect();
        dedent(&owned)
    }

    fn list_items(&mut self, item_indent: usize) -> Result<Vec<Value>, ParseFailure> {
        let mut items = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos += 1;
                continue;
            }
            let ind = indent_width(line);
            if ind < item_indent {
                break;
            }
            let number = self.pos + 1;
            if ind > item_indent {
                return Err(fail_at(number, "unexpected indentation"));
            }
            let Some(rest) = trimmed.strip_prefix('-') else {
                break;
            };
            items.push(Value::Scalar(unquote(rest.trim(), number)?));
            self.pos += 1;
        }
        Ok(items)
    }
}

fn insert(map: &mut PayloadMap, key: &str, value: Value) {
    match map.entries.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => {
            slot.1 = value;
            if !map.duplicates.iter().any(|d| d == key) {
                map.duplicates.push(key.to_string());
            }
        }
        None => map.entries.push((key.to_string(), value)),
    }
}

fn unquote(scalar: &str, number: usize) -> Result<String, ParseFailure> {
    let Some(rest) = scalar.strip_prefix('"') else {
        return Ok(scalar.to_string());
    };
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if chars.as_str().trim().is_empty() {
                    return Ok(out);
                }
                return Err(fail_at(number, "trailing content after closing quote"));
            }
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                _ => return Err(fail_at(number, "unsupported escape sequence")),
            },
            c => out.push(c),
        }
    }
    Err(fail_at(number, "unterminated quoted scalar"))
}

// -- Serialization ------------------------------------------------------------

/// Render a canonical payload back to payload text. Parsing the result
/// reproduces the payload, canonical keys first.
pub fn serialize_payload(payload: &CanonicalPayload) -> String {
    let mut out = String::new();
    scalar_line(&mut out, 0, "format", &payload.format);
    scalar_line(&mut out, 0, "purpose", &payload.purpose);
    scalar_line(&mut out, 0, "user", &payload.user);
    if let Some(profile) = &payload.profile {
        scalar_line(&mut out, 0, "profile", profile);
    }
    string_list(&mut out, "skills", payload.skills.as_deref());
    string_list(&mut out, "restrictions", payload.restrictions.as_deref());
    string_list(&mut out, "tags", payload.tags.as_deref());
    for (key, value) in &payload.extra {
        write_value(&mut out, 0, key, value);
    }
    out
}

fn string_list(out: &mut String, key: &str, items: Option<&[String]>) {
    if let Some(items) = items {
        out.push_str(key);
        out.push_str(":\n");
        for item in items {
            out.push_str("  - ");
            out.push_str(&quote_scalar(item));
            out.push('\n');
        }
    }
}

fn write_value(out: &mut String, indent: usize, key: &str, value: &Value) {
    let pad = " ".repeat(indent);
    match value {
        Value::Scalar(s) => scalar_line(out, indent, key, s),
        Value::List(items) => {
            out.push_str(&format!("{pad}{key}:\n"));
            for item in items {
                if let Value::Scalar(s) = item {
                    out.push_str(&format!("{pad}  - {}\n", quote_scalar(s)));
                }
            }
        }
        Value::Map(entries) => {
            out.push_str(&format!("{pad}{key}:\n"));
            for (k, v) in entries {
                write_value(out, indent + 2, k, v);
            }
        }
    }
}

fn scalar_line(out: &mut String, indent: usize, key: &str, value: &str) {
    let pad = " ".repeat(indent);
    if value.contains('\n') {
        out.push_str(&format!("{pad}{key}: |\n"));
        for line in value.lines() {
            out.push_str(&format!("{pad}  {line}\n"));
        }
    } else {
        out.push_str(&format!("{pad}{key}: {}\n", quote_scalar(value)));
    }
}

fn quote_scalar(s: &str) -> String {
    let plain = !s.is_empty()
        && s == s.trim()
        && !s.contains([':', '#', '"', '\\'])
        && !s.starts_with(['-', '|']);
    if plain {
        return s.to_string();
    }
    let mut quoted = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
