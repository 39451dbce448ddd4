//! JSONPath-style path evaluation over structured values.
//!
//! Supported subset: `$`, dot children (`.name`), bracket children
//! (`["name"]`, `['name']`), array indices (`[0]`), wildcards (`.*`,
//! `[*]`), and recursive descent (`..name`, `..*`). Evaluation walks the
//! value itself, never its serialization, and yields matches in document
//! order.

use serde_json::Value;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(usize),
    Wildcard,
    /// `..name`, or `..*` when no name is given.
    Descendant(Option<String>),
}

pub(crate) fn eval_path(value: &Value, expr: &str) -> Result<Vec<Value>> {
    let segments = parse(expr)?;
    let mut current: Vec<&Value> = vec![value];
    for segment in &segments {
        let mut next = Vec::new();
        for node in current {
            apply(segment, node, &mut next);
        }
        current = next;
    }
    Ok(current.into_iter().cloned().collect())
}

fn apply<'a>(segment: &Segment, node: &'a Value, out: &mut Vec<&'a Value>) {
    match segment {
        Segment::Child(name) => {
            if let Some(child) = node.as_object().and_then(|map| map.get(name)) {
                out.push(child);
            }
        }
        Segment::Index(index) => {
            if let Some(child) = node.as_array().and_then(|items| items.get(*index)) {
                out.push(child);
            }
        }
        Segment::Wildcard => match node {
            Value::Array(items) => out.extend(items.iter()),
            Value::Object(map) => out.extend(map.values()),
            _ => {}
        },
        Segment::Descendant(name) => collect_descendants(node, name.as_deref(), out),
    }
}

fn collect_descendants<'a>(node: &'a Value, name: Option<&str>, out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                if name.is_none_or(|n| n == key) {
                    out.push(child);
                }
                collect_descendants(child, name, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                if name.is_none() {
                    out.push(child);
                }
                collect_descendants(child, name, out);
            }
        }
        _ => {}
    }
}

fn parse(expr: &str) -> Result<Vec<Segment>> {
    let mut chars = expr.char_indices().peekable();
    match chars.next() {
        Some((_, '$')) => {}
        _ => return Err(err(expr, "must start with '$'")),
    }

    let mut segments = Vec::new();
    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            '.' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c == '.') {
                    chars.next();
                    if chars.peek().is_some_and(|&(_, c)| c == '*') {
                        chars.next();
                        segments.push(Segment::Descendant(None));
                    } else {
                        let name = read_identifier(&mut chars);
                        if name.is_empty() {
                            return Err(err(expr, "expected a name after '..'"));
                        }
                        segments.push(Segment::Descendant(Some(name)));
                    }
                } else if chars.peek().is_some_and(|&(_, c)| c == '*') {
                    chars.next();
                    segments.push(Segment::Wildcard);
                } else {
                    let name = read_identifier(&mut chars);
                    if name.is_empty() {
                        return Err(err(expr, "expected a name after '.'"));
                    }
                    segments.push(Segment::Child(name));
                }
            }
            '[' => {
                chars.next();
                segments.push(parse_bracket(expr, &mut chars)?);
            }
            _ => {
                return Err(err(expr, &format!("unexpected character '{ch}' at offset {pos}")));
            }
        }
    }
    Ok(segments)
}

fn parse_bracket(
    expr: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Segment> {
    let segment = match chars.peek() {
        Some(&(_, '*')) => {
            chars.next();
            Segment::Wildcard
        }
        Some(&(_, quote @ ('"' | '\''))) => {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some((_, c)) if c == quote => break,
                    Some((_, c)) => name.push(c),
                    None => return Err(err(expr, "unterminated quoted name")),
                }
            }
            Segment::Child(name)
        }
        Some(&(_, c)) if c.is_ascii_digit() => {
            let mut digits = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                chars.next();
            }
            let index = digits
                .parse::<usize>()
                .map_err(|_| err(expr, &format!("invalid array index '{digits}'")))?;
            Segment::Index(index)
        }
        Some(&(pos, c)) => {
            return Err(err(expr, &format!("unexpected character '{c}' at offset {pos}")));
        }
        None => return Err(err(expr, "unterminated '['")),
    };

    match chars.next() {
        Some((_, ']')) => Ok(segment),
        _ => Err(err(expr, "expected ']'")),
    }
}

fn read_identifier(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut name = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn err(expr: &str, reason: &str) -> QueryError {
    QueryError::Path(format!("'{expr}': {reason}"))
}
