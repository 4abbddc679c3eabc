//! JSON path selection over documents.
//!
//! ApiSchema paths use a small JSONPath dialect: a `$` root followed by
//! `.name` property steps, `[*]` array fan-out and `[n]` indexes. Validation
//! errors arrive as JSON Pointers, so this module also converts pointers to
//! paths and removes values addressed by a pointer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSONPath expression such as `$.classPeriods[*].classPeriodReference.schoolId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPath(String);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Property(String),
    Wildcard,
    Index(usize),
}

impl JsonPath {
    pub fn new(path: impl Into<String>) -> Self {
        JsonPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the final property step, e.g. `schoolId` for `$.schoolReference.schoolId`.
    pub fn last_property_name(&self) -> Option<String> {
        self.segments().into_iter().rev().find_map(|s| match s {
            Segment::Property(name) => Some(name),
            _ => None,
        })
    }

    fn segments(&self) -> Vec<Segment> {
        let body = self.0.strip_prefix('$').unwrap_or(&self.0);
        let mut segments = Vec::new();
        let mut chars = body.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '[' {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if !name.is_empty() {
                        segments.push(Segment::Property(name));
                    }
                }
                '[' => {
                    let mut inner = String::new();
                    for next in chars.by_ref() {
                        if next == ']' {
                            break;
                        }
                        inner.push(next);
                    }
                    let inner = inner.trim();
                    if inner == "*" {
                        segments.push(Segment::Wildcard);
                    } else if let Ok(index) = inner.parse::<usize>() {
                        segments.push(Segment::Index(index));
                    } else {
                        let name = inner.trim_matches(|q| q == '\'' || q == '"');
                        segments.push(Segment::Property(name.to_string()));
                    }
                }
                _ => {}
            }
        }
        segments
    }

    /// Every value reachable by this path, in document order.
    pub fn select<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        self.select_with_paths(document)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Every value reachable by this path together with its concrete path,
    /// e.g. `$.gradeLevels[1].gradeLevelDescriptor`.
    pub fn select_with_paths<'a>(&self, document: &'a Value) -> Vec<(String, &'a Value)> {
        let mut current = vec![(String::from("$"), document)];
        for segment in self.segments() {
            let mut next = Vec::new();
            for (path, value) in current {
                match (&segment, value) {
                    (Segment::Property(name), Value::Object(map)) => {
                        if let Some(child) = map.get(name) {
                            next.push((format!("{}.{}", path, name), child));
                        }
                    }
                    (Segment::Wildcard, Value::Array(items)) => {
                        for (i, child) in items.iter().enumerate() {
                            next.push((format!("{}[{}]", path, i), child));
                        }
                    }
                    (Segment::Index(i), Value::Array(items)) => {
                        if let Some(child) = items.get(*i) {
                            next.push((format!("{}[{}]", path, i), child));
                        }
                    }
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// The first value reachable by this path.
    pub fn select_first<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.select(document).into_iter().next()
    }

    /// Apply `f` to every value reachable by this path.
    pub fn for_each_mut(&self, document: &mut Value, f: &mut dyn FnMut(&mut Value)) {
        visit_mut(&self.segments(), document, f);
    }
}

fn visit_mut(segments: &[Segment], value: &mut Value, f: &mut dyn FnMut(&mut Value)) {
    let Some((head, rest)) = segments.split_first() else {
        f(value);
        return;
    };
    match (head, value) {
        (Segment::Property(name), Value::Object(map)) => {
            if let Some(child) = map.get_mut(name) {
                visit_mut(rest, child, f);
            }
        }
        (Segment::Wildcard, Value::Array(items)) => {
            for child in items.iter_mut() {
                visit_mut(rest, child, f);
            }
        }
        (Segment::Index(i), Value::Array(items)) => {
            if let Some(child) = items.get_mut(*i) {
                visit_mut(rest, child, f);
            }
        }
        _ => {}
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JsonPath {
    fn from(s: &str) -> Self {
        JsonPath(s.to_string())
    }
}

impl From<String> for JsonPath {
    fn from(s: String) -> Self {
        JsonPath(s)
    }
}

/// Split a JSON Pointer into unescaped reference tokens (`~1` = `/`, `~0` = `~`).
pub fn pointer_tokens(pointer: &str) -> Vec<String> {
    let path = pointer.trim_start_matches('#');
    if path.is_empty() {
        return Vec::new();
    }
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Render a JSON Pointer as a JSON path: `/classPeriods/0/schoolId` becomes
/// `$.classPeriods[0].schoolId`.
pub fn pointer_to_json_path(pointer: &str) -> String {
    let mut path = String::from("$");
    for token in pointer_tokens(pointer) {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            path.push('[');
            path.push_str(&token);
            path.push(']');
        } else {
            path.push('.');
            path.push_str(&token);
        }
    }
    path
}

/// Escape a property name for use as a JSON Pointer token.
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Pointer of the container holding the value at `pointer`, with the last
/// token. `None` for the root.
pub fn split_pointer(pointer: &str) -> Option<(String, String)> {
    let mut tokens = pointer_tokens(pointer);
    let last = tokens.pop()?;
    let parent = tokens
        .iter()
        .map(|t| format!("/{}", escape_pointer_token(t)))
        .collect();
    Some((parent, last))
}

/// Remove the value addressed by `pointer`. Returns whether anything was removed.
pub fn remove_at_pointer(document: &mut Value, pointer: &str) -> bool {
    let mut tokens = pointer_tokens(pointer);
    let Some(last) = tokens.pop() else {
        return false;
    };

    let mut parent = document;
    for token in &tokens {
        parent = match parent {
            Value::Object(map) => match map.get_mut(token) {
                Some(child) => child,
                None => return false,
            },
            Value::Array(items) => match token.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(child) => child,
                None => return false,
            },
            _ => return false,
        };
    }

    match parent {
        Value::Object(map) => map.remove(&last).is_some(),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// The value addressed by `pointer`, tolerating the `#` fragment prefix.
pub fn value_at_pointer<'a>(document: &'a Value, pointer: &str) -> Option<&'a Value> {
    let pointer = pointer.trim_start_matches('#');
    if pointer.is_empty() {
        return Some(document);
    }
    document.pointer(pointer)
}
