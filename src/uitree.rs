//! UI-tree dump parsing.
//!
//! Dumps are uiautomator-style XML: nested `<node>` elements whose attributes
//! carry `text`, `class`, `bounds` and `focused`. Only those attributes are
//! read, so the parser scans node tags and tracks nesting with a stack instead
//! of building a full document model.
use crate::error::OracleError;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Screen rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Bounds {
    /// Parse `"[x1,y1][x2,y2]"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let numbers: Vec<i64> = bounds_regex()
            .captures(raw.trim())?
            .iter()
            .skip(1)
            .filter_map(|m| m.and_then(|m| m.as_str().parse().ok()))
            .collect();
        match numbers.as_slice() {
            [left, top, right, bottom] => Some(Self {
                left: *left,
                top: *top,
                right: *right,
                bottom: *bottom,
            }),
            _ => None,
        }
    }

    pub fn contains_y(&self, y: i64) -> bool {
        self.top < y && y < self.bottom
    }
}

#[derive(Debug, Clone)]
struct UiNode {
    text: String,
    bounds: Option<Bounds>,
    focused: bool,
    parent: Option<usize>,
}

/// Parsed UI-tree snapshot.
#[derive(Debug, Clone, Default)]
pub struct UiTree {
    nodes: Vec<UiNode>,
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r#"<(/?)node\b((?:\s+[^\s=/>]+\s*=\s*"[^"]*")*)\s*(/?)>"#)
            .expect("regex for ui tree node tags")
    })
}

fn attr_regex() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"([^\s=/>]+)\s*=\s*"([^"]*)""#).expect("regex for ui tree attributes")
    })
}

fn bounds_regex() -> &'static Regex {
    static BOUNDS: OnceLock<Regex> = OnceLock::new();
    BOUNDS.get_or_init(|| {
        Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").expect("regex for node bounds")
    })
}

impl UiTree {
    /// Read and parse a dump from disk.
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let xml = fs::read_to_string(path).map_err(|err| {
            OracleError::backend("ui tree", format!("read {}: {err}", path.display()))
        })?;
        Ok(Self::parse(&xml))
    }

    pub fn parse(xml: &str) -> Self {
        let mut nodes = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        for cap in tag_regex().captures_iter(xml) {
            let closing = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
            if closing {
                stack.pop();
                continue;
            }
            let attrs = parse_attributes(cap.get(2).map(|m| m.as_str()).unwrap_or_default());
            let node = UiNode {
                text: attrs.get("text").cloned().unwrap_or_default(),
                bounds: attrs.get("bounds").and_then(|raw| Bounds::parse(raw)),
                focused: attrs.get("focused").is_some_and(|value| value == "true"),
                parent: stack.last().copied(),
            };
            nodes.push(node);
            let self_closing = cap.get(3).is_some_and(|m| !m.as_str().is_empty());
            if !self_closing {
                stack.push(nodes.len() - 1);
            }
        }
        Self { nodes }
    }

    /// Non-empty node texts in document order.
    pub fn texts(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| node.text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Bounds of the focused element, if any.
    pub fn focused_bounds(&self) -> Option<Bounds> {
        self.nodes
            .iter()
            .find(|node| node.focused)
            .and_then(|node| node.bounds)
    }

    /// Bounds of the row holding the first node whose text contains a keyword.
    ///
    /// The row is the matching node's parent; a root-level match uses its own bounds.
    pub fn keyword_row_bounds(&self, keywords: &[&str]) -> Option<Bounds> {
        let node = self.nodes.iter().find(|node| {
            let text = node.text.to_lowercase();
            keywords.iter().any(|keyword| text.contains(keyword))
        })?;
        node.parent
            .and_then(|parent| self.nodes[parent].bounds)
            .or(node.bounds)
    }
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    attr_regex()
        .captures_iter(raw)
        .filter_map(|cap| {
            let key = cap.get(1)?.as_str().to_string();
            let value = unescape_xml(cap.get(2)?.as_str());
            Some((key, value))
        })
        .collect()
}

fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => out.push(ch),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
