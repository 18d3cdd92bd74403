//! Parsing raw record payloads into a queryable graph.
//!
//! The cache stores whatever the store's detail query returned. A
//! [`GraphParser`] turns that text into a [`TripleGraph`] the decoder can ask
//! for `(subject, predicate) -> values`. [`NTriplesParser`] handles the
//! N-Triples output of a `construct` query.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DecodeError;

static TRIPLE_RE: OnceLock<Regex> = OnceLock::new();
static LITERAL_RE: OnceLock<Regex> = OnceLock::new();

fn triple_re() -> &'static Regex {
    TRIPLE_RE.get_or_init(|| {
        Regex::new(r"^(<[^>]*>|_:\S+)\s+<([^>]*)>\s+(.+?)\s*\.\s*$")
            .expect("triple pattern is valid")
    })
}

fn literal_re() -> &'static Regex {
    LITERAL_RE.get_or_init(|| {
        Regex::new(r#"^"((?:[^"\\]|\\.)*)"(?:@[A-Za-z][A-Za-z0-9-]*|\^\^<[^>]*>)?$"#)
            .expect("literal pattern is valid")
    })
}

/// Subject/predicate → object values, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleGraph {
    objects: HashMap<(String, String), Vec<String>>,
    len: usize,
}

impl TripleGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a triple. IRIs are given without angle brackets; literals as their
    /// lexical form. Returns false if the triple was already present.
    pub fn insert(
        &mut self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> bool {
        let object = object.into();
        let values = self
            .objects
            .entry((subject.into(), predicate.into()))
            .or_default();
        if values.contains(&object) {
            return false;
        }
        values.push(object);
        self.len += 1;
        true
    }

    /// Values of `predicate` on `subject`; empty if there are none.
    #[must_use]
    pub fn objects(&self, subject: &str, predicate: &str) -> &[String] {
        self.objects
            .get(&(subject.to_string(), predicate.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of triples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no triples were parsed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Parses a serialized record payload.
pub trait GraphParser {
    /// Parses `payload` into a graph.
    ///
    /// # Errors
    /// Returns `DecodeError::MalformedGraph` if the payload is not valid in
    /// the parser's syntax.
    fn parse(&self, payload: &str) -> Result<TripleGraph, DecodeError>;
}

/// Line-based N-Triples parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NTriplesParser;

impl GraphParser for NTriplesParser {
    fn parse(&self, payload: &str) -> Result<TripleGraph, DecodeError> {
        let mut graph = TripleGraph::new();

        for (index, raw) in payload.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = |reason: &str| DecodeError::MalformedGraph {
                line: index + 1,
                reason: reason.to_string(),
            };

            let caps = triple_re()
                .captures(line)
                .ok_or_else(|| malformed("expected '<subject> <predicate> object .'"))?;

            let subject = strip_iri(&caps[1]);
            let predicate = caps[2].to_string();
            let object = parse_object(&caps[3]).ok_or_else(|| malformed("invalid object term"))?;

            graph.insert(subject, predicate, object);
        }

        Ok(graph)
    }
}

fn strip_iri(term: &str) -> String {
    term.strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(term)
        .to_string()
}

fn parse_object(term: &str) -> Option<String> {
    if term.starts_with('<') && term.ends_with('>') {
        return Some(strip_iri(term));
    }
    if term.starts_with("_:") {
        return Some(term.to_string());
    }
    let caps = literal_re().captures(term)?;
    unescape(&caps[1])
}

/// Resolves N-Triples string escapes.
fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\u{c}'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            'u' => out.push(hex_char(&mut chars, 4)?),
            'U' => out.push(hex_char(&mut chars, 8)?),
            _ => return None,
        }
    }

    Some(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}
