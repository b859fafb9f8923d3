//! Error taxonomy and parse diagnostics.
//!
//! A [`Session`](crate::session::Session) holds at most one pending
//! [`Diagnostic`] at a time; it is attached to `JqlError::QueryParse` when a
//! parse fails.

use std::fmt;

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};

/// Errors produced anywhere in the parser, printer or scan executor.
///
/// Each variant corresponds to one of the error kinds enumerated in the
/// design: `ALLOC`, `QUERY_PARSE`, `PARSE_INVALID_CODEPOINT`, `KV_CORRUPTED`,
/// `INVALID_ARGS`, `ASSERTION`. `KV_NOT_FOUND` is deliberately absent here:
/// the scan executor treats it as an internal sentinel and never surfaces it
/// to callers.
#[derive(Debug, thiserror::Error)]
pub enum JqlError {
    #[error("allocation failed: {0}")]
    Alloc(&'static str),

    #[error("query parse error\n{diagnostic}")]
    QueryParse { diagnostic: Diagnostic },

    #[error("invalid unicode codepoint in string literal")]
    InvalidCodepoint,

    #[error("kv cursor reported corrupted key (expected 8 bytes, got {found})")]
    KvCorrupted { found: usize },

    #[error("invalid arguments: {0}")]
    InvalidArgs(&'static str),

    #[error("internal assertion failed: {0}")]
    Assertion(&'static str),
}

impl JqlError {
    pub fn query_parse(diagnostic: Diagnostic) -> Self {
        JqlError::QueryParse { diagnostic }
    }
}

/// A single-shot diagnostic: the near-token snippet plus a `<---` marker at
/// the point the parser gave up.
///
/// Construction borrows nothing; the session's input buffer is copied in at
/// creation time so the diagnostic can outlive the parse that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub input: String,
    pub near_token: Option<String>,
    pub offset: usize,
    pub line: u32,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, input: &str, offset: usize, line: u32) -> Self {
        Diagnostic {
            message: message.into(),
            input: input.to_string(),
            near_token: None,
            offset: offset.min(input.len()),
            line,
        }
    }

    pub fn with_near_token(mut self, token: impl Into<String>) -> Self {
        self.near_token = Some(token.into());
        self
    }

    /// Render the annotated source excerpt used by `Display`.
    ///
    /// Uses `annotate-snippets` to point at the byte offset where parsing
    /// stopped, matching the reference implementation's `near token: '...'`
    /// plus `<--- ` marker, but rendered as a proper caret underline.
    fn rendered(&self) -> String {
        let annotation_label = self
            .near_token
            .as_deref()
            .map(|t| format!("unexpected token '{t}' here"))
            .unwrap_or_else(|| "parsing stopped here".to_string());
        let end = (self.offset + 1).min(self.input.len().max(1));
        let snippet = Snippet {
            title: Some(Annotation {
                label: Some(&self.message),
                id: None,
                annotation_type: AnnotationType::Error,
            }),
            footer: vec![],
            slices: vec![Slice {
                source: &self.input,
                line_start: self.line as usize,
                origin: None,
                fold: true,
                annotations: vec![SourceAnnotation {
                    label: &annotation_label,
                    annotation_type: AnnotationType::Error,
                    range: (self.offset, end),
                }],
            }],
            opt: FormatOptions {
                color: false,
                ..Default::default()
            },
        };
        DisplayList::from(snippet).to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered())
    }
}
