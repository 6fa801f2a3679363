//! core::trailer
//!
//! Commit-trailer codec for stack membership.
//!
//! # Design
//!
//! A commit belongs to a stack iff its message carries an RFC-822-style
//! trailer block at the end, separated from the body by a blank line:
//!
//! ```text
//! Add login endpoint
//!
//! Wire the handler into the router.
//!
//! PR-UUID: 1111111111111111
//! PR-Stack: feat-auth
//! ```
//!
//! Two keys are recognized: `PR-UUID` (16 lowercase hex chars, the stable
//! change identity) and `PR-Stack` (the owning stack's name). Unknown keys
//! are preserved verbatim so the codec can round-trip messages that carry
//! other tooling's trailers.
//!
//! This module is pure: it never touches the repository. The engine never
//! rewrites commits itself; trailer injection happens in the commit-msg
//! hook before the commit object exists.

use crate::core::types::ChangeId;

/// Trailer key carrying the change identity.
pub const TRAILER_UUID: &str = "PR-UUID";

/// Trailer key carrying the owning stack's name.
pub const TRAILER_STACK: &str = "PR-Stack";

/// A single `Key: value` trailer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Trailer key (e.g. `PR-UUID`)
    pub key: String,
    /// Trailer value
    pub value: String,
}

impl Trailer {
    /// Construct a trailer from key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A commit message decomposed into title, body, and trailer block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMessage {
    /// First line of the message.
    pub title: String,
    /// Paragraphs between the title and the trailer block (may be empty).
    pub body: String,
    /// Trailer lines from the final paragraph (may be empty).
    pub trailers: Vec<Trailer>,
}

impl ParsedMessage {
    /// Extract the `PR-UUID` trailer as a validated change id.
    ///
    /// Returns `None` when the trailer is absent or malformed; a commit
    /// with a malformed id is treated the same as an untracked commit.
    pub fn pr_uuid(&self) -> Option<ChangeId> {
        self.trailers
            .iter()
            .find(|t| t.key == TRAILER_UUID)
            .and_then(|t| ChangeId::new(&t.value).ok())
    }

    /// Extract the `PR-Stack` trailer value.
    pub fn pr_stack(&self) -> Option<&str> {
        self.trailers
            .iter()
            .find(|t| t.key == TRAILER_STACK)
            .map(|t| t.value.as_str())
    }
}

/// Parse a commit message into title, body, and trailers.
///
/// The title is the first line. The trailer block is the final paragraph,
/// recognized only if *every* line in it has trailer shape (`Key: value`
/// with a key of letters, digits, and hyphens). Messages without a trailer
/// block parse with an empty trailer list.
///
/// # Example
///
/// ```
/// use cairn::core::trailer::parse_message;
///
/// let parsed = parse_message(
///     "Add login\n\nDetails here.\n\nPR-UUID: 1111111111111111\nPR-Stack: feat-auth\n",
/// );
/// assert_eq!(parsed.title, "Add login");
/// assert_eq!(parsed.body, "Details here.");
/// assert_eq!(parsed.pr_uuid().unwrap().as_str(), "1111111111111111");
/// assert_eq!(parsed.pr_stack(), Some("feat-auth"));
/// ```
pub fn parse_message(message: &str) -> ParsedMessage {
    let message = message.trim_end();
    if message.is_empty() {
        return ParsedMessage::default();
    }

    let (title, rest) = match message.split_once('\n') {
        Some((t, r)) => (t.to_string(), r.trim_start_matches('\n')),
        None => (message.to_string(), ""),
    };

    if rest.is_empty() {
        return ParsedMessage {
            title,
            body: String::new(),
            trailers: Vec::new(),
        };
    }

    let (body, candidate) = match rest.rfind("\n\n") {
        Some(idx) => (&rest[..idx], &rest[idx + 2..]),
        None => ("", rest),
    };

    match parse_trailer_block(candidate) {
        Some(trailers) => ParsedMessage {
            title,
            body: body.trim_end().to_string(),
            trailers,
        },
        None => ParsedMessage {
            title,
            body: rest.trim_end().to_string(),
            trailers: Vec::new(),
        },
    }
}

/// Render a commit message from title, body, and trailers.
///
/// The trailer block is preceded by a blank line, as is the body. The
/// rendered message ends with a newline.
///
/// # Example
///
/// ```
/// use cairn::core::trailer::{render_message, Trailer};
///
/// let message = render_message(
///     "Add login",
///     "Details here.",
///     &[Trailer::new("PR-UUID", "1111111111111111")],
/// );
/// assert_eq!(message, "Add login\n\nDetails here.\n\nPR-UUID: 1111111111111111\n");
/// ```
pub fn render_message(title: &str, body: &str, trailers: &[Trailer]) -> String {
    let mut out = String::from(title);
    if !body.is_empty() {
        out.push_str("\n\n");
        out.push_str(body);
    }
    if !trailers.is_empty() {
        out.push_str("\n\n");
        let mut first = true;
        for trailer in trailers {
            if !first {
                out.push('\n');
            }
            out.push_str(&trailer.key);
            out.push_str(": ");
            out.push_str(&trailer.value);
            first = false;
        }
    }
    out.push('\n');
    out
}

/// Append the stack membership trailers to an existing trailer list.
///
/// Used by the commit-msg hook: existing trailers (including other
/// tooling's) are preserved, and `PR-UUID` / `PR-Stack` are appended.
pub fn with_stack_trailers(
    mut trailers: Vec<Trailer>,
    uuid: &ChangeId,
    stack_name: &str,
) -> Vec<Trailer> {
    trailers.push(Trailer::new(TRAILER_UUID, uuid.as_str()));
    trailers.push(Trailer::new(TRAILER_STACK, stack_name));
    trailers
}

/// Parse a paragraph as a trailer block.
///
/// Returns `None` unless every line has trailer shape.
fn parse_trailer_block(paragraph: &str) -> Option<Vec<Trailer>> {
    if paragraph.is_empty() {
        return None;
    }
    let mut trailers = Vec::new();
    for line in paragraph.lines() {
        trailers.push(parse_trailer_line(line)?);
    }
    Some(trailers)
}

/// Parse a single `Key: value` line.
fn parse_trailer_line(line: &str) -> Option<Trailer> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    if !key.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(Trailer::new(key, value))
}
