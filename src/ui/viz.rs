//! ui::viz
//!
//! Pure functions for rendering the stack-visualization comment.
//!
//! # Design
//!
//! Every PR in a stack carries exactly one comment rendering the whole
//! stack as a Markdown table, with a "you are here" marker on that PR's
//! own row. The comment is identified across edits by a hidden HTML
//! marker embedding the stack name, so the upsert protocol can find it
//! again even when the cached comment id is lost.
//!
//! # Example Output
//!
//! ```markdown
//! <!-- stack-visualization: feat-auth -->
//!
//! ### Stack: feat-auth
//!
//! | | # | Change | PR | State |
//! |---|---|--------|----|-------|
//! | | 1 | Add login | [#101](https://github.com/acme/api/pull/101) | merged |
//! | 👉 | 2 | Add logout | [#102](https://github.com/acme/api/pull/102) | open |
//! | | 3 | Add sessions | — | — |
//! ```

use crate::core::model::PrState;

/// Marker prefix identifying a visualization comment.
const MARKER_PREFIX: &str = "<!-- stack-visualization: ";

/// Marker suffix.
const MARKER_SUFFIX: &str = " -->";

/// Indicator placed on the hosting PR's own row.
const CURRENT_INDICATOR: &str = "👉";

/// One row of the visualization table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VizRow {
    /// 1-indexed position within the full history
    pub position: u32,
    /// Change title
    pub title: String,
    /// PR number, if the change has been pushed
    pub pr_number: Option<u64>,
    /// PR web URL, if known
    pub url: Option<String>,
    /// Last known PR state
    pub state: Option<PrState>,
}

/// Build the hidden marker for a stack.
///
/// # Example
///
/// ```
/// use cairn::ui::viz::marker;
///
/// assert_eq!(marker("feat-auth"), "<!-- stack-visualization: feat-auth -->");
/// ```
pub fn marker(stack_name: &str) -> String {
    format!("{MARKER_PREFIX}{stack_name}{MARKER_SUFFIX}")
}

/// Whether a comment body carries the marker for a stack.
pub fn contains_marker(body: &str, stack_name: &str) -> bool {
    body.contains(&marker(stack_name))
}

/// Render the visualization comment hosted on `current_pr`.
///
/// Every row renders the same table; only the "you are here" indicator
/// differs between the comments on different PRs of the same stack.
pub fn render_comment(stack_name: &str, rows: &[VizRow], current_pr: u64) -> String {
    let mut lines = vec![
        marker(stack_name),
        String::new(),
        format!("### Stack: {stack_name}"),
        String::new(),
        "| | # | Change | PR | State |".to_string(),
        "|---|---|--------|----|-------|".to_string(),
    ];

    for row in rows {
        let indicator = if row.pr_number == Some(current_pr) {
            CURRENT_INDICATOR
        } else {
            ""
        };
        let pr_cell = match (row.pr_number, &row.url) {
            (Some(number), Some(url)) => format!("[#{number}]({url})"),
            (Some(number), None) => format!("#{number}"),
            (None, _) => "—".to_string(),
        };
        let state_cell = match row.state {
            Some(state) => state.to_string(),
            None => "—".to_string(),
        };
        lines.push(format!(
            "| {indicator} | {} | {} | {pr_cell} | {state_cell} |",
            row.position, row.title
        ));
    }

    lines.join("\n")
}
