//! core::branch
//!
//! Branch naming scheme for stacks.
//!
//! # Shape
//!
//! Every branch derived from a stack has exactly three segments:
//!
//! ```text
//! <user>/stack-<name>/TOP      # the TOP branch holding the linear history
//! <user>/stack-<name>/<uuid>   # an ephemeral per-change editing branch
//! ```
//!
//! `<user>` and `<name>` are single segments; `<uuid>` is exactly 16 hex
//! characters. The leaf `TOP` is reserved and can never collide with a
//! change id (ids are hex-only).
//!
//! These functions never touch I/O and are the only source of branch-name
//! semantics in the codebase.

use crate::core::types::ChangeId;

/// Reserved leaf segment of the stack's linear-history branch.
pub const TOP_SEGMENT: &str = "TOP";

/// Prefix of the middle segment.
const STACK_PREFIX: &str = "stack-";

/// Decomposed stack-derived branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchParts<'a> {
    /// Username segment
    pub user: &'a str,
    /// Stack name (without the `stack-` prefix)
    pub stack: &'a str,
    /// Leaf segment: `TOP` or a 16-hex change id
    pub leaf: &'a str,
}

/// Format the TOP branch name for a stack.
///
/// # Example
///
/// ```
/// use cairn::core::branch::stack_branch;
///
/// assert_eq!(stack_branch("alice", "feat-auth"), "alice/stack-feat-auth/TOP");
/// ```
pub fn stack_branch(user: &str, stack: &str) -> String {
    format!("{user}/{STACK_PREFIX}{stack}/{TOP_SEGMENT}")
}

/// Format the ephemeral per-change branch name for a stack.
///
/// # Example
///
/// ```
/// use cairn::core::branch::uuid_branch;
/// use cairn::core::types::ChangeId;
///
/// let id = ChangeId::new("1111111111111111").unwrap();
/// assert_eq!(
///     uuid_branch("alice", "feat-auth", &id),
///     "alice/stack-feat-auth/1111111111111111"
/// );
/// ```
pub fn uuid_branch(user: &str, stack: &str, uuid: &ChangeId) -> String {
    format!("{user}/{STACK_PREFIX}{stack}/{}", uuid.as_str())
}

/// Decompose a branch name into stack parts, if it has the stack shape.
///
/// Returns `None` for branches that are not derived from a stack. The leaf
/// is not interpreted here; use [`is_stack_branch`] / [`is_uuid_branch`]
/// for that.
pub fn parse_branch(name: &str) -> Option<BranchParts<'_>> {
    let mut segments = name.split('/');
    let user = segments.next()?;
    let middle = segments.next()?;
    let leaf = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    if user.is_empty() || leaf.is_empty() {
        return None;
    }
    let stack = middle.strip_prefix(STACK_PREFIX)?;
    if stack.is_empty() {
        return None;
    }
    Some(BranchParts { user, stack, leaf })
}

/// Check whether a branch name is a stack's TOP branch.
///
/// # Example
///
/// ```
/// use cairn::core::branch::is_stack_branch;
///
/// assert!(is_stack_branch("alice/stack-feat-auth/TOP"));
/// assert!(!is_stack_branch("alice/stack-feat-auth/1111111111111111"));
/// assert!(!is_stack_branch("main"));
/// ```
pub fn is_stack_branch(name: &str) -> bool {
    matches!(parse_branch(name), Some(parts) if parts.leaf == TOP_SEGMENT)
}

/// Check whether a branch name is an ephemeral per-change branch.
///
/// True iff the leaf is exactly 16 lowercase hex characters.
///
/// # Example
///
/// ```
/// use cairn::core::branch::is_uuid_branch;
///
/// assert!(is_uuid_branch("alice/stack-feat-auth/1111111111111111"));
/// assert!(!is_uuid_branch("alice/stack-feat-auth/TOP"));
/// assert!(!is_uuid_branch("alice/stack-feat-auth/123"));
/// ```
pub fn is_uuid_branch(name: &str) -> bool {
    matches!(parse_branch(name), Some(parts) if ChangeId::is_valid(parts.leaf))
}

/// Extract the stack name from a stack-derived branch (TOP or per-change).
///
/// # Example
///
/// ```
/// use cairn::core::branch::extract_stack_name;
///
/// assert_eq!(extract_stack_name("alice/stack-feat-auth/TOP"), Some("feat-auth"));
/// assert_eq!(
///     extract_stack_name("alice/stack-feat-auth/1111111111111111"),
///     Some("feat-auth")
/// );
/// assert_eq!(extract_stack_name("main"), None);
/// ```
pub fn extract_stack_name(name: &str) -> Option<&str> {
    let parts = parse_branch(name)?;
    if parts.leaf == TOP_SEGMENT || ChangeId::is_valid(parts.leaf) {
        Some(parts.stack)
    } else {
        None
    }
}

/// Extract the change id from a per-change branch.
///
/// # Example
///
/// ```
/// use cairn::core::branch::extract_uuid;
///
/// let id = extract_uuid("alice/stack-feat-auth/1111111111111111").unwrap();
/// assert_eq!(id.as_str(), "1111111111111111");
/// assert!(extract_uuid("alice/stack-feat-auth/TOP").is_none());
/// ```
pub fn extract_uuid(name: &str) -> Option<ChangeId> {
    let parts = parse_branch(name)?;
    if ChangeId::is_valid(parts.leaf) {
        ChangeId::new(parts.leaf).ok()
    } else {
        None
    }
}

/// Extract the username from a stack-derived branch.
pub fn extract_user(name: &str) -> Option<&str> {
    let parts = parse_branch(name)?;
    if parts.leaf == TOP_SEGMENT || ChangeId::is_valid(parts.leaf) {
        Some(parts.user)
    } else {
        None
    }
}
