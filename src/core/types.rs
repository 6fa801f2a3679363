//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ChangeId`] - Stable 16-hex-char identity of a change, carried in the
//!   `PR-UUID` commit trailer
//! - [`StackName`] - Validated stack name (single branch segment)
//! - [`Oid`] - Git object identifier (SHA)
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use cairn::core::types::{ChangeId, Oid, StackName};
//!
//! // Valid constructions
//! let id = ChangeId::new("1111111111111111").unwrap();
//! let name = StackName::new("feat-auth").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//!
//! // Invalid constructions fail at creation time
//! assert!(ChangeId::new("TOP").is_err());
//! assert!(StackName::new("a/b").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid change id: {0}")]
    InvalidChangeId(String),

    #[error("invalid stack name: {0}")]
    InvalidStackName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// The stable identity of a change: exactly 16 lowercase hex characters.
///
/// A `ChangeId` survives amends (which rewrite the commit hash) because it is
/// carried in the commit message trailer block, not derived from content.
///
/// # Example
///
/// ```
/// use cairn::core::types::ChangeId;
///
/// let id = ChangeId::new("1111111111111111").unwrap();
/// assert_eq!(id.as_str(), "1111111111111111");
///
/// // Uppercase input is normalized
/// let id = ChangeId::new("ABCDEF0123456789").unwrap();
/// assert_eq!(id.as_str(), "abcdef0123456789");
///
/// // Wrong length or non-hex is rejected
/// assert!(ChangeId::new("abc").is_err());
/// assert!(ChangeId::new("zzzzzzzzzzzzzzzz").is_err());
///
/// // Freshly generated ids are always valid
/// let generated = ChangeId::generate();
/// assert!(ChangeId::new(generated.as_str()).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangeId(String);

/// Length of a change id in hex characters.
pub const CHANGE_ID_LEN: usize = 16;

impl ChangeId {
    /// Create a new validated change id.
    ///
    /// The id is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidChangeId` if the string is not exactly
    /// 16 hex characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into().to_ascii_lowercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random change id.
    ///
    /// Sixteen hex characters of a v4 UUID. The collision probability over
    /// the lifetime of a repository is treated as negligible.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(raw[..CHANGE_ID_LEN].to_string())
    }

    /// Check whether a string has the shape of a change id.
    pub fn is_valid(id: &str) -> bool {
        id.len() == CHANGE_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        if id.len() != CHANGE_ID_LEN {
            return Err(TypeError::InvalidChangeId(format!(
                "expected {} hex characters, got {}",
                CHANGE_ID_LEN,
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidChangeId(
                "change id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the change id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChangeId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ChangeId> for String {
    fn from(id: ChangeId) -> Self {
        id.0
    }
}

impl AsRef<str> for ChangeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated stack name.
///
/// Stack names appear as a single segment inside branch names
/// (`<user>/stack-<name>/TOP`), as directory names under the store root,
/// and as the value of the `PR-Stack` trailer. They must therefore be:
///
/// - Non-empty
/// - Free of `/`, whitespace, and ASCII control characters
/// - Free of Git's forbidden refname characters
/// - Not starting with `.` or `-`, not ending with `.lock` or `.`
/// - Free of `..` and `@{`
///
/// # Example
///
/// ```
/// use cairn::core::types::StackName;
///
/// assert!(StackName::new("feat-auth").is_ok());
/// assert!(StackName::new("release.2").is_ok());
///
/// assert!(StackName::new("").is_err());
/// assert!(StackName::new("a/b").is_err());
/// assert!(StackName::new(".hidden").is_err());
/// assert!(StackName::new("bad..name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackName(String);

impl StackName {
    /// Create a new validated stack name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidStackName` if the name violates the rules
    /// above.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidStackName(
                "stack name cannot be empty".into(),
            ));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(TypeError::InvalidStackName(
                "stack name cannot start with '.' or '-'".into(),
            ));
        }
        if name.ends_with('.') || name.ends_with(".lock") {
            return Err(TypeError::InvalidStackName(
                "stack name cannot end with '.' or '.lock'".into(),
            ));
        }
        if name.contains("..") || name.contains("@{") {
            return Err(TypeError::InvalidStackName(
                "stack name cannot contain '..' or '@{'".into(),
            ));
        }
        const INVALID_CHARS: [char; 10] = ['/', ' ', '~', '^', ':', '\\', '?', '*', '[', '\t'];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidStackName(format!(
                    "stack name cannot contain '{c}'"
                )));
            }
        }
        for c in name.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidStackName(
                    "stack name cannot contain control characters".into(),
                ));
            }
        }
        Ok(())
    }

    /// Get the stack name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StackName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<StackName> for String {
    fn from(name: StackName) -> Self {
        name.0
    }
}

impl AsRef<str> for StackName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StackName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use cairn::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters, or the full OID if `len` exceeds
    /// its length.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
