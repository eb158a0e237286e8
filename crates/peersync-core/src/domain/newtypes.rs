//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers and values shared between the
//! signaling, transfer, and sync crates. Each newtype ensures validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a durable sync relationship (one local folder, one peer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(Uuid);

impl ConfigId {
    /// Create a new random ConfigId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ConfigId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConfigId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConfigId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ConfigId: {e}")))
    }
}

/// Identifier for one transferred artifact (file body in flight)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Create a new random FileId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a FileId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid FileId: {e}")))
    }
}

/// Identifier for one sync cycle over the sync message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(Uuid);

impl SyncId {
    /// Create a new random SyncId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SyncId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SyncId: {e}")))
    }
}

// ============================================================================
// String-based ID types
// ============================================================================

/// Durable peer identity string
///
/// Cached across launches so repeated sessions do not appear as new peers
/// to the relay. Alphanumeric plus `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Create a new PeerId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidPeerId(
                "Peer id cannot be empty".to_string(),
            ));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidPeerId(format!(
                "Peer id contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Generate a fresh random peer identity
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().replace('-', ""))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for PeerId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

/// Relay session (room) identifier
///
/// Opaque short code handed out by the relay on `session-create` and typed
/// or scanned by joining peers. Alphanumeric plus `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains invalid characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidSessionId(
                "Session id cannot be empty".to_string(),
            ));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomainError::InvalidSessionId(format!(
                "Session id contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for SessionId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

// ============================================================================
// Path type
// ============================================================================

/// A validated path relative to a sync folder root
///
/// RelativePath ensures the path is:
/// - Non-empty, using `/` separators
/// - Not absolute and free of `.` / `..` components
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a new RelativePath
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is empty, absolute,
    /// or contains traversal components
    pub fn new(path: String) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Err(DomainError::InvalidPath(
                "Path cannot be empty".to_string(),
            ));
        }

        if path.starts_with('/') || path.contains('\\') {
            return Err(DomainError::InvalidPath(format!(
                "Path must be relative with '/' separators: {path}"
            )));
        }

        if path.contains("//") {
            return Err(DomainError::InvalidPath(format!(
                "Path contains empty components: {path}"
            )));
        }

        if path.split('/').any(|c| c == "." || c == "..") {
            return Err(DomainError::InvalidPath(format!(
                "Path contains traversal components: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the final path component (file name)
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Get the parent path, if any
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Replace the final component with `name`, keeping the parent
    ///
    /// # Errors
    /// Returns error if the resulting path is invalid
    pub fn with_file_name(&self, name: &str) -> Result<Self, DomainError> {
        match self.parent() {
            Some(parent) => Self::new(format!("{}/{name}", parent.as_str())),
            None => Self::new(name.to_string()),
        }
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

// ============================================================================
// Hash type
// ============================================================================

/// SHA-256 content digest in lowercase hex form
///
/// Produced by `peersync-hash` and compared for change detection and
/// transfer integrity verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Expected hex length of a SHA-256 digest (32 bytes)
    const EXPECTED_HEX_LEN: usize = 64;

    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the hash is not 64 lowercase hex characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::EXPECTED_HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash has wrong length: expected {} hex chars, got {}",
                Self::EXPECTED_HEX_LEN,
                hash.len()
            )));
        }

        if !hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not lowercase hex: {hash}"
            )));
        }

        Ok(Self(hash))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Tests
// ============================================================================
