// Access control module
// Department enumeration and the permission filter applied to retrieved passages

#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ChatError;

/// Path segment that marks a document as visible to every department.
pub const BROADCAST_SEGMENT: &str = "general";

/// The closed set of departments recognized by both ingestion tagging and
/// query-time filtering. Anything outside this set is a configuration error,
/// never a silent pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Engineering,
    Finance,
    Hr,
    Marketing,
    Sales,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Engineering,
        Department::Finance,
        Department::Hr,
        Department::Marketing,
        Department::Sales,
    ];

    /// Lowercase name as it appears in corpus paths and config files.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Engineering => "engineering",
            Department::Finance => "finance",
            Department::Hr => "hr",
            Department::Marketing => "marketing",
            Department::Sales => "sales",
        }
    }
}

impl fmt::Display for Department {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = ChatError;

    #[inline]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();

        Department::ALL
            .into_iter()
            .find(|dept| trimmed.eq_ignore_ascii_case(dept.as_str()))
            .ok_or_else(|| {
                ChatError::Config(format!(
                    "Unknown department '{}' (expected one of: {})",
                    trimmed,
                    Department::ALL.map(|d| d.as_str()).join(", ")
                ))
            })
    }
}

/// Department marking carried by every indexed passage. A tagged variant
/// rather than a bare string, so broadcast visibility is explicit and never
/// conflated with a department named "general".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartmentTag {
    /// Visible to exactly one department.
    Single(Department),
    /// Visible to all departments (derived from a "general" path segment).
    Broadcast,
}

impl DepartmentTag {
    /// Map a corpus path segment onto a tag. `general` becomes the broadcast
    /// tag; a recognized department name becomes a single-department tag;
    /// anything else is unrecognized.
    #[inline]
    pub fn from_path_segment(segment: &str) -> Option<DepartmentTag> {
        if segment.eq_ignore_ascii_case(BROADCAST_SEGMENT) {
            return Some(DepartmentTag::Broadcast);
        }

        Department::from_str(segment).ok().map(DepartmentTag::Single)
    }
}

impl fmt::Display for DepartmentTag {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartmentTag::Single(dept) => write!(f, "{}", dept),
            DepartmentTag::Broadcast => f.write_str(BROADCAST_SEGMENT),
        }
    }
}

/// Decide whether a passage tagged `tag` may be shown to `requester`.
///
/// The structured metadata tag is the only input consulted. A department
/// name appearing as a substring of the source path is not an access
/// signal; see [`path_grant_hint`].
#[inline]
pub fn is_visible(requester: Department, tag: &DepartmentTag) -> bool {
    match tag {
        DepartmentTag::Broadcast => true,
        DepartmentTag::Single(dept) => *dept == requester,
    }
}

/// Log when the legacy path-substring heuristic would have granted access
/// that the metadata tag denies. Diagnostic only; never affects visibility.
#[inline]
pub fn path_grant_hint(requester: Department, tag: &DepartmentTag, source: &str) {
    if is_visible(requester, tag) {
        return;
    }

    let source_lower = source.to_lowercase();
    if source_lower.contains(requester.as_str()) || source_lower.contains(BROADCAST_SEGMENT) {
        debug!(
            "Source path '{}' mentions '{}' or '{}' but metadata tag '{}' denies access; \
             path text is not an access signal",
            source, requester, BROADCAST_SEGMENT, tag
        );
    }
}
