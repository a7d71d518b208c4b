//! Workflow statuses.
//!
//! The registry is seeded with a fixed 12-status workflow. Statuses
//! cannot be deleted; the `is_closable` flag drives the `is:open` /
//! `is:closed` query shorthand and the default list filter.

use serde::{Deserialize, Serialize};

/// A workflow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: i64,
    /// Unique, matched case-insensitively.
    pub name: String,
    pub sort_order: i64,
    pub is_closable: bool,
}

/// The seeded workflow in sort order: `(name, is_closable)`.
///
/// The last four are the closable ones.
pub const DEFAULT_STATUSES: &[(&str, bool)] = &[
    ("Open", false),
    ("Specification", false),
    ("Waiting", false),
    ("Ready", false),
    ("In Progress", false),
    ("Review", false),
    ("Testing", false),
    ("Pending", false),
    ("Completed", true),
    ("Closed", true),
    ("Canceled", true),
    ("Rejected", true),
];

/// Name of the status assigned when a caller omits one.
pub const DEFAULT_STATUS_NAME: &str = "Open";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_has_twelve_statuses() {
        assert_eq!(DEFAULT_STATUSES.len(), 12);
    }

    #[test]
    fn test_exactly_last_four_are_closable() {
        let closable: Vec<&str> = DEFAULT_STATUSES
            .iter()
            .filter(|(_, c)| *c)
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(closable, ["Completed", "Closed", "Canceled", "Rejected"]);
        assert!(DEFAULT_STATUSES[..8].iter().all(|(_, c)| !c));
    }

    #[test]
    fn test_default_status_is_seeded() {
        assert!(
            DEFAULT_STATUSES
                .iter()
                .any(|(n, _)| *n == DEFAULT_STATUS_NAME)
        );
    }
}
