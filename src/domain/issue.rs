//! Validation findings.

use std::fmt;

use super::uid::{Prefix, Uid};

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Advisory; never affects the overall result.
    Info,
    /// Suspicious but tolerated; the tree is still valid.
    Warning,
    /// Broken traceability; the tree is invalid.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// What a finding is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// The tree as a whole.
    Tree,
    /// A document, by prefix.
    Document(Prefix),
    /// A single item.
    Item(Uid),
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// How serious the finding is, after any configured promotion.
    pub severity: Severity,
    /// What the finding is attached to.
    pub subject: Subject,
    /// Human-readable description.
    pub message: String,
}

impl Issue {
    /// Creates a finding attached to the tree.
    #[must_use]
    pub fn tree(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: Subject::Tree,
            message: message.into(),
        }
    }

    /// Creates a finding attached to a document.
    #[must_use]
    pub fn document(severity: Severity, prefix: Prefix, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: Subject::Document(prefix),
            message: message.into(),
        }
    }

    /// Creates a finding attached to an item.
    #[must_use]
    pub fn item(severity: Severity, uid: Uid, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: Subject::Item(uid),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.subject {
            Subject::Tree => write!(f, "{}: {}", self.severity, self.message),
            Subject::Document(prefix) => {
                write!(f, "{}: {}: {}", self.severity, prefix, self.message)
            }
            Subject::Item(uid) => write!(f, "{}: {}: {}", self.severity, uid, self.message),
        }
    }
}
