//! Validation reports
//!
//! Every check result is data: invalid chains and broken links show up as
//! issues on the node they concern, never as errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::registry::entity::{EntityKind, EntityStatus};
use crate::validation::reporter::LinkageMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// The chain failed hash, link or work checks from block 1 onwards
    InvalidChain { fault: String },
    /// Block 0 does not match its own hash or difficulty
    GenesisUnverified { fault: String },
    /// Genesis does not point at the expected parent hash
    InvalidLinkage { expected: String, found: String },
    /// The recorded anchor no longer appears anywhere in the parent chain
    AnchorNotInParent { anchor: String },
    ParentMissing { parent_id: String },
    EmptyChain,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChain { fault } => write!(f, "chain invalid: {}", fault),
            Self::GenesisUnverified { fault } => write!(f, "genesis invalid: {}", fault),
            Self::InvalidLinkage { expected, found } => write!(
                f,
                "genesis links to {} but parent hash is {}",
                found, expected
            ),
            Self::AnchorNotInParent { anchor } => {
                write!(f, "anchor {} not present in parent chain", anchor)
            }
            Self::ParentMissing { parent_id } => write!(f, "parent {} not found", parent_id),
            Self::EmptyChain => f.write_str("chain has no blocks"),
        }
    }
}

/// Result for one entity in a hierarchy walk
#[derive(Debug, Clone, Serialize)]
pub struct ValidationNode {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub status: EntityStatus,
    pub valid: bool,
    pub chain_valid: bool,
    /// None for departments, which have no parent to link to.
    pub linkage_valid: Option<bool>,
    pub block_count: usize,
    pub attendance_blocks: usize,
    pub issues: Vec<ValidationIssue>,
    pub children: Vec<ValidationNode>,
}

impl ValidationNode {
    /// True when this node and every descendant are valid
    pub fn all_valid(&self) -> bool {
        self.valid && self.children.iter().all(ValidationNode::all_valid)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ValidationNode::node_count).sum::<usize>()
    }

    pub fn invalid_count(&self) -> usize {
        usize::from(!self.valid)
            + self
                .children
                .iter()
                .map(ValidationNode::invalid_count)
                .sum::<usize>()
    }

    /// Depth-first lookup by entity id
    pub fn find(&self, id: &str) -> Option<&ValidationNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyReport {
    pub valid: bool,
    pub linkage_mode: LinkageMode,
    pub checked_at: DateTime<Utc>,
    pub root: ValidationNode,
}

impl HierarchyReport {
    pub fn summary(&self) -> String {
        if self.valid {
            format!(
                "✅ {} '{}' is valid ({} chains)",
                self.root.kind.label(),
                self.root.name,
                self.root.node_count()
            )
        } else {
            format!(
                "❌ {} '{}' is invalid ({} of {} chains failed)",
                self.root.kind.label(),
                self.root.name,
                self.root.invalid_count(),
                self.root.node_count()
            )
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub valid: bool,
    pub linkage_mode: LinkageMode,
    pub checked_at: DateTime<Utc>,
    pub departments: Vec<ValidationNode>,
}

impl SystemReport {
    pub fn summary(&self) -> String {
        let chains: usize = self.departments.iter().map(ValidationNode::node_count).sum();
        let invalid: usize = self.departments.iter().map(ValidationNode::invalid_count).sum();
        if self.valid {
            format!(
                "✅ All {} departments are valid ({} chains)",
                self.departments.len(),
                chains
            )
        } else {
            format!(
                "❌ {} of {} chains failed across {} departments",
                invalid,
                chains,
                self.departments.len()
            )
        }
    }
}

/// Result for a single entity checked against its direct parent
#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub status: EntityStatus,
    pub valid: bool,
    pub chain_valid: bool,
    pub block_count: usize,
    pub parent_id: Option<String>,
    pub parent_chain_valid: Option<bool>,
    pub parent_hash_matches: Option<bool>,
    pub issues: Vec<ValidationIssue>,
    pub checked_at: DateTime<Utc>,
}
