//! Hierarchy Validation
//!
//! Walks department → class → student chains, checking each chain and the
//! link from each child genesis to its parent. The walk reads the store
//! entity by entity; it is not an atomic snapshot.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::chain::Blockchain;
use crate::database::models::EntityRecord;
use crate::database::ChainStore;
use crate::error::{LedgerError, Result};
use crate::registry::entity::EntityKind;
use crate::validation::report::{
    EntityReport, HierarchyReport, SystemReport, ValidationIssue, ValidationNode,
};

/// How a child genesis is matched against its parent chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageMode {
    /// Genesis `prev_hash` equals the parent hash recorded at creation and
    /// that hash is still present in the parent chain.
    #[default]
    CapturedAtCreation,
    /// Genesis `prev_hash` equals the parent's current latest hash. Any
    /// append to the parent after the child was created breaks the link.
    CurrentLatest,
}

impl LinkageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapturedAtCreation => "captured_at_creation",
            Self::CurrentLatest => "current_latest",
        }
    }
}

impl fmt::Display for LinkageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkageMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "captured_at_creation" | "captured" => Ok(Self::CapturedAtCreation),
            "current_latest" | "latest" => Ok(Self::CurrentLatest),
            other => Err(LedgerError::ConfigError(format!(
                "unknown linkage mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub linkage: LinkageMode,
    /// Also check hash and work of block 0, which `is_valid` skips.
    pub verify_genesis: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            linkage: LinkageMode::CapturedAtCreation,
            verify_genesis: true,
        }
    }
}

/// Own-chain assessment of one entity
struct ChainCheck {
    chain: Blockchain,
    valid: bool,
    issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone)]
pub struct ValidationReporter<S: ChainStore> {
    store: S,
    policy: ValidationPolicy,
}

impl<S: ChainStore> ValidationReporter<S> {
    pub fn new(store: S, policy: ValidationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn validate_chain(&self, chain: &Blockchain) -> bool {
        chain.is_valid()
    }

    /// Validate a department and everything beneath it
    pub async fn validate_hierarchy(&self, department_id: &str) -> Result<HierarchyReport> {
        let department = self.load(department_id, EntityKind::Department).await?;
        let root = self.department_node(department).await?;
        let valid = root.all_valid();

        if valid {
            info!("Hierarchy of department {} is valid", department_id);
        } else {
            warn!(
                "Hierarchy of department {} is invalid ({} of {} chains failed)",
                department_id,
                root.invalid_count(),
                root.node_count()
            );
        }

        Ok(HierarchyReport {
            valid,
            linkage_mode: self.policy.linkage,
            checked_at: Utc::now(),
            root,
        })
    }

    /// Validate one entity's chain, its parent's chain and the link between them
    pub async fn validate_entity(&self, entity_id: &str) -> Result<EntityReport> {
        let record = self
            .store
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| LedgerError::entity_not_found(entity_id))?;

        let own = self.check_chain(&record);
        let mut issues = own.issues;
        let mut parent_chain_valid = None;
        let mut parent_hash_matches = None;

        if let Some(parent_id) = &record.parent_id {
            match self.store.get_entity(parent_id).await? {
                Some(parent) => {
                    let parent_check = self.check_chain(&parent);
                    let (linked, issue) = self.check_linkage(&record, &parent_check.chain);
                    parent_chain_valid = Some(parent_check.valid);
                    parent_hash_matches = Some(linked);
                    issues.extend(issue);
                }
                None => {
                    parent_chain_valid = Some(false);
                    parent_hash_matches = Some(false);
                    issues.push(ValidationIssue::ParentMissing {
                        parent_id: parent_id.clone(),
                    });
                }
            }
        }

        let valid = own.valid
            && parent_chain_valid.unwrap_or(true)
            && parent_hash_matches.unwrap_or(true);
        if !valid {
            warn!(
                "{} {} failed validation: {}",
                record.kind.label(),
                record.id,
                describe(&issues)
            );
        }

        Ok(EntityReport {
            id: record.id,
            kind: record.kind,
            name: record.name,
            status: record.status,
            valid,
            chain_valid: own.valid,
            block_count: own.chain.len(),
            parent_id: record.parent_id,
            parent_chain_valid,
            parent_hash_matches,
            issues,
            checked_at: Utc::now(),
        })
    }

    /// Validate every department hierarchy in the store
    pub async fn validate_all(&self) -> Result<SystemReport> {
        let mut departments = Vec::new();
        for department in self.store.list(EntityKind::Department).await? {
            departments.push(self.department_node(department).await?);
        }

        let valid = departments.iter().all(ValidationNode::all_valid);
        if valid {
            info!("All {} department hierarchies are valid", departments.len());
        } else {
            warn!("System validation found invalid chains");
        }

        Ok(SystemReport {
            valid,
            linkage_mode: self.policy.linkage,
            checked_at: Utc::now(),
            departments,
        })
    }

    async fn department_node(&self, department: EntityRecord) -> Result<ValidationNode> {
        let classes = self.store.children(&department.id).await?;
        let dept_check = self.check_chain(&department);

        let mut class_nodes = Vec::with_capacity(classes.len());
        for class in classes {
            let students = self.store.children(&class.id).await?;
            let class_check = self.check_chain(&class);
            let (class_linked, class_issue) = self.check_linkage(&class, &dept_check.chain);

            let student_nodes = students
                .into_iter()
                .map(|student| {
                    let student_check = self.check_chain(&student);
                    let (linked, issue) = self.check_linkage(&student, &class_check.chain);
                    self.node(student, student_check, Some(linked), issue, Vec::new())
                })
                .collect();

            class_nodes.push(self.node(
                class,
                class_check,
                Some(class_linked),
                class_issue,
                student_nodes,
            ));
        }

        Ok(self.node(department, dept_check, None, None, class_nodes))
    }

    fn node(
        &self,
        record: EntityRecord,
        check: ChainCheck,
        linkage_valid: Option<bool>,
        linkage_issue: Option<ValidationIssue>,
        children: Vec<ValidationNode>,
    ) -> ValidationNode {
        let mut issues = check.issues;
        issues.extend(linkage_issue);
        let valid = check.valid && linkage_valid.unwrap_or(true);

        if !valid {
            warn!("{} {} failed validation: {}", record.kind.label(), record.id, describe(&issues));
        }

        ValidationNode {
            attendance_blocks: check.chain.blocks_of_type("attendance").count(),
            block_count: check.chain.len(),
            id: record.id,
            kind: record.kind,
            name: record.name,
            status: record.status,
            valid,
            chain_valid: check.valid,
            linkage_valid,
            issues,
            children,
        }
    }

    fn check_chain(&self, record: &EntityRecord) -> ChainCheck {
        // Each chain is judged at the difficulty it was created with.
        let chain = record.clone().into_chain();
        let mut issues = Vec::new();

        if chain.is_empty() {
            issues.push(ValidationIssue::EmptyChain);
        }
        if let Err(fault) = chain.verify() {
            issues.push(ValidationIssue::InvalidChain {
                fault: fault.to_string(),
            });
        }
        if self.policy.verify_genesis {
            if let Err(fault) = chain.verify_genesis() {
                issues.push(ValidationIssue::GenesisUnverified {
                    fault: fault.to_string(),
                });
            }
        }

        ChainCheck {
            chain,
            valid: issues.is_empty(),
            issues,
        }
    }

    fn check_linkage(
        &self,
        child: &EntityRecord,
        parent: &Blockchain,
    ) -> (bool, Option<ValidationIssue>) {
        let Some(genesis) = child.genesis() else {
            return (false, None);
        };

        match self.policy.linkage {
            LinkageMode::CurrentLatest => {
                let expected = match parent.latest() {
                    Ok(block) => block.hash.clone(),
                    Err(_) => String::new(),
                };
                if genesis.prev_hash == expected {
                    (true, None)
                } else {
                    (
                        false,
                        Some(ValidationIssue::InvalidLinkage {
                            expected,
                            found: genesis.prev_hash.clone(),
                        }),
                    )
                }
            }
            LinkageMode::CapturedAtCreation => {
                let expected = child.parent_hash.clone().unwrap_or_default();
                if genesis.prev_hash != expected {
                    (
                        false,
                        Some(ValidationIssue::InvalidLinkage {
                            expected,
                            found: genesis.prev_hash.clone(),
                        }),
                    )
                } else if !parent.contains_hash(&expected) {
                    (false, Some(ValidationIssue::AnchorNotInParent { anchor: expected }))
                } else {
                    (true, None)
                }
            }
        }
    }

    async fn load(&self, id: &str, kind: EntityKind) -> Result<EntityRecord> {
        match self.store.get_entity(id).await? {
            Some(record) if record.kind == kind => Ok(record),
            _ => Err(LedgerError::NotFound(format!("{} {}", kind, id))),
        }
    }
}

fn describe(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MiningBudget;
    use crate::database::Database;
    use crate::registry::ChainService;
    use serde_json::json;

    async fn setup(
        linkage: LinkageMode,
    ) -> (ChainService<Database>, ValidationReporter<Database>) {
        let db = Database::new_in_memory().await.unwrap();
        let service = ChainService::new(db.clone(), 1, MiningBudget::default());
        let reporter = ValidationReporter::new(
            db,
            ValidationPolicy {
                linkage,
                verify_genesis: true,
            },
        );
        (service, reporter)
    }

    #[test]
    fn test_linkage_mode_parsing() {
        assert_eq!("captured_at_creation".parse::<LinkageMode>().unwrap(), LinkageMode::CapturedAtCreation);
        assert_eq!("current-latest".parse::<LinkageMode>().unwrap(), LinkageMode::CurrentLatest);
        assert!(matches!("sometimes".parse::<LinkageMode>(), Err(LedgerError::ConfigError(_))));
        assert_eq!(LinkageMode::default(), LinkageMode::CapturedAtCreation);
    }

    #[tokio::test]
    async fn test_fresh_hierarchy_is_valid() {
        let (service, reporter) = setup(LinkageMode::CapturedAtCreation).await;
        let dept = service.create_department("SOC", json!({})).await.unwrap();
        let class = service.create_class(&dept.id, "CSE-100", json!({})).await.unwrap();
        service.create_student(&class.id, "Ada", json!({})).await.unwrap();

        let report = reporter.validate_hierarchy(&dept.id).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.root.node_count(), 3);
        assert_eq!(report.root.linkage_valid, None);
        assert_eq!(report.root.children[0].linkage_valid, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_department_is_not_found() {
        let (_, reporter) = setup(LinkageMode::CapturedAtCreation).await;
        assert!(matches!(
            reporter.validate_hierarchy("ghost").await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_class_id_is_not_a_department() {
        let (service, reporter) = setup(LinkageMode::CapturedAtCreation).await;
        let dept = service.create_department("SOC", json!({})).await.unwrap();
        let class = service.create_class(&dept.id, "CSE-100", json!({})).await.unwrap();
        assert!(matches!(
            reporter.validate_hierarchy(&class.id).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_append_under_each_mode() {
        for (mode, expect_linked) in [
            (LinkageMode::CapturedAtCreation, true),
            (LinkageMode::CurrentLatest, false),
        ] {
            let (service, reporter) = setup(mode).await;
            let dept = service.create_department("SOC", json!({})).await.unwrap();
            let class = service.create_class(&dept.id, "CSE-100", json!({})).await.unwrap();
            service.update_entity(&dept.id, json!({"code": "SOC2"})).await.unwrap();

            let report = reporter.validate_hierarchy(&dept.id).await.unwrap();
            let class_node = report.root.find(&class.id).unwrap();
            assert_eq!(class_node.linkage_valid, Some(expect_linked), "{}", mode);
            assert!(class_node.chain_valid);
            assert_eq!(report.valid, expect_linked);
        }
    }

    #[tokio::test]
    async fn test_validate_entity_reports_parent() {
        let (service, reporter) = setup(LinkageMode::CapturedAtCreation).await;
        let dept = service.create_department("SOC", json!({})).await.unwrap();
        let class = service.create_class(&dept.id, "CSE-100", json!({})).await.unwrap();

        let report = reporter.validate_entity(&class.id).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.parent_chain_valid, Some(true));
        assert_eq!(report.parent_hash_matches, Some(true));

        let root = reporter.validate_entity(&dept.id).await.unwrap();
        assert!(root.valid);
        assert_eq!(root.parent_chain_valid, None);
    }

    #[tokio::test]
    async fn test_validate_all_empty_store() {
        let (_, reporter) = setup(LinkageMode::CapturedAtCreation).await;
        let report = reporter.validate_all().await.unwrap();
        assert!(report.valid);
        assert!(report.departments.is_empty());
    }
}
