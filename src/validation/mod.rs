//! Chain and hierarchy validation

pub mod report;
pub mod reporter;

pub use report::{EntityReport, HierarchyReport, SystemReport, ValidationIssue, ValidationNode};
pub use reporter::{LinkageMode, ValidationPolicy, ValidationReporter};
