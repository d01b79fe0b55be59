#![allow(dead_code)]

use attendance_ledger::chain::{Block, MiningBudget};
use attendance_ledger::database::models::EntityRecord;
use attendance_ledger::database::{ChainStore, Database};
use attendance_ledger::registry::{AttendanceStatus, ChainService};
use attendance_ledger::validation::{LinkageMode, ValidationPolicy, ValidationReporter};
use serde_json::json;

/// Difficulty used across integration tests; low enough to mine instantly
pub const TEST_DIFFICULTY: usize = 1;

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory().await.expect("Failed to create test database")
}

pub fn service(db: &Database) -> ChainService<Database> {
    service_at(db, TEST_DIFFICULTY)
}

pub fn service_at(db: &Database, difficulty: usize) -> ChainService<Database> {
    ChainService::new(db.clone(), difficulty, MiningBudget::default())
}

pub fn reporter(db: &Database, linkage: LinkageMode) -> ValidationReporter<Database> {
    ValidationReporter::new(
        db.clone(),
        ValidationPolicy {
            linkage,
            verify_genesis: true,
        },
    )
}

/// Department, class and student ids of a small school
pub struct School {
    pub department: EntityRecord,
    pub class: EntityRecord,
    pub student: EntityRecord,
}

pub async fn create_school(service: &ChainService<Database>) -> School {
    let department = service
        .create_department("School of Computing", json!({"name": "School of Computing", "code": "SOC"}))
        .await
        .expect("department");
    let class = service
        .create_class(&department.id, "CSE-100", json!({"name": "CSE-100", "code": "C100"}))
        .await
        .expect("class");
    let student = service
        .create_student(&class.id, "Ada Lovelace", json!({"name": "Ada Lovelace", "roll_number": "R-001"}))
        .await
        .expect("student");

    School {
        department,
        class,
        student,
    }
}

pub async fn mark(service: &ChainService<Database>, student_id: &str, status: AttendanceStatus, date: &str) -> Block {
    service
        .record_attendance(student_id, status, Some(date.to_string()))
        .await
        .expect("attendance")
}

/// Rewrite a stored chain in place, bypassing mining
pub async fn tamper<F>(db: &Database, entity_id: &str, edit: F)
where
    F: FnOnce(&mut Vec<Block>),
{
    let record = db.get_entity(entity_id).await.unwrap().unwrap();
    let length = record.chain.len();
    let mut blocks = record.chain;
    edit(&mut blocks);
    db.put_chain(entity_id, length, &blocks, record.status)
        .await
        .expect("tampered write");
}
