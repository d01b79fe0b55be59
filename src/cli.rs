//! Command line surface of the `attendance-ledger` binary
//!
//! Parsing and dispatch live here so the exit status of every command can
//! be exercised without spawning the binary. JSON results go to the given
//! writer; summaries go to stderr.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;

use crate::chain::{Block, ChainExport};
use crate::config::AppConfig;
use crate::database::{ChainStore, Database};
use crate::registry::{AttendanceStatus, ChainService, EntityKind};
use crate::validation::ValidationReporter;

#[derive(Debug, Parser)]
#[command(name = "attendance-ledger")]
#[command(version, about = "Tamper-evident hash chains for departments, classes, students and attendance")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured database URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage departments
    Department {
        #[command(subcommand)]
        action: DepartmentCommand,
    },
    /// Manage classes
    Class {
        #[command(subcommand)]
        action: ClassCommand,
    },
    /// Manage students
    Student {
        #[command(subcommand)]
        action: StudentCommand,
    },
    /// Append an update block to an entity's chain
    Update {
        /// department, class or student
        kind: EntityKind,
        id: String,
        /// JSON object with the changed fields
        #[arg(long)]
        data: String,
    },
    /// Soft-delete an entity by appending its terminal block
    Delete { kind: EntityKind, id: String },
    /// Record and read attendance
    Attendance {
        #[command(subcommand)]
        action: AttendanceCommand,
    },
    /// Check chain integrity
    Validate {
        #[command(subcommand)]
        target: ValidateCommand,
    },
    /// Inspect chains
    Chain {
        #[command(subcommand)]
        action: ChainCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum DepartmentCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ClassCommand {
    Create {
        /// Department id
        #[arg(long)]
        department: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum StudentCommand {
    Create {
        /// Class id
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_number: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AttendanceCommand {
    /// Append an attendance block to a student chain
    Mark {
        #[arg(long)]
        student: String,
        /// present, absent or leave
        #[arg(long)]
        status: AttendanceStatus,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// List the attendance blocks of a student
    History {
        #[arg(long)]
        student: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ValidateCommand {
    /// A department and every class and student under it
    Hierarchy { department_id: String },
    /// One entity against its direct parent
    Entity { id: String },
    /// Every department in the store
    All,
}

#[derive(Debug, Subcommand)]
pub enum ChainCommand {
    /// Print the exported chain of an entity
    Show { id: String },
}

/// Store, service and reporter built from one configuration
pub struct CommandContext {
    pub database: Database,
    pub service: ChainService<Database>,
    pub reporter: ValidationReporter<Database>,
}

impl CommandContext {
    pub fn new(database: Database, config: &AppConfig) -> Self {
        let service = ChainService::new(database.clone(), config.difficulty, config.mining_budget());
        let reporter = ValidationReporter::new(database.clone(), config.validation_policy());
        Self {
            database,
            service,
            reporter,
        }
    }
}

/// Process exit status for the outcome of [`execute`]
pub fn exit_code(outcome: &Result<bool>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) | Err(_) => 1,
    }
}

/// Run one command, writing its JSON result to `out`.
///
/// Returns `Ok(false)` when a validation command finds an invalid chain.
pub async fn execute<W: Write>(command: Commands, ctx: &CommandContext, out: &mut W) -> Result<bool> {
    let service = &ctx.service;
    let reporter = &ctx.reporter;

    match command {
        Commands::Department {
            action: DepartmentCommand::Create { name, code, description },
        } => {
            let payload = json!({ "name": name, "code": code, "description": description });
            let record = service.create_department(&name, payload).await?;
            write_json(out, &created(&record.id, record.kind, &record.chain_name(), &record.chain))?;
        }
        Commands::Class {
            action: ClassCommand::Create { department, name, code },
        } => {
            let payload = json!({ "name": name, "code": code, "department_id": department });
            let record = service.create_class(&department, &name, payload).await?;
            write_json(out, &created(&record.id, record.kind, &record.chain_name(), &record.chain))?;
        }
        Commands::Student {
            action: StudentCommand::Create { class, name, roll_number, email },
        } => {
            let payload = json!({
                "name": name,
                "roll_number": roll_number,
                "email": email,
                "class_id": class,
            });
            let record = service.create_student(&class, &name, payload).await?;
            write_json(out, &created(&record.id, record.kind, &record.chain_name(), &record.chain))?;
        }
        Commands::Update { kind, id, data } => {
            ensure_kind(&ctx.database, &id, kind).await?;
            let data: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
            if !data.is_object() {
                return Err(anyhow!("--data must be a JSON object"));
            }
            let block = service.update_entity(&id, data).await?;
            write_json(out, &block)?;
        }
        Commands::Delete { kind, id } => {
            ensure_kind(&ctx.database, &id, kind).await?;
            let block = service.delete_entity(&id).await?;
            write_json(out, &block)?;
        }
        Commands::Attendance {
            action: AttendanceCommand::Mark { student, status, date },
        } => {
            if let Some(date) = &date {
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date {}, expected YYYY-MM-DD", date))?;
            }
            let block = service.record_attendance(&student, status, date).await?;
            write_json(out, &block)?;
        }
        Commands::Attendance {
            action: AttendanceCommand::History { student },
        } => {
            let history = service.attendance_history(&student).await?;
            write_json(out, &history)?;
        }
        Commands::Validate { target } => {
            let valid = match target {
                ValidateCommand::Hierarchy { department_id } => {
                    let report = reporter.validate_hierarchy(&department_id).await?;
                    eprintln!("{}", report.summary());
                    write_json(out, &report)?;
                    report.valid
                }
                ValidateCommand::Entity { id } => {
                    let report = reporter.validate_entity(&id).await?;
                    write_json(out, &report)?;
                    report.valid
                }
                ValidateCommand::All => {
                    let report = reporter.validate_all().await?;
                    eprintln!("{}", report.summary());
                    write_json(out, &report)?;
                    report.valid
                }
            };
            return Ok(valid);
        }
        Commands::Chain {
            action: ChainCommand::Show { id },
        } => {
            let chain = service.load_chain(&id).await?;
            write_json(out, &ChainExport::from_chain(&chain))?;
        }
    }

    Ok(true)
}

async fn ensure_kind(database: &Database, id: &str, kind: EntityKind) -> Result<()> {
    let record = database
        .get_entity(id)
        .await?
        .ok_or_else(|| anyhow!("No {} with id {}", kind, id))?;
    if record.kind != kind {
        return Err(anyhow!("{} is a {}, not a {}", id, record.kind, kind));
    }
    Ok(())
}

fn created(id: &str, kind: EntityKind, chain_name: &str, chain: &[Block]) -> Value {
    json!({
        "id": id,
        "kind": kind,
        "chain": chain_name,
        "genesis": chain.first(),
    })
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
