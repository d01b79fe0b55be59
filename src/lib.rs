pub mod chain;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod registry;
pub mod validation;

pub use error::{LedgerError, Result};
