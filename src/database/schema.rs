// Database schema definitions and migrations
// This module contains the SQL schema for the ledger database

pub const ENTITIES_SCHEMA: &str = include_str!("../../migrations/001_entities.sql");
