//! Portable chain dumps, written by `chain show` and read back by
//! `verify-chain-export`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::chain::{Block, Blockchain};
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExport {
    pub name: String,
    pub difficulty: usize,
    pub blocks: Vec<Block>,
}

/// Either a full export or a bare block array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Full(ChainExport),
    Blocks(Vec<Block>),
}

impl ChainExport {
    pub fn from_chain(chain: &Blockchain) -> Self {
        Self {
            name: chain.name().to_string(),
            difficulty: chain.difficulty(),
            blocks: chain.export_data(),
        }
    }

    pub fn into_chain(self) -> Blockchain {
        Blockchain::from_records(self.name, self.difficulty, self.blocks)
    }

    /// Parse an export.
    ///
    /// A full export carries its own difficulty. A bare array records none,
    /// so the caller must supply `bare_difficulty`; it is never guessed.
    pub fn parse(content: &str, name: &str, bare_difficulty: Option<usize>) -> Result<Self> {
        match serde_json::from_str(content)? {
            ExportFile::Full(export) => Ok(export),
            ExportFile::Blocks(blocks) => {
                let difficulty = bare_difficulty.ok_or_else(|| {
                    LedgerError::SerializationError(
                        "bare block array carries no difficulty; pass it explicitly".to_string(),
                    )
                })?;
                Ok(Self {
                    name: name.to_string(),
                    difficulty,
                    blocks,
                })
            }
        }
    }

    pub fn load(path: &Path, bare_difficulty: Option<usize>) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::NotFound(format!("cannot read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("chain");
        Self::parse(&content, name, bare_difficulty)
    }
}
