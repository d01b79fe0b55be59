//! Ledger Block
//!
//! Defines the record unit of an entity chain: a payload, a link to the
//! hash it was derived from, and a proof-of-work nonce.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chain::pow::{self, MiningBudget, MiningOutcome};
use crate::error::Result;

/// `prev_hash` of the genesis block of a root chain.
pub const ROOT_SENTINEL: &str = "0";

/// Block record, identical to its persisted form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub transactions: Value,
    pub prev_hash: String,
    pub nonce: u64,
    pub hash: String,
}

/// Fields covered by the hash, in their fixed order.
#[derive(Serialize)]
struct HashPreimage<'a> {
    index: u64,
    timestamp: &'a str,
    transactions: &'a Value,
    prev_hash: &'a str,
    nonce: u64,
}

impl Block {
    /// Create an unmined block stamped with the current time
    pub fn new(index: u64, transactions: Value, prev_hash: String) -> Self {
        Self::with_timestamp(index, current_timestamp(), transactions, prev_hash)
    }

    pub fn with_timestamp(
        index: u64,
        timestamp: String,
        transactions: Value,
        prev_hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            prev_hash,
            nonce: 0,
            hash: String::new(),
        }
    }

    /// Canonical encoding hashed by `calculate_hash`
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let preimage = HashPreimage {
            index: self.index,
            timestamp: &self.timestamp,
            transactions: &self.transactions,
            prev_hash: &self.prev_hash,
            nonce: self.nonce,
        };
        // Values with string keys always serialize.
        serde_json::to_vec(&preimage).unwrap_or_default()
    }

    /// Calculate the SHA-256 hex digest of this block
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }

    /// Search for a nonce whose hash carries `difficulty` leading zeros.
    ///
    /// The search starts at the current nonce and hashes before
    /// incrementing, so a block that already satisfies the threshold
    /// (always the case at difficulty 0) is accepted on the first attempt.
    pub fn mine(&mut self, difficulty: usize, budget: &MiningBudget) -> Result<MiningOutcome> {
        pow::check_difficulty(difficulty)?;

        let mut run = budget.start();
        loop {
            run.next_attempt()?;
            self.hash = self.calculate_hash();
            if self.meets_difficulty(difficulty) {
                break;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }

        let outcome = run.finish();
        debug!(
            "Block {} mined: {} (nonce {}, {} attempts)",
            self.index, self.hash, self.nonce, outcome.attempts
        );
        Ok(outcome)
    }

    /// The `type` tag of the payload, if it carries one
    pub fn transaction_type(&self) -> Option<&str> {
        self.transactions.get("type").and_then(Value::as_str)
    }

    pub fn summary(&self) -> String {
        format!(
            "#{} {} ({} <- {})",
            self.index,
            self.transaction_type().unwrap_or("untyped"),
            self.hash,
            self.prev_hash
        )
    }
}

pub(crate) fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use serde_json::json;

    fn sample_block() -> Block {
        Block::with_timestamp(
            1,
            "2026-01-05T09:00:00.000Z".to_string(),
            json!({"type": "attendance", "attendance": {"status": "Present"}}),
            "00ab".to_string(),
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();
        let hash1 = block.calculate_hash();
        let hash2 = block.calculate_hash();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_canonical_field_order() {
        let block = sample_block();
        let canonical = String::from_utf8(block.canonical_bytes()).unwrap();
        let index = canonical.find("\"index\"").unwrap();
        let timestamp = canonical.find("\"timestamp\"").unwrap();
        let transactions = canonical.find("\"transactions\"").unwrap();
        let prev_hash = canonical.find("\"prev_hash\"").unwrap();
        let nonce = canonical.find("\"nonce\"").unwrap();
        assert!(index < timestamp && timestamp < transactions);
        assert!(transactions < prev_hash && prev_hash < nonce);
        assert!(!canonical.contains("\"hash\""));
    }

    #[test]
    fn test_hash_survives_json_reload() {
        let mut block = sample_block();
        block.mine(1, &MiningBudget::default()).unwrap();

        let json = serde_json::to_string(&block).unwrap();
        let reloaded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.calculate_hash(), block.hash);
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let mut block = sample_block();
        block.mine(2, &MiningBudget::default()).unwrap();
        assert!(block.hash.starts_with("00"));
        assert!(block.verify_hash());
    }

    #[test]
    fn test_difficulty_zero_single_attempt() {
        let mut block = sample_block();
        let outcome = block.mine(0, &MiningBudget::default()).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(block.nonce, 0);
        assert!(block.verify_hash());
    }

    #[test]
    fn test_mining_is_deterministic() {
        let mut a = sample_block();
        let mut b = sample_block();
        a.mine(2, &MiningBudget::default()).unwrap();
        b.mine(2, &MiningBudget::default()).unwrap();
        assert_eq!(a.nonce, b.nonce);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_mining_respects_attempt_cap() {
        let mut block = sample_block();
        let budget = MiningBudget::new(5, None);
        let err = block.mine(60, &budget).unwrap_err();
        assert!(matches!(err, LedgerError::MiningTimeout { attempts: 5, .. }));
    }

    #[test]
    fn test_rejects_impossible_difficulty() {
        let mut block = sample_block();
        let err = block.mine(65, &MiningBudget::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDifficulty(65)));
    }

    #[test]
    fn test_tampered_payload_fails_hash() {
        let mut block = sample_block();
        block.mine(1, &MiningBudget::default()).unwrap();
        block.transactions = json!({"type": "attendance", "attendance": {"status": "Absent"}});
        assert!(!block.verify_hash());
    }

    #[test]
    fn test_transaction_type() {
        let block = sample_block();
        assert_eq!(block.transaction_type(), Some("attendance"));

        let untyped = Block::new(0, json!([1, 2, 3]), ROOT_SENTINEL.to_string());
        assert_eq!(untyped.transaction_type(), None);
        assert!(untyped.summary().contains("untyped"));
    }
}
