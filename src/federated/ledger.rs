//! Round ledger.
//!
//! One record per committed round, with a digest of the parameters the
//! round produced. Aborted rounds leave no record.

use crate::core::{now, Digest256, Result, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Run this round belongs to
    pub run_id: Uuid,
    /// Algorithm name
    pub algorithm: String,
    /// Round number, starting at 1
    pub round: usize,
    /// Number of sites that contributed
    pub sites: usize,
    /// SHA3-256 of the bincode-encoded parameters after the update
    pub params_digest: Digest256,
    /// Commit time
    pub timestamp: Timestamp,
    /// Wall time of the round in milliseconds
    pub elapsed_ms: u64,
}

/// Append-only list of committed rounds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoundLedger {
    records: Vec<RoundRecord>,
}

impl RoundLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed round.
    pub fn record<P: Serialize>(
        &mut self,
        run_id: Uuid,
        algorithm: &str,
        round: usize,
        sites: usize,
        params: &P,
        elapsed_ms: u64,
    ) -> Result<&RoundRecord> {
        let index = self.records.len();
        self.records.push(RoundRecord {
            run_id,
            algorithm: algorithm.to_string(),
            round,
            sites,
            params_digest: Digest256::of_value(params)?,
            timestamp: now(),
            elapsed_ms,
        });
        Ok(&self.records[index])
    }

    /// All records in commit order.
    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    /// Records of one run.
    pub fn run(&self, run_id: Uuid) -> Vec<&RoundRecord> {
        self.records.iter().filter(|r| r.run_id == run_id).collect()
    }

    /// Parameter digests of one run, in round order.
    pub fn digests(&self, run_id: Uuid) -> Vec<&Digest256> {
        self.run(run_id).into_iter().map(|r| &r.params_digest).collect()
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&RoundRecord> {
        self.records.last()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_filter_by_run() {
        let mut ledger = RoundLedger::new();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();

        ledger.record(run_a, "kmeans", 1, 2, &vec![1.0f64], 3).unwrap();
        ledger.record(run_a, "kmeans", 2, 2, &vec![2.0f64], 3).unwrap();
        ledger.record(run_b, "logreg", 1, 3, &vec![0.5f64], 1).unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.run(run_a).len(), 2);
        assert_eq!(ledger.last().unwrap().algorithm, "logreg");
    }

    #[test]
    fn test_equal_params_give_equal_digests() {
        let mut ledger = RoundLedger::new();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();

        ledger.record(run_a, "kmeans", 1, 1, &vec![vec![0.25f64, 1.5]], 0).unwrap();
        ledger.record(run_b, "kmeans", 1, 1, &vec![vec![0.25f64, 1.5]], 0).unwrap();

        assert_eq!(ledger.digests(run_a), ledger.digests(run_b));
    }
}
