//! Chain verifier: walks the log recomputing every link.
//!
//! Verification never mutates and never panics; it returns a diagnosis.
//! An I/O failure is reported as an error and is never allowed to
//! masquerade as a chain failure.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hash;
use crate::store::{now_unix, Ledger, LedgerError};

/// Records fetched per step while walking the chain.
const WALK_BATCH: u64 = 1000;

/// Outcome of a chain verification walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Whether every checked link held.
    pub ok: bool,
    /// The id of the first record that failed, when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_id: Option<u64>,
    /// Why that record failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// How many records were checked before the walk ended.
    pub checked: u64,
    /// When the verification ran (seconds since epoch).
    pub timestamp: i64,
}

/// Verifies the whole chain from genesis.
///
/// # Errors
///
/// Returns an error only for storage failures; an integrity failure is a
/// report, not an error.
pub fn verify_all(ledger: &Ledger) -> Result<VerifyReport, LedgerError> {
    walk(ledger, None)
}

/// Verifies the chain restricted to records with `timestamp <= target_time`.
///
/// The walk is still rooted at genesis: it starts with an empty expected
/// previous hash and covers every in-range record in ascending id order.
///
/// # Errors
///
/// Returns an error only for storage failures.
pub fn verify_up_to(ledger: &Ledger, target_time: i64) -> Result<VerifyReport, LedgerError> {
    walk(ledger, Some(target_time))
}

fn walk(ledger: &Ledger, until: Option<i64>) -> Result<VerifyReport, LedgerError> {
    let mut expected_prev = String::new();
    let mut checked = 0u64;
    let mut cursor = 1u64;

    loop {
        let batch = match until {
            Some(t) => ledger.read_from_up_to(cursor, t, WALK_BATCH)?,
            None => ledger.read_from(cursor, WALK_BATCH)?,
        };
        if batch.is_empty() {
            break;
        }

        for record in &batch {
            if record.prev_hash != expected_prev {
                debug!(failed_id = record.id, "prev_hash mismatch");
                return Ok(failure(record.id, "prev_hash mismatch", checked));
            }

            let link = hash::link_hash(
                &expected_prev,
                record.timestamp,
                &record.kind,
                &record.source,
                &record.payload,
            );
            if link != record.hash {
                debug!(failed_id = record.id, "hash mismatch");
                return Ok(failure(record.id, "hash mismatch", checked));
            }

            expected_prev.clone_from(&record.hash);
            checked += 1;
        }

        cursor = batch.last().map_or(cursor, |r| r.id + 1);
    }

    Ok(VerifyReport {
        ok: true,
        failed_id: None,
        reason: None,
        checked,
        timestamp: now_unix(),
    })
}

fn failure(failed_id: u64, reason: &str, checked: u64) -> VerifyReport {
    VerifyReport {
        ok: false,
        failed_id: Some(failed_id),
        reason: Some(reason.to_string()),
        checked,
        timestamp: now_unix(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordInput;

    fn input(timestamp: i64, kind: &str, payload: &str) -> RecordInput {
        RecordInput {
            timestamp,
            kind: kind.to_string(),
            source: "test".to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn empty_chain_verifies() {
        let ledger = Ledger::in_memory().unwrap();
        let report = verify_all(&ledger).unwrap();
        assert!(report.ok);
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn single_record_chain_verifies() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append_one(&input(1000, "code", r#"{"repo":"a","commit":"abc1234"}"#))
            .unwrap();

        let report = verify_all(&ledger).unwrap();
        assert!(report.ok);
        assert_eq!(report.checked, 1);
        assert!(report.failed_id.is_none());
    }

    #[test]
    fn multi_record_chain_verifies() {
        let ledger = Ledger::in_memory().unwrap();
        for i in 0..5 {
            ledger.append_one(&input(1000 + i, "code", "x")).unwrap();
        }

        let report = verify_all(&ledger).unwrap();
        assert!(report.ok);
        assert_eq!(report.checked, 5);
    }

    #[test]
    fn verify_up_to_covers_only_the_time_filtered_prefix() {
        let ledger = Ledger::in_memory().unwrap();
        ledger.append_one(&input(1000, "code", "a")).unwrap();
        ledger.append_one(&input(2000, "config", "b")).unwrap();

        let report = verify_up_to(&ledger, 1500).unwrap();
        assert!(report.ok);
        assert_eq!(report.checked, 1);

        let full = verify_up_to(&ledger, 3000).unwrap();
        assert_eq!(full.checked, 2);
    }

    #[test]
    fn report_serializes_without_empty_failure_fields() {
        let ledger = Ledger::in_memory().unwrap();
        ledger.append_one(&input(1000, "code", "a")).unwrap();

        let report = verify_all(&ledger).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("failed_id"));
        assert!(!json.contains("reason"));
    }
}
