//! Audit bundle: a self-contained reconstruction report plus its proof.
//!
//! The bundle is everything a third party needs to replay the audit
//! offline: the report, the chain proof up to the target time, and notes
//! flagging anything that weakens the bundle's evidentiary value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconstruct::{ReconstructionReport, Reconstructor};
use crate::store::now_unix;
use crate::verify::VerifyReport;

/// Errors from bundle export.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BundleError {
    /// The target time must identify a real moment.
    #[error("target_time must be > 0")]
    InvalidTargetTime,
}

/// A serialized, self-contained audit document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditBundle {
    /// When the bundle was generated (seconds since epoch).
    pub generated_at: i64,
    /// The target time the bundle reconstructs.
    pub target_time: i64,
    /// The full reconstruction report.
    pub snapshot: ReconstructionReport,
    /// The chain proof, duplicated at the top level for quick checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<VerifyReport>,
    /// Caveats a verifier should know about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl AuditBundle {
    /// Serializes the bundle as two-space-indented JSON for human
    /// auditing.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Reconstructor<'_> {
    /// Exports an audit bundle for `target_time`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidTargetTime`] when `target_time <= 0`.
    pub fn export_audit_bundle(&self, target_time: i64) -> Result<AuditBundle, BundleError> {
        if target_time <= 0 {
            return Err(BundleError::InvalidTargetTime);
        }

        let report = self.reconstruct_at(target_time);

        let mut bundle = AuditBundle {
            generated_at: now_unix(),
            target_time,
            proof: report.proof.clone(),
            snapshot: report,
            notes: Vec::new(),
        };

        if bundle.proof.is_none() {
            bundle.notes.push("no proof available".to_string());
        }
        if !bundle.snapshot.success {
            bundle
                .notes
                .push("snapshot reconstruction failed".to_string());
        }
        if !bundle.snapshot.coverage.complete {
            bundle
                .notes
                .push("snapshot missing required dimensions".to_string());
        }

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Ledger, RecordInput};

    fn input(timestamp: i64, kind: &str, payload: &str) -> RecordInput {
        RecordInput {
            timestamp,
            kind: kind.to_string(),
            source: "test".to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn export_rejects_non_positive_target_time() {
        let ledger = Ledger::in_memory().unwrap();
        let reconstructor = Reconstructor::new(&ledger);

        assert!(matches!(
            reconstructor.export_audit_bundle(0),
            Err(BundleError::InvalidTargetTime)
        ));
        assert!(matches!(
            reconstructor.export_audit_bundle(-5),
            Err(BundleError::InvalidTargetTime)
        ));
    }

    #[test]
    fn export_notes_missing_dimensions() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append_one(&input(1000, "code", r#"{"repo":"a","commit":"abc1234"}"#))
            .unwrap();

        let bundle = Reconstructor::new(&ledger).export_audit_bundle(2000).unwrap();
        assert!(bundle.proof.is_some());
        assert_eq!(bundle.notes, ["snapshot missing required dimensions"]);
        assert!(bundle.generated_at > 0);
    }

    #[test]
    fn complete_bundle_carries_no_notes() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append_one(&input(1000, "code", r#"{"repo":"a","commit":"abc1234"}"#))
            .unwrap();
        ledger
            .append_one(&input(
                1001,
                "config",
                r#"{"source":"cfg","version":"1","hash":"","snapshot":"x"}"#,
            ))
            .unwrap();
        ledger
            .append_one(&input(
                1002,
                "environment",
                r#"{"os":"linux","runtime":"rust","arch":"amd64","time_source":"system"}"#,
            ))
            .unwrap();
        ledger
            .append_one(&input(
                1003,
                "mutation",
                r#"{"type":"t","id":"evt-1","source":"svc","external_ref":"kafka:1"}"#,
            ))
            .unwrap();

        let bundle = Reconstructor::new(&ledger).export_audit_bundle(2000).unwrap();
        assert!(bundle.notes.is_empty());
        assert!(bundle.snapshot.coverage.complete);
    }

    #[test]
    fn bundle_round_trips_through_json_with_verifying_proof() {
        let ledger = Ledger::in_memory().unwrap();
        ledger
            .append_one(&input(1000, "code", r#"{"repo":"a","commit":"abc1234"}"#))
            .unwrap();

        let bundle = Reconstructor::new(&ledger).export_audit_bundle(1500).unwrap();
        let json = bundle.to_json().unwrap();
        // Two-space indentation for human auditing.
        assert!(json.contains("\n  \"generated_at\""));

        let decoded: AuditBundle = serde_json::from_str(&json).unwrap();
        let proof = decoded.proof.expect("proof present");
        assert!(proof.ok);
        assert_eq!(proof.checked, 1);
        assert_eq!(decoded.target_time, 1500);
    }
}
