//! Reconstructor: assembles the declared state at a target time.
//!
//! For a target time T the reconstructor resolves the latest record of
//! each kind, parses typed state, orders mutations into a replay plan,
//! runs provenance checks, scores determinism, and attaches a chain proof.
//! Payload parse failures become `issues` entries; they never turn into
//! chain-integrity failures, and the two paths stay strictly separate.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hash;
use crate::payload::{
    parse_external_ref, CodePayload, ConfigPayload, EnvironmentPayload, MutationPayload,
    TypedPayload,
};
use crate::snapshot::Snapshot;
use crate::store::{now_unix, Ledger};
use crate::verify::{self, VerifyReport};

/// Which of the four state dimensions a reconstruction covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// A code record was found and parsed.
    pub has_code: bool,
    /// A config record was found and parsed.
    pub has_config: bool,
    /// An environment record was found and parsed.
    pub has_environment: bool,
    /// At least one mutation record was found and parsed.
    pub has_mutations: bool,
    /// All four dimensions are present.
    pub complete: bool,
}

/// A mutation joined with its ledger position and parsed external ref.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEntry {
    /// Id of the ledger record carrying this mutation.
    pub ledger_id: u64,
    /// Timestamp of the ledger record.
    pub timestamp: i64,
    /// Mutation type tag.
    #[serde(rename = "type")]
    pub mutation_type: String,
    /// Caller-assigned mutation identifier.
    pub id: String,
    /// Originating system.
    pub source: String,
    /// Declared content digest, when present.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// Raw external ref as recorded.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_ref: String,
    /// Namespace prefix of the external ref (before the last colon).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Numeric offset of the external ref, 0 when absent or non-numeric.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Typed state resolved at the target time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotState {
    /// The target time the state was resolved for.
    pub timestamp: i64,
    /// Latest parseable code payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodePayload>,
    /// Latest parseable config payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigPayload>,
    /// Latest parseable environment payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentPayload>,
    /// Every parseable mutation payload at or before the target time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutations: Vec<MutationPayload>,
    /// Mutations joined with ledger position, in replay order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutation_records: Vec<MutationEntry>,
    /// Digest binding this state to its chain prefix.
    pub snapshot_hash: String,
}

/// Mutations grouped by namespace, each bucket in replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPlan {
    /// Buckets in first-appearance order.
    pub namespaces: Vec<NamespacePlan>,
    /// Total mutation count across buckets.
    pub total: usize,
}

/// One namespace bucket of the replay plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePlan {
    /// The namespace, `"default"` for refs without one.
    pub namespace: String,
    /// Number of mutations in this bucket.
    pub count: usize,
    /// True when every ref parsed as `<namespace>:<decimal>` and the
    /// bucket is sorted by offset; false means timestamp order.
    pub ordered: bool,
    /// The mutations, sorted per `ordered`.
    pub records: Vec<MutationEntry>,
}

/// The full structured output for a time-T reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconstructionReport {
    /// When the reconstruction ran (seconds since epoch).
    pub request_time: i64,
    /// The requested target time.
    pub target_time: i64,
    /// Whether the reconstruction itself completed. Provenance anomalies
    /// never flip this; storage failures do.
    pub success: bool,
    /// How many records fell at or before the target time.
    pub records_matched: usize,
    /// Dimension coverage.
    pub coverage: Coverage,
    /// Heuristic 0-100 score of how reconstructible the state is.
    pub determinism_score: f64,
    /// Parse errors, provenance anomalies, and coverage warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    /// Chain proof up to the target time, absent on proof I/O failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<VerifyReport>,
    /// Replay plan, present when at least one mutation was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_plan: Option<ReplayPlan>,
    /// The resolved typed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SnapshotState>,
}

/// Reconstructs declared state from a record store.
pub struct Reconstructor<'a> {
    ledger: &'a Ledger,
}

impl<'a> Reconstructor<'a> {
    /// Creates a reconstructor over the given store.
    #[must_use]
    pub const fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Produces the reconstruction report for `target_time`.
    ///
    /// The report is a pure function of the committed records with
    /// `timestamp <= target_time`.
    #[must_use]
    pub fn reconstruct_at(&self, target_time: i64) -> ReconstructionReport {
        let mut report = ReconstructionReport {
            request_time: now_unix(),
            target_time,
            ..ReconstructionReport::default()
        };

        let snapshot = match Snapshot::resolve_at(self.ledger, target_time) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report.issues.push(e.to_string());
                return report;
            },
        };

        match verify::verify_up_to(self.ledger, target_time) {
            Ok(proof) => report.proof = Some(proof),
            Err(e) => report.issues.push(format!("proof: {e}")),
        }

        report.records_matched = snapshot.records.len();

        let code = parse_slot::<CodePayload>(snapshot.code.as_ref(), &mut report.issues);
        let config = parse_slot::<ConfigPayload>(snapshot.config.as_ref(), &mut report.issues);
        let environment =
            parse_slot::<EnvironmentPayload>(snapshot.environment.as_ref(), &mut report.issues);

        let mut mutations = Vec::new();
        let mut entries = Vec::new();
        for record in &snapshot.mutations {
            match MutationPayload::parse(&record.payload) {
                Ok(payload) => {
                    let (namespace, offset) = parse_external_ref(&payload.external_ref);
                    entries.push(MutationEntry {
                        ledger_id: record.id,
                        timestamp: record.timestamp,
                        mutation_type: payload.mutation_type.clone(),
                        id: payload.id.clone(),
                        source: payload.source.clone(),
                        hash: payload.hash.clone(),
                        external_ref: payload.external_ref.clone(),
                        namespace,
                        offset: offset.unwrap_or(0),
                    });
                    mutations.push(payload);
                },
                Err(e) => report.issues.push(format!("mutation parse error: {e}")),
            }
        }
        order_mutation_entries(&mut entries);

        let coverage = Coverage {
            has_code: code.is_some(),
            has_config: config.is_some(),
            has_environment: environment.is_some(),
            has_mutations: !mutations.is_empty(),
            complete: code.is_some()
                && config.is_some()
                && environment.is_some()
                && !mutations.is_empty(),
        };

        let state = SnapshotState {
            timestamp: target_time,
            code,
            config,
            environment,
            mutations,
            mutation_records: entries,
            snapshot_hash: snapshot.snapshot_hash(),
        };

        report.coverage = coverage;
        report.determinism_score = determinism_score(&state, coverage);
        report.replay_plan = build_replay_plan(&state.mutation_records);
        report.success = true;

        apply_provenance_checks(&state, &mut report.issues);

        if !coverage.has_code {
            report.issues.push("warning: no code snapshot".to_string());
        }
        if !coverage.has_config {
            report.issues.push("warning: no config snapshot".to_string());
        }
        if !coverage.has_environment {
            report
                .issues
                .push("warning: no environment snapshot".to_string());
        }
        if !coverage.has_mutations {
            report
                .issues
                .push("warning: no mutations recorded".to_string());
        }

        report.state = Some(state);
        debug!(
            target_time,
            records_matched = report.records_matched,
            score = report.determinism_score,
            "reconstruction complete"
        );
        report
    }
}

impl ReconstructionReport {
    /// Renders a human-readable explanation of what the reconstruction
    /// can and cannot prove.
    #[must_use]
    pub fn explain(&self) -> String {
        if self.success && self.coverage.complete {
            return "reconstruction possible: all dimensions captured".to_string();
        }

        let mut explanation = String::from("Reconstruction not fully possible. Missing:\n");

        if !self.coverage.has_code {
            explanation.push_str("  - Code snapshot (cannot verify binary/version)\n");
        }
        if !self.coverage.has_config {
            explanation.push_str("  - Configuration snapshot (cannot replicate settings)\n");
        }
        if !self.coverage.has_environment {
            explanation.push_str("  - Environment snapshot (OS/runtime/arch unknown)\n");
        }
        if !self.coverage.has_mutations {
            explanation.push_str("  - Mutation records (data mutations untracked)\n");
        }

        if !self.issues.is_empty() {
            explanation.push_str("\nErrors encountered:\n");
            for issue in &self.issues {
                explanation.push_str("  - ");
                explanation.push_str(issue);
                explanation.push('\n');
            }
        }

        explanation.push_str("\nDeterminism Score: ");
        explanation.push_str(&format_score(self.determinism_score));
        explanation.push_str("%\n");

        if self.determinism_score < 50.0 {
            explanation.push_str("(Low confidence: use for forensics only, not audit proof)\n");
        } else if self.determinism_score < 100.0 {
            explanation
                .push_str("(Partial: some dimensions missing but state may be representative)\n");
        }

        explanation
    }

    /// Pretty-prints the report as two-space-indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn parse_slot<T: TypedPayload>(
    record: Option<&crate::store::Record>,
    issues: &mut Vec<String>,
) -> Option<T> {
    let record = record?;
    match T::parse(&record.payload) {
        Ok(payload) => Some(payload),
        Err(e) => {
            issues.push(format!("{} parse error: {e}", T::KIND));
            None
        },
    }
}

/// Orders the flat mutation list: by offset when every ref is numeric and
/// shares one namespace, otherwise by timestamp. Ties break by ledger id.
fn order_mutation_entries(entries: &mut [MutationEntry]) {
    if entries.len() < 2 {
        return;
    }

    let all_numeric = entries
        .iter()
        .all(|e| parse_external_ref(&e.external_ref).1.is_some());
    let same_namespace = entries
        .windows(2)
        .all(|pair| pair[0].namespace == pair[1].namespace);

    if all_numeric && same_namespace {
        entries.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.ledger_id.cmp(&b.ledger_id)));
    } else {
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.ledger_id.cmp(&b.ledger_id))
        });
    }
}

/// Groups mutations by namespace into a replay plan.
///
/// Buckets appear in first-appearance order of the source list. A bucket
/// is offset-ordered only when every one of its refs parses as
/// `<namespace>:<decimal>`.
fn build_replay_plan(records: &[MutationEntry]) -> Option<ReplayPlan> {
    if records.is_empty() {
        return None;
    }

    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<MutationEntry>> = HashMap::new();

    for record in records {
        let ns = if record.namespace.trim().is_empty() {
            "default".to_string()
        } else {
            record.namespace.clone()
        };
        if !buckets.contains_key(&ns) {
            order.push(ns.clone());
        }
        buckets.entry(ns).or_default().push(record.clone());
    }

    let mut namespaces = Vec::with_capacity(order.len());
    for ns in order {
        let mut list = buckets.remove(&ns).unwrap_or_default();
        let ordered = can_order_by_offset(&list);
        if ordered {
            list.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.ledger_id.cmp(&b.ledger_id)));
        } else {
            list.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then(a.ledger_id.cmp(&b.ledger_id))
            });
        }
        namespaces.push(NamespacePlan {
            namespace: ns,
            count: list.len(),
            ordered,
            records: list,
        });
    }

    Some(ReplayPlan {
        namespaces,
        total: records.len(),
    })
}

fn can_order_by_offset(records: &[MutationEntry]) -> bool {
    !records.is_empty()
        && records.iter().all(|r| {
            !r.external_ref.trim().is_empty()
                && parse_external_ref(&r.external_ref).1.is_some()
        })
}

/// Heuristic 0-100 score: 25 per covered dimension, minus 5 for a
/// non-system time source, minus 2 (once) for any blank external ref.
fn determinism_score(state: &SnapshotState, coverage: Coverage) -> f64 {
    let mut score: f64 = 0.0;

    if coverage.has_code {
        score += 25.0;
    }
    if coverage.has_config {
        score += 25.0;
    }
    if coverage.has_environment {
        score += 25.0;
    }
    if coverage.has_mutations {
        score += 25.0;
    }

    if let Some(env) = &state.environment {
        if env.time_source != "system" {
            score -= 5.0;
        }
    }

    if state
        .mutations
        .iter()
        .any(|m| m.external_ref.trim().is_empty())
    {
        score -= 2.0;
    }

    score.clamp(0.0, 100.0)
}

/// Single pass over the resolved state, appending provenance anomalies.
///
/// Each anomaly kind is reported at most once; the pass keeps going so a
/// later mixed-namespace finding is not hidden by an earlier duplicate.
fn apply_provenance_checks(state: &SnapshotState, issues: &mut Vec<String>) {
    if let Some(code) = &state.code {
        if code.commit.trim().len() < 7 {
            issues.push("provenance: code commit hash too short".to_string());
        }
    }

    if let Some(config) = &state.config {
        let snapshot = config.snapshot.trim();
        if snapshot.is_empty() {
            issues.push("provenance: config snapshot empty".to_string());
        } else {
            let computed = hash::prefixed_digest(snapshot.as_bytes());
            if !config.hash.trim().is_empty() && config.hash != computed {
                issues.push("provenance: config hash mismatch".to_string());
            }
        }
    }

    if let Some(env) = &state.environment {
        if env.os.trim().is_empty() || env.runtime.trim().is_empty() {
            issues.push("provenance: environment fields missing".to_string());
        }
    }

    if state.mutation_records.is_empty() {
        return;
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_refs: HashSet<&str> = HashSet::new();
    let mut namespaces: HashSet<&str> = HashSet::new();
    let mut duplicate_id_reported = false;
    let mut missing_ref_reported = false;
    let mut duplicate_ref_reported = false;

    for m in &state.mutation_records {
        if !m.id.trim().is_empty() && !seen_ids.insert(m.id.as_str()) && !duplicate_id_reported {
            issues.push(format!("provenance: duplicate mutation id {}", m.id));
            duplicate_id_reported = true;
        }

        if m.external_ref.trim().is_empty() {
            if !missing_ref_reported {
                issues.push("provenance: mutation missing external_ref".to_string());
                missing_ref_reported = true;
            }
            continue;
        }

        if !seen_refs.insert(m.external_ref.as_str()) && !duplicate_ref_reported {
            issues.push(format!(
                "provenance: duplicate external_ref {}",
                m.external_ref
            ));
            duplicate_ref_reported = true;
        }

        if !m.namespace.trim().is_empty() {
            namespaces.insert(m.namespace.as_str());
        }
    }

    if namespaces.len() > 1 {
        issues.push("provenance: mixed external_ref namespaces detected".to_string());
    }
}

fn format_score(score: f64) -> String {
    if score >= 100.0 {
        return "100".to_string();
    }
    if score <= 0.0 {
        return "0".to_string();
    }
    format!("{score:.1}")
}
