//! End-to-end reconstruction: typed resolution, replay ordering,
//! provenance findings, scoring, and audit bundle round-trips.

use chronicle_core::bundle::AuditBundle;
use chronicle_core::hash;
use chronicle_core::ingest::{IngestRequest, Ingestor};
use chronicle_core::payload::RecordKind;
use chronicle_core::reconstruct::Reconstructor;
use chronicle_core::store::Ledger;
use chronicle_core::verify::verify_up_to;

fn mutation_json(id: &str, external_ref: &str) -> String {
    format!(
        r#"{{"type":"order_created","id":"{id}","source":"svc","external_ref":"{external_ref}"}}"#
    )
}

fn seed_full_ledger() -> Ledger {
    let ledger = Ledger::in_memory().unwrap();
    let ingestor = Ingestor::new(&ledger);

    ingestor
        .ingest(
            RecordKind::Code,
            r#"{"repo":"app","commit":"abc1234"}"#,
            "ci",
            1000,
        )
        .unwrap();
    let snapshot = "retries: 3";
    let config = format!(
        r#"{{"source":"app.yaml","version":"1","hash":"{}","snapshot":"{snapshot}"}}"#,
        hash::prefixed_digest(snapshot.as_bytes())
    );
    ingestor
        .ingest(RecordKind::Config, &config, "ci", 1001)
        .unwrap();
    ingestor
        .ingest(
            RecordKind::Environment,
            r#"{"os":"linux","runtime":"rust","arch":"amd64","time_source":"system"}"#,
            "agent",
            1002,
        )
        .unwrap();
    ingestor
        .ingest(
            RecordKind::Mutation,
            &mutation_json("evt-1", "kafka:42"),
            "svc",
            1003,
        )
        .unwrap();

    ledger
}

#[test]
fn full_coverage_scores_one_hundred() {
    let ledger = seed_full_ledger();
    let report = Reconstructor::new(&ledger).reconstruct_at(2000);

    assert!(report.success);
    assert!(report.coverage.complete);
    assert!((report.determinism_score - 100.0).abs() < f64::EPSILON);
    assert_eq!(report.records_matched, 4);
    assert!(report.proof.as_ref().unwrap().ok);
    assert_eq!(report.proof.as_ref().unwrap().checked, 4);
    assert_eq!(
        report.explain(),
        "reconstruction possible: all dimensions captured"
    );
}

#[test]
fn replay_plan_orders_a_namespace_by_offset() {
    let ledger = Ledger::in_memory().unwrap();
    let ingestor = Ingestor::new(&ledger);

    for (id, external_ref) in [("evt-2", "kafka:2"), ("evt-1", "kafka:1"), ("evt-3", "kafka:3")] {
        ingestor
            .ingest(
                RecordKind::Mutation,
                &mutation_json(id, external_ref),
                "svc",
                1000,
            )
            .unwrap();
    }

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    let plan = report.replay_plan.as_ref().unwrap();

    assert_eq!(plan.total, 3);
    assert_eq!(plan.namespaces.len(), 1);
    let bucket = &plan.namespaces[0];
    assert_eq!(bucket.namespace, "kafka");
    assert!(bucket.ordered);
    let refs: Vec<&str> = bucket
        .records
        .iter()
        .map(|r| r.external_ref.as_str())
        .collect();
    assert_eq!(refs, ["kafka:1", "kafka:2", "kafka:3"]);
}

#[test]
fn replay_plan_is_null_without_mutations() {
    let ledger = Ledger::in_memory().unwrap();
    Ingestor::new(&ledger)
        .ingest(
            RecordKind::Code,
            r#"{"repo":"app","commit":"abc1234"}"#,
            "ci",
            1000,
        )
        .unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    assert!(report.replay_plan.is_none());
}

#[test]
fn config_hash_mismatch_is_an_issue_not_a_failure() {
    let ledger = Ledger::in_memory().unwrap();
    Ingestor::new(&ledger)
        .ingest(
            RecordKind::Config,
            r#"{"source":"cfg","version":"1","hash":"sha256:wrong","snapshot":"value"}"#,
            "ci",
            1000,
        )
        .unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(1000);
    assert!(report.success);
    assert!(report
        .issues
        .iter()
        .any(|i| i == "provenance: config hash mismatch"));
    // A provenance anomaly never turns into a chain failure.
    assert!(report.proof.as_ref().unwrap().ok);
}

#[test]
fn short_commit_is_flagged() {
    let ledger = Ledger::in_memory().unwrap();
    Ingestor::new(&ledger)
        .ingest(RecordKind::Code, r#"{"repo":"app","commit":"abc12"}"#, "ci", 1000)
        .unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    assert!(report
        .issues
        .iter()
        .any(|i| i == "provenance: code commit hash too short"));
}

#[test]
fn unparseable_latest_record_leaves_the_slot_empty() {
    let ledger = Ledger::in_memory().unwrap();
    let ingestor = Ingestor::new(&ledger);
    ingestor
        .ingest(
            RecordKind::Code,
            r#"{"repo":"app","commit":"abc1234"}"#,
            "ci",
            1000,
        )
        .unwrap();

    // A raw append can carry bytes the schema rejects; the latest record
    // of the kind wins resolution, so the slot must come up empty.
    ledger
        .append_one(&chronicle_core::store::RecordInput {
            timestamp: 1001,
            kind: "code".to_string(),
            source: "raw".to_string(),
            payload: r#"{"unexpected":"shape"}"#.to_string(),
        })
        .unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    assert!(!report.coverage.has_code);
    assert!(report.issues.iter().any(|i| i.starts_with("code parse error:")));
    // Parse errors never break the chain proof.
    assert!(report.proof.as_ref().unwrap().ok);
}

#[test]
fn mixed_namespaces_are_flagged_and_bucketed() {
    let ledger = Ledger::in_memory().unwrap();
    let ingestor = Ingestor::new(&ledger);
    ingestor
        .ingest(RecordKind::Mutation, &mutation_json("evt-1", "kafka:1"), "svc", 1000)
        .unwrap();
    ingestor
        .ingest(RecordKind::Mutation, &mutation_json("evt-2", "s3:9"), "svc", 1001)
        .unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    assert!(report
        .issues
        .iter()
        .any(|i| i == "provenance: mixed external_ref namespaces detected"));

    let plan = report.replay_plan.as_ref().unwrap();
    let names: Vec<&str> = plan.namespaces.iter().map(|n| n.namespace.as_str()).collect();
    assert_eq!(names, ["kafka", "s3"]);
}

#[test]
fn reconstruction_is_a_pure_function_of_committed_records() {
    let ledger = seed_full_ledger();
    let reconstructor = Reconstructor::new(&ledger);

    let first = reconstructor.reconstruct_at(2000);
    let second = reconstructor.reconstruct_at(2000);

    assert_eq!(first.records_matched, second.records_matched);
    assert_eq!(first.coverage, second.coverage);
    assert!((first.determinism_score - second.determinism_score).abs() < f64::EPSILON);
    assert_eq!(first.issues, second.issues);
    assert_eq!(first.replay_plan, second.replay_plan);
    assert_eq!(
        first.state.as_ref().unwrap().snapshot_hash,
        second.state.as_ref().unwrap().snapshot_hash
    );
}

#[test]
fn snapshot_hash_binds_the_chain_prefix() {
    let ledger = seed_full_ledger();
    let report = Reconstructor::new(&ledger).reconstruct_at(2000);

    let records = ledger.list(0, 2000, 0).unwrap();
    let expected = hash::snapshot_hash(records.iter().map(|r| r.hash.as_str()));
    assert_eq!(report.state.as_ref().unwrap().snapshot_hash, expected);
}

#[test]
fn batch_ingest_then_reconstruct() {
    let ledger = Ledger::in_memory().unwrap();
    let requests: Vec<IngestRequest> = [("evt-1", "kafka:2"), ("evt-2", "kafka:1")]
        .iter()
        .map(|(id, external_ref)| IngestRequest {
            kind: RecordKind::Mutation,
            payload: mutation_json(id, external_ref),
            source: "svc".to_string(),
            timestamp: 1000,
        })
        .collect();
    Ingestor::new(&ledger).ingest_batch(&requests).unwrap();

    let report = Reconstructor::new(&ledger).reconstruct_at(2000);
    let bucket = &report.replay_plan.as_ref().unwrap().namespaces[0];
    assert!(bucket.ordered);
    assert_eq!(bucket.records[0].id, "evt-2");
}

#[test]
fn audit_bundle_round_trips_and_its_proof_still_verifies() {
    let ledger = seed_full_ledger();
    let bundle = Reconstructor::new(&ledger).export_audit_bundle(2000).unwrap();

    let json = bundle.to_json().unwrap();
    let decoded: AuditBundle = serde_json::from_str(&json).unwrap();

    let embedded = decoded.proof.expect("bundle carries a proof");
    assert!(embedded.ok);

    // Replaying verification against the stored chain agrees with the
    // embedded proof.
    let fresh = verify_up_to(&ledger, decoded.target_time).unwrap();
    assert_eq!(fresh.ok, embedded.ok);
    assert_eq!(fresh.checked, embedded.checked);
}
