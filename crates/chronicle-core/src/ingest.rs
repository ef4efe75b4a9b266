//! Ingest coordinator: validated, canonicalized appends.
//!
//! The coordinator is the only write path collectors should use. It
//! dispatches on record kind to the matching schema, parses and validates
//! the payload, re-serializes it canonically, assigns a timestamp when the
//! caller passed zero, and appends. Error categories bubble up unchanged:
//! malformed and invalid payloads never reach the chain.

use thiserror::Error;
use tracing::debug;

use crate::payload::{
    CodePayload, ConfigPayload, EnvironmentPayload, MutationPayload, PayloadError, RecordKind,
    TypedPayload,
};
use crate::store::{Ledger, LedgerError, Record, RecordInput};

/// Errors from the ingest path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The payload failed to parse or validate.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The store rejected or failed the append.
    #[error(transparent)]
    Store(#[from] LedgerError),
}

/// One entry of a batch ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Which schema to validate against.
    pub kind: RecordKind,
    /// Raw payload bytes as received from the collector.
    pub payload: String,
    /// Origin tag for the sealed record.
    pub source: String,
    /// Seconds since epoch; zero means wall clock at commit.
    pub timestamp: i64,
}

/// Coordinates payload validation and chain appends.
pub struct Ingestor<'a> {
    ledger: &'a Ledger,
}

impl<'a> Ingestor<'a> {
    /// Creates an ingestor over the given store.
    #[must_use]
    pub const fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Validates and appends a single typed record.
    ///
    /// # Errors
    ///
    /// Returns the payload error (`malformed`/`invalid`) or store error
    /// unchanged; nothing is written on failure.
    pub fn ingest(
        &self,
        kind: RecordKind,
        raw_payload: &str,
        source: &str,
        timestamp: i64,
    ) -> Result<Record, IngestError> {
        let payload = canonicalize_for_kind(kind, raw_payload)?;
        let record = self.ledger.append_one(&RecordInput {
            timestamp,
            kind: kind.as_str().to_string(),
            source: source.to_string(),
            payload,
        })?;
        debug!(id = record.id, kind = %kind, "ingested record");
        Ok(record)
    }

    /// Validates every request, then appends them in one atomic batch.
    ///
    /// All payloads are parsed and validated before any append; the store
    /// commits all records or none.
    ///
    /// # Errors
    ///
    /// Returns the first payload error encountered, or the store error;
    /// in either case no record becomes visible.
    pub fn ingest_batch(&self, requests: &[IngestRequest]) -> Result<Vec<Record>, IngestError> {
        let mut inputs = Vec::with_capacity(requests.len());
        for request in requests {
            let payload = canonicalize_for_kind(request.kind, &request.payload)?;
            inputs.push(RecordInput {
                timestamp: request.timestamp,
                kind: request.kind.as_str().to_string(),
                source: request.source.clone(),
                payload,
            });
        }

        let records = self.ledger.append_batch(&inputs)?;
        debug!(count = records.len(), "ingested batch");
        Ok(records)
    }
}

/// Parses, validates, and canonically re-serializes a raw payload.
fn canonicalize_for_kind(kind: RecordKind, raw: &str) -> Result<String, PayloadError> {
    match kind {
        RecordKind::Code => canonicalize::<CodePayload>(raw),
        RecordKind::Config => canonicalize::<ConfigPayload>(raw),
        RecordKind::Environment => canonicalize::<EnvironmentPayload>(raw),
        RecordKind::Mutation => canonicalize::<MutationPayload>(raw),
    }
}

fn canonicalize<T: TypedPayload>(raw: &str) -> Result<String, PayloadError> {
    let payload = T::parse(raw)?;
    payload.validate()?;
    payload.canonical_bytes()
}
