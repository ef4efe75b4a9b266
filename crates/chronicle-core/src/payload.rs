//! Typed record payloads and their strict validation.
//!
//! Four payload variants exist, one per record kind. Parsing is strict:
//! unknown fields and malformed JSON are rejected before anything reaches
//! the chain. Validation reports every missing or blank required field at
//! once. Serialization goes through the canonical encoder so identical
//! logical payloads always produce byte-identical stored bytes.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical;

/// Errors surfaced by payload parsing and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
    /// The payload bytes do not parse as the expected shape.
    #[error("malformed payload: {message}")]
    Malformed {
        /// Description of the parse failure.
        message: String,
    },

    /// The parsed payload fails validation.
    #[error("invalid payload: required field(s) missing or blank: {}", fields.join(", "))]
    Invalid {
        /// Every required field that is missing or blank.
        fields: Vec<String>,
    },

    /// The record kind string is not one of the four known kinds.
    #[error("unknown record kind: {kind}")]
    UnknownKind {
        /// The unrecognized kind string.
        kind: String,
    },
}

/// The four record kinds the ledger captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Source code identity (repo + commit).
    Code,
    /// Configuration snapshot.
    Config,
    /// Runtime environment.
    Environment,
    /// External data mutation.
    Mutation,
}

impl RecordKind {
    /// The wire form stored in the record's `kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Config => "config",
            Self::Environment => "environment",
            Self::Mutation => "mutation",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "config" => Ok(Self::Config),
            "environment" => Ok(Self::Environment),
            "mutation" => Ok(Self::Mutation),
            other => Err(PayloadError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Common surface of the four typed payloads.
pub trait TypedPayload: Serialize + DeserializeOwned + Sized {
    /// The record kind this payload belongs to.
    const KIND: RecordKind;

    /// Validates the payload, listing every missing or blank required
    /// field.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Invalid`] naming each unmet requirement.
    fn validate(&self) -> Result<(), PayloadError>;

    /// Parses payload bytes, rejecting unknown fields.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Malformed`] on non-conforming input.
    fn parse(raw: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(raw).map_err(|e| PayloadError::Malformed {
            message: e.to_string(),
        })
    }

    /// Serializes to canonical bytes (sorted keys, no whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Malformed`] if the value cannot be
    /// canonically encoded.
    fn canonical_bytes(&self) -> Result<String, PayloadError> {
        canonical::canonical_payload(self).map_err(|e| PayloadError::Malformed {
            message: e.to_string(),
        })
    }
}

/// Source code identity at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodePayload {
    /// Repository identifier.
    pub repo: String,
    /// Commit hash. The reconstructor warns when shorter than 7 chars.
    pub commit: String,
    /// Built artifact digests, if captured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Dependency lockfile digests, if captured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lockfiles: Vec<String>,
}

impl TypedPayload for CodePayload {
    const KIND: RecordKind = RecordKind::Code;

    fn validate(&self) -> Result<(), PayloadError> {
        let mut fields = Vec::new();
        if self.repo.trim().is_empty() {
            fields.push("repo".to_string());
        }
        if self.commit.trim().is_empty() {
            fields.push("commit".to_string());
        }
        invalid_unless_empty(fields)
    }
}

/// Configuration snapshot with a declared content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigPayload {
    /// Path or URI the configuration was read from.
    pub source: String,
    /// Version tag of the configuration.
    pub version: String,
    /// Declared digest of `snapshot`, algorithm-prefixed (`sha256:...`).
    pub hash: String,
    /// The full configuration content.
    pub snapshot: String,
}

impl TypedPayload for ConfigPayload {
    const KIND: RecordKind = RecordKind::Config;

    fn validate(&self) -> Result<(), PayloadError> {
        let mut fields = Vec::new();
        if self.source.trim().is_empty() {
            fields.push("source".to_string());
        }
        if self.version.trim().is_empty() {
            fields.push("version".to_string());
        }
        if self.hash.trim().is_empty() {
            fields.push("hash".to_string());
        }
        if self.snapshot.trim().is_empty() {
            fields.push("snapshot".to_string());
        }
        invalid_unless_empty(fields)
    }
}

/// Runtime environment description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentPayload {
    /// Operating system name.
    pub os: String,
    /// Kernel version, when known.
    #[serde(default)]
    pub kernel: String,
    /// Container identifier, when running containerized.
    #[serde(default)]
    pub container: String,
    /// Language runtime and version.
    pub runtime: String,
    /// CPU architecture.
    pub arch: String,
    /// Runtime flags that affect behavior.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    /// Clock source; anything but `"system"` costs determinism score.
    pub time_source: String,
}

impl TypedPayload for EnvironmentPayload {
    const KIND: RecordKind = RecordKind::Environment;

    fn validate(&self) -> Result<(), PayloadError> {
        let mut fields = Vec::new();
        if self.os.trim().is_empty() {
            fields.push("os".to_string());
        }
        if self.runtime.trim().is_empty() {
            fields.push("runtime".to_string());
        }
        if self.arch.trim().is_empty() {
            fields.push("arch".to_string());
        }
        if self.time_source.trim().is_empty() {
            fields.push("time_source".to_string());
        }
        invalid_unless_empty(fields)
    }
}

/// External data mutation observed by a collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutationPayload {
    /// Mutation type tag (e.g. `"order_created"`).
    #[serde(rename = "type")]
    pub mutation_type: String,
    /// Caller-assigned mutation identifier.
    pub id: String,
    /// System the mutation originated from.
    pub source: String,
    /// Digest of the mutated content, when available.
    #[serde(default)]
    pub hash: String,
    /// Position in an external stream, `"<namespace>:<offset>"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_ref: String,
}

impl TypedPayload for MutationPayload {
    const KIND: RecordKind = RecordKind::Mutation;

    fn validate(&self) -> Result<(), PayloadError> {
        let mut fields = Vec::new();
        if self.mutation_type.trim().is_empty() {
            fields.push("type".to_string());
        }
        if self.id.trim().is_empty() {
            fields.push("id".to_string());
        }
        if self.source.trim().is_empty() {
            fields.push("source".to_string());
        }
        invalid_unless_empty(fields)
    }
}

fn invalid_unless_empty(fields: Vec<String>) -> Result<(), PayloadError> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(PayloadError::Invalid { fields })
    }
}

/// Splits an external ref into its namespace and numeric offset.
///
/// The grammar is `ns ":" offset`; the *last* colon separates, so
/// `"kafka:topic-a:7"` yields namespace `kafka:topic-a` and offset 7. A
/// ref with no colon is all offset with an empty namespace. The offset is
/// `None` when the trailing segment is not a decimal integer.
#[must_use]
pub fn parse_external_ref(value: &str) -> (String, Option<i64>) {
    let value = value.trim();
    if value.is_empty() {
        return (String::new(), None);
    }
    let (namespace, offset_str) = match value.rfind(':') {
        Some(idx) => (&value[..idx], &value[idx + 1..]),
        None => ("", value),
    };
    (namespace.to_string(), offset_str.parse::<i64>().ok())
}
