//! Error types for the ChainPipe decode pipeline.

use thiserror::Error;

/// Errors that can occur while decoding a single payload against a schema.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes do not fit the schema: too short, unknown union
    /// discriminant, invalid bool byte, trailing garbage, and so on.
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// The schema itself cannot be used (undefined reference, duplicate
    /// discriminant, unsupported width for the wire format).
    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// A value handed to the encoder does not match the schema node.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    /// Returns `true` for byte-level mismatches between payload and schema.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

/// Errors from the streaming pipeline.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The upstream block source failed or disconnected. Retrying is the
    /// source's own business; the pipeline surfaces this as-is.
    #[error("Block source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    /// An instruction references a transaction the block does not carry.
    #[error("Transaction {tx_index} not found in block {block_number}")]
    MissingTransaction { block_number: u64, tx_index: u32 },

    /// No explicit offset, no persisted offset, and no start block.
    #[error("No checkpoint available and no start block configured")]
    CheckpointUnavailable,

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("Decode error at block {block_number}, tx {tx_index}, entry {entry_index}: {source}")]
    Decode {
        block_number: u64,
        tx_index: u32,
        entry_index: u32,
        #[source]
        source: DecodeError,
    },
}

impl StreamError {
    pub fn source_unavailable(reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reason: reason.into(),
        }
    }
}
