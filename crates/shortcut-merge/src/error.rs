//! Error types for bplist encoding/decoding, request validation, and merging.

use thiserror::Error;

/// Broad categories of decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Invalid magic/version
    InvalidMagicOrVersion,
    /// E002: Reference or offset out of bounds
    OutOfBounds,
    /// E003: Invalid string encoding
    InvalidString,
    /// E004: Malformed trailer/marker/length
    MalformedEncoding,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMagicOrVersion => "E001",
            ErrorCode::OutOfBounds => "E002",
            ErrorCode::InvalidString => "E003",
            ErrorCode::MalformedEncoding => "E004",
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === E001: Invalid magic/version ===
    #[error("[E001] invalid magic bytes: expected bplist, found {found:?}")]
    InvalidMagic { found: [u8; 6] },

    #[error("[E001] unsupported version: {version:?}")]
    UnsupportedVersion { version: [u8; 2] },

    // === E002: Out of bounds ===
    #[error("[E002] object reference {index} out of bounds (object count: {count})")]
    ReferenceOutOfBounds { index: u64, count: u64 },

    #[error("[E002] object offset {offset} outside object area (ends at {limit})")]
    OffsetOutOfBounds { offset: u64, limit: u64 },

    // === E003: Invalid string encoding ===
    #[error("[E003] non-ASCII byte in ASCII string at offset {offset}")]
    InvalidAscii { offset: usize },

    #[error("[E003] invalid UTF-16 string at offset {offset}")]
    InvalidUtf16 { offset: usize },

    // === E004: Malformed encoding ===
    #[error("[E004] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[E004] invalid trailer: {context}")]
    InvalidTrailer { context: &'static str },

    #[error("[E004] unknown object marker 0x{marker:02x} at offset {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    #[error("[E004] invalid {kind} width {width} bytes")]
    InvalidWidth { kind: &'static str, width: usize },

    #[error("[E004] invalid length for {context}: {len}")]
    InvalidLength { context: &'static str, len: i128 },

    #[error("[E004] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E004] dictionary key at reference {index} is not a string")]
    NonStringKey { index: u64 },
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidMagic { .. } | DecodeError::UnsupportedVersion { .. } => {
                ErrorCode::InvalidMagicOrVersion
            }
            DecodeError::ReferenceOutOfBounds { .. } | DecodeError::OffsetOutOfBounds { .. } => {
                ErrorCode::OutOfBounds
            }
            DecodeError::InvalidAscii { .. } | DecodeError::InvalidUtf16 { .. } => {
                ErrorCode::InvalidString
            }
            _ => ErrorCode::MalformedEncoding,
        }
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("object reference {index} points outside the graph (size: {len})")]
    DanglingReference { index: usize, len: usize },

    #[error("layout invariant violated: {context}")]
    LayoutInvariant { context: &'static str },
}

/// Error while converting between a [`Plist`](crate::model::Plist) graph and an owned tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("object {index} is part of a reference cycle")]
    Cycle { index: usize },

    #[error("object reference {index} points outside the graph (size: {len})")]
    DanglingReference { index: usize, len: usize },

    #[error("graph nesting exceeds maximum depth {max}")]
    TooDeep { max: usize },
}

/// Error in the shape of a merge request, raised before any payload is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed request: {0}")]
    Json(String),

    #[error("workflow {workflow:?}: {message}")]
    MalformedWorkflow { workflow: String, message: String },

    #[error("workflow {workflow:?}: missing required field `{field}`")]
    MissingField { workflow: String, field: &'static str },

    #[error("workflow {workflow:?}: field `{field}` is not valid base64")]
    InvalidBase64 { workflow: String, field: &'static str },

    #[error("workflow {workflow:?}: unrecognised excludedBy value {value:?}")]
    InvalidSentinel { workflow: String, value: String },

    #[error("workflow {workflow:?}: field `{field}` must be non-negative, got {value}")]
    NegativeIndex {
        workflow: String,
        field: &'static str,
        value: i64,
    },
}

/// Error that aborts the merge of a single workflow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("failed to decode workflow: {0}")]
    Workflow(DecodeError),

    #[error("failed to decode actions of insert {insert}: {source}")]
    Insert {
        insert: i64,
        #[source]
        source: DecodeError,
    },

    #[error("workflow has no WFWorkflowActions array")]
    MissingActions,

    #[error("insert {insert} payload is neither an action array nor a workflow")]
    InvalidActions { insert: i64 },

    #[error("malformed object graph: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to encode merged workflow: {0}")]
    Encode(#[from] EncodeError),
}
