use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that abort a run. Everything per-line or per-row is recovered
/// locally and never shows up here.
#[derive(Debug, Error)]
pub enum FlowTagError {
    /// An input file is missing or cannot be opened.
    #[error("cannot read {}: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A reference CSV lacks one of the columns we index by.
    #[error("missing column {column:?} in header")]
    MissingColumn { column: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why a flow log line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid destination port {0:?}")]
    DestinationPort(String),

    #[error("invalid protocol number {0:?}")]
    ProtocolNumber(String),

    #[error("unsupported version {0:?}")]
    Version(String),

    #[error("invalid account id {0:?}")]
    AccountId(String),

    #[error("invalid interface id {0:?}")]
    InterfaceId(String),

    #[error("invalid IP address {0:?}")]
    Address(String),

    #[error("invalid source port {0:?}")]
    SourcePort(String),

    #[error("invalid packet or byte count {0:?}")]
    Counter(String),

    #[error("invalid timestamps {start:?} -> {end:?}")]
    Timestamps { start: String, end: String },

    #[error("invalid action {0:?}")]
    Action(String),

    #[error("invalid log status {0:?}")]
    LogStatus(String),
}

/// Why a row of the lookup table was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedLookupRow {
    #[error("expected 3 columns, found {0}")]
    ColumnCount(usize),

    #[error("invalid port number {0:?}")]
    Port(String),

    #[error("empty protocol")]
    EmptyProtocol,

    #[error("empty tag")]
    EmptyTag,

    #[error("unreadable row: {0}")]
    Unreadable(String),
}

/// Why a row of the protocol reference table was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedProtocolRow {
    #[error("invalid protocol number {0:?}")]
    Number(String),

    #[error("empty keyword for protocol {0}")]
    EmptyKeyword(u8),

    #[error("unreadable row: {0}")]
    Unreadable(String),
}
