use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::{FlowTagError, MalformedProtocolRow};

/// Name given to protocol numbers that are absent from the table.
pub const UNASSIGNED: &str = "unassigned";

/// IANA assigned internet protocol numbers, keyword column only.
const IANA_PROTOCOL_NUMBERS: &str = include_str!("../data/protocol-numbers.csv");

#[derive(Debug, Deserialize)]
struct ProtocolRow {
    decimal: String,
    #[serde(default)]
    keyword: String,
}

/// Maps protocol numbers to lowercase protocol keywords (`6` -> `tcp`).
#[derive(Debug, Clone, Default)]
pub struct ProtocolTable {
    names: BTreeMap<u8, String>,
}

impl ProtocolTable {
    /// Builds the table compiled into the binary.
    pub fn iana() -> Result<Self, FlowTagError> {
        Self::from_reader(IANA_PROTOCOL_NUMBERS.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self, FlowTagError> {
        info!("Loading protocol table from {}", path.display());
        let file = File::open(path).map_err(|source| FlowTagError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Reads an IANA style CSV with at least `Decimal` and `Keyword` columns.
    ///
    /// Rows with a range or non numeric `Decimal`, or an empty `Keyword`, are
    /// skipped with a warning. Only I/O failures and a missing column are fatal.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FlowTagError> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = normalize_headers(rdr.headers()?);
        for column in ["decimal", "keyword"] {
            if !headers.iter().any(|h| h == column) {
                return Err(FlowTagError::MissingColumn { column });
            }
        }

        let mut names = BTreeMap::new();
        for result in rdr.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        "Protocol table: skipping row: {}",
                        MalformedProtocolRow::Unreadable(e.to_string())
                    );
                    continue;
                }
            };
            let line = record.position().map_or(0, |p| p.line());

            let parsed = record
                .deserialize::<ProtocolRow>(Some(&headers))
                .map_err(|e| MalformedProtocolRow::Unreadable(e.to_string()))
                .and_then(|row| parse_protocol_row(&row));

            match parsed {
                Ok((number, name)) => {
                    debug!("Protocol {} -> {}", number, name);
                    names.insert(number, name);
                }
                Err(e) => warn!("Protocol table error at line {}: {} - {:?}", line, e, record),
            }
        }

        info!("Protocol table loaded with {} entries", names.len());
        Ok(Self { names })
    }

    /// Resolves a protocol number, falling back to [`UNASSIGNED`].
    pub fn resolve(&self, number: u8) -> &str {
        self.names.get(&number).map_or(UNASSIGNED, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Entries in ascending protocol number order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.names.iter().map(|(number, name)| (*number, name.as_str()))
    }
}

fn normalize_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|header| header.trim().to_ascii_lowercase())
        .collect()
}

fn parse_protocol_row(row: &ProtocolRow) -> Result<(u8, String), MalformedProtocolRow> {
    let decimal = row.decimal.trim();
    let number = decimal
        .parse::<u8>()
        .map_err(|_| MalformedProtocolRow::Number(decimal.to_string()))?;

    let keyword = row.keyword.trim();
    if keyword.is_empty() {
        return Err(MalformedProtocolRow::EmptyKeyword(number));
    }

    Ok((number, keyword.to_lowercase()))
}
