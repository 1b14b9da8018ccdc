use std::{net::IpAddr, str::FromStr};

use log::debug;
use strum_macros::{Display, EnumString};

use crate::{error::MalformedRecord, lookup::PortProtocol, protocols::ProtocolTable};

/// Number of whitespace separated fields in a version 2 flow log line.
pub const FLOW_LOG_FIELDS: usize = 14;

const VERSION: usize = 0;
const ACCOUNT_ID: usize = 1;
const INTERFACE_ID: usize = 2;
const SRCADDR: usize = 3;
const DSTADDR: usize = 4;
const SRCPORT: usize = 5;
const DSTPORT: usize = 6;
const PROTOCOL: usize = 7;
const PACKETS: usize = 8;
const BYTES: usize = 9;
const START: usize = 10;
const END: usize = 11;
const ACTION: usize = 12;
const LOG_STATUS: usize = 13;

/// How thoroughly a flow log line is checked before it is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Field count, destination port and protocol number only.
    #[default]
    Lenient,
    /// Every field of the version 2 layout.
    Strict,
}

impl Validation {
    pub fn parse_line(self, line: &str) -> Result<FlowRecord, MalformedRecord> {
        match self {
            Validation::Lenient => FlowRecord::parse(line),
            Validation::Strict => FlowLogEntry::parse(line).map(|entry| {
                debug!("{}", entry);
                FlowRecord::from(entry)
            }),
        }
    }
}

/// The part of a flow log line needed for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub destination_port: u16,
    pub protocol: u8,
}

impl FlowRecord {
    /// Parses a line, checking only what classification depends on.
    pub fn parse(line: &str) -> Result<Self, MalformedRecord> {
        let fields = split_fields(line)?;
        Ok(Self {
            destination_port: parse_port(fields[DSTPORT])
                .ok_or_else(|| MalformedRecord::DestinationPort(fields[DSTPORT].to_string()))?,
            protocol: parse_protocol(fields[PROTOCOL])?,
        })
    }

    /// Resolves the protocol number into the key used by the lookup index.
    pub fn port_protocol(&self, protocols: &ProtocolTable) -> PortProtocol {
        PortProtocol::new(self.destination_port, protocols.resolve(self.protocol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum FlowAction {
    #[strum(serialize = "ACCEPT")]
    Accept,
    #[strum(serialize = "REJECT")]
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum LogStatus {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "NODATA")]
    NoData,
    #[strum(serialize = "SKIPDATA")]
    SkipData,
}

/// A fully validated version 2 flow log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLogEntry {
    pub account_id: String,
    pub interface_id: String,
    pub source_ip: IpAddr,
    pub destination_ip: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
    pub protocol: u8,
    pub packets: u64,
    pub bytes: u64,
    pub start: u64,
    pub end: u64,
    pub action: FlowAction,
    pub log_status: LogStatus,
}

impl FlowLogEntry {
    /// Parses a line and checks every field, in layout order.
    pub fn parse(line: &str) -> Result<Self, MalformedRecord> {
        let fields = split_fields(line)?;

        if fields[VERSION] != "2" {
            return Err(MalformedRecord::Version(fields[VERSION].to_string()));
        }

        let account_id = fields[ACCOUNT_ID];
        if account_id.len() != 12 || !account_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedRecord::AccountId(account_id.to_string()));
        }

        let interface_id = fields[INTERFACE_ID];
        if !interface_id.starts_with("eni-") || interface_id.len() != 12 {
            return Err(MalformedRecord::InterfaceId(interface_id.to_string()));
        }

        let source_ip = parse_address(fields[SRCADDR])?;
        let destination_ip = parse_address(fields[DSTADDR])?;

        let source_port = parse_port(fields[SRCPORT])
            .ok_or_else(|| MalformedRecord::SourcePort(fields[SRCPORT].to_string()))?;
        let destination_port = parse_port(fields[DSTPORT])
            .ok_or_else(|| MalformedRecord::DestinationPort(fields[DSTPORT].to_string()))?;
        let protocol = parse_protocol(fields[PROTOCOL])?;

        let packets = parse_counter(fields[PACKETS])?;
        let bytes = parse_counter(fields[BYTES])?;

        let timestamps_error = || MalformedRecord::Timestamps {
            start: fields[START].to_string(),
            end: fields[END].to_string(),
        };
        let start = parse_digits(fields[START]).ok_or_else(timestamps_error)?;
        let end = parse_digits(fields[END]).ok_or_else(timestamps_error)?;
        if end < start {
            return Err(timestamps_error());
        }

        let action = FlowAction::from_str(fields[ACTION])
            .map_err(|_| MalformedRecord::Action(fields[ACTION].to_string()))?;
        let log_status = LogStatus::from_str(fields[LOG_STATUS])
            .map_err(|_| MalformedRecord::LogStatus(fields[LOG_STATUS].to_string()))?;

        Ok(Self {
            account_id: account_id.to_string(),
            interface_id: interface_id.to_string(),
            source_ip,
            destination_ip,
            source_port,
            destination_port,
            protocol,
            packets,
            bytes,
            start,
            end,
            action,
            log_status,
        })
    }
}

impl std::fmt::Display for FlowLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}:{} -> {}:{} proto {} {} packets {} bytes {}..{} {} {}",
            self.account_id,
            self.interface_id,
            self.source_ip,
            self.source_port,
            self.destination_ip,
            self.destination_port,
            self.protocol,
            self.packets,
            self.bytes,
            self.start,
            self.end,
            self.action,
            self.log_status
        )
    }
}

impl From<FlowLogEntry> for FlowRecord {
    fn from(entry: FlowLogEntry) -> Self {
        Self {
            destination_port: entry.destination_port,
            protocol: entry.protocol,
        }
    }
}

/// Splits a line into exactly [`FLOW_LOG_FIELDS`] fields or rejects it.
fn split_fields(line: &str) -> Result<[&str; FLOW_LOG_FIELDS], MalformedRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    fields
        .try_into()
        .map_err(|fields: Vec<&str>| MalformedRecord::FieldCount {
            expected: FLOW_LOG_FIELDS,
            found: fields.len(),
        })
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_port(field: &str) -> Option<u16> {
    parse_digits(field).and_then(|port| u16::try_from(port).ok())
}

fn parse_protocol(field: &str) -> Result<u8, MalformedRecord> {
    parse_digits(field)
        .and_then(|number| u8::try_from(number).ok())
        .ok_or_else(|| MalformedRecord::ProtocolNumber(field.to_string()))
}

fn parse_counter(field: &str) -> Result<u64, MalformedRecord> {
    parse_digits(field).ok_or_else(|| MalformedRecord::Counter(field.to_string()))
}

fn parse_address(field: &str) -> Result<IpAddr, MalformedRecord> {
    field
        .parse()
        .map_err(|_| MalformedRecord::Address(field.to_string()))
}
