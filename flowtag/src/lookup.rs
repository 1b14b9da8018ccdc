use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    fs::File,
    hash::{Hash, Hasher},
    io::Read,
    path::Path,
};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};

use crate::error::{FlowTagError, MalformedLookupRow};

/// Display name of the bucket for traffic without a lookup entry.
pub const UNTAGGED: &str = "Untagged";

/// A destination port together with a lowercase protocol keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortProtocol {
    pub port: u16,
    pub protocol: String,
}

impl PortProtocol {
    pub fn new(port: u16, protocol: &str) -> Self {
        Self {
            port,
            protocol: protocol.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// A tag label.
///
/// Tags compare, hash and sort by their trimmed lowercase form, so `sv_P1`
/// and `SV_p1` are the same tag. The display form is kept as written.
#[derive(Debug, Clone)]
pub struct Tag {
    key: String,
    display: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        let display = name.trim();
        let key = display.to_lowercase();
        if key == UNTAGGED.to_lowercase() {
            return Self::untagged();
        }
        Self {
            key,
            display: display.to_string(),
        }
    }

    pub fn untagged() -> Self {
        Self {
            key: UNTAGGED.to_lowercase(),
            display: UNTAGGED.to_string(),
        }
    }

    pub fn is_untagged(&self) -> bool {
        self.key == UNTAGGED.to_lowercase()
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Maps `(destination port, protocol)` pairs to tags. Several pairs may
/// share a tag.
///
/// When the source file repeats a pair, the later row replaces the earlier
/// tag. A tag is displayed with the spelling of its earliest row that still
/// maps a pair; rows replaced by a later duplicate do not count.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    entries: HashMap<PortProtocol, Tag>,
}

impl LookupIndex {
    pub fn from_path(path: &Path, detect_header: bool) -> Result<Self, FlowTagError> {
        info!("Loading lookup table from {}", path.display());
        let file = File::open(path).map_err(|source| FlowTagError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, detect_header)
    }

    /// Builds the index from `dstport,protocol,tag` rows.
    ///
    /// ### Arguments
    ///
    /// * `reader` - Source of the CSV text.
    /// * `detect_header` - Treat the first row as a header when its port
    ///   column is not a number. When false every row is data.
    ///
    /// ### Returns
    ///
    /// The index, or an error if the underlying reader fails. Rows that do
    /// not validate are logged and skipped.
    pub fn from_reader<R: Read>(reader: R, detect_header: bool) -> Result<Self, FlowTagError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        // Tags as written on the row that set each surviving mapping
        let mut entries: HashMap<PortProtocol, (u64, Tag)> = HashMap::new();

        for (idx, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        "Lookup table error: {}",
                        MalformedLookupRow::Unreadable(e.to_string())
                    );
                    continue;
                }
            };
            let line = record.position().map_or(idx as u64 + 1, |p| p.line());

            if idx == 0 && detect_header && is_header(&record) {
                info!("Lookup table line {} read as header: {:?}", line, record);
                continue;
            }

            let (key, tag) = match parse_lookup_row(&record) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Lookup table error at line {}: {} - {:?}", line, e, record);
                    continue;
                }
            };

            if let Some((_, previous)) = entries.get(&key) {
                if *previous != tag {
                    warn!(
                        "Lookup table line {}: {} remapped from {} to {}",
                        line, key, previous, tag
                    );
                }
            }
            debug!("Added entry to lookup table: {} -> {}", key, tag);
            entries.insert(key, (line, tag));
        }

        let entries = with_first_spellings(entries);
        info!("Lookup table loaded with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn get(&self, key: &PortProtocol) -> Option<&Tag> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every `(port, protocol)` pair present in the index.
    pub fn keys(&self) -> impl Iterator<Item = &PortProtocol> {
        self.entries.keys()
    }

    /// Every tag some pair maps to, possibly repeated.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.entries.values()
    }
}

/// A first row whose port column is not a number, like `dstport,protocol,tag`.
fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map_or(false, |port| port.trim().parse::<u64>().is_err())
}

/// Gives every tag the spelling of its earliest row among the mappings that
/// survived last-write-wins.
fn with_first_spellings(
    entries: HashMap<PortProtocol, (u64, Tag)>,
) -> HashMap<PortProtocol, Tag> {
    let mut spellings: HashMap<String, (u64, Tag)> = HashMap::new();
    for (line, tag) in entries.values() {
        match spellings.get(&tag.key) {
            Some((first, _)) if *first <= *line => {}
            _ => {
                spellings.insert(tag.key.clone(), (*line, tag.clone()));
            }
        }
    }

    entries
        .into_iter()
        .map(|(key, (_, tag))| {
            let tag = spellings
                .get(&tag.key)
                .map_or(tag.clone(), |(_, first)| first.clone());
            (key, tag)
        })
        .collect()
}

/// Validates one `dstport,protocol,tag` row.
pub(crate) fn parse_lookup_row(
    record: &StringRecord,
) -> Result<(PortProtocol, Tag), MalformedLookupRow> {
    if record.len() != 3 {
        return Err(MalformedLookupRow::ColumnCount(record.len()));
    }

    let port = record[0].trim();
    let port = port
        .parse::<u16>()
        .map_err(|_| MalformedLookupRow::Port(port.to_string()))?;

    let protocol = record[1].trim();
    if protocol.is_empty() {
        return Err(MalformedLookupRow::EmptyProtocol);
    }

    let tag = record[2].trim();
    if tag.is_empty() {
        return Err(MalformedLookupRow::EmptyTag);
    }

    Ok((PortProtocol::new(port, protocol), Tag::new(tag)))
}
