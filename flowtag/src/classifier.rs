use std::collections::BTreeMap;

use log::debug;

use crate::lookup::{LookupIndex, PortProtocol, Tag};

/// Tag and port/protocol counts accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    tag_counts: BTreeMap<Tag, u64>,
    port_protocol_counts: BTreeMap<PortProtocol, u64>,
}

impl Aggregate {
    /// Starts every tag and pair known to the index, plus the untagged
    /// bucket, at zero so they are reported even if never observed.
    pub fn seeded(index: &LookupIndex) -> Self {
        let mut tag_counts: BTreeMap<Tag, u64> =
            index.tags().cloned().map(|tag| (tag, 0)).collect();
        tag_counts.insert(Tag::untagged(), 0);

        let port_protocol_counts = index.keys().cloned().map(|key| (key, 0)).collect();

        Self {
            tag_counts,
            port_protocol_counts,
        }
    }

    /// Count for a tag, matched case-insensitively.
    #[cfg(test)]
    pub fn tag_count(&self, tag: &str) -> u64 {
        self.tag_counts.get(&Tag::new(tag)).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn port_protocol_count(&self, port: u16, protocol: &str) -> Option<u64> {
        self.port_protocol_counts
            .get(&PortProtocol::new(port, protocol))
            .copied()
    }

    /// Number of records counted, which is also the sum of all tag counts.
    pub fn total(&self) -> u64 {
        self.tag_counts.values().sum()
    }

    /// Tag rows sorted by tag, with the untagged bucket last.
    pub fn tag_rows(&self) -> Vec<(&str, u64)> {
        let (untagged, tagged): (Vec<_>, Vec<_>) = self
            .tag_counts
            .iter()
            .partition(|(tag, _)| tag.is_untagged());

        tagged
            .into_iter()
            .chain(untagged)
            .map(|(tag, count)| (tag.display(), *count))
            .collect()
    }

    /// Port/protocol rows sorted by port, then protocol.
    pub fn port_protocol_rows(&self) -> Vec<(u16, &str, u64)> {
        self.port_protocol_counts
            .iter()
            .map(|(key, count)| (key.port, key.protocol.as_str(), *count))
            .collect()
    }
}

/// Matches resolved flow records against the lookup index.
pub struct Classifier<'a> {
    index: &'a LookupIndex,
}

impl<'a> Classifier<'a> {
    pub fn new(index: &'a LookupIndex) -> Self {
        Self { index }
    }

    /// Counts one record under exactly one tag and under its port/protocol
    /// pair, creating the pair if it was not in the lookup table.
    ///
    /// Returns the tag the record was counted under.
    pub fn classify(&self, key: PortProtocol, aggregate: &mut Aggregate) -> Tag {
        let tag = self.index.get(&key).cloned().unwrap_or_else(Tag::untagged);
        debug!("Classified {} as {}", key, tag);

        *aggregate.tag_counts.entry(tag.clone()).or_insert(0) += 1;
        *aggregate.port_protocol_counts.entry(key).or_insert(0) += 1;

        tag
    }
}
