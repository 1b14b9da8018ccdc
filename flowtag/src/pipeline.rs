use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    time::Instant,
};

use log::{debug, info, warn};

use crate::{
    args::{OutputConfig, RunConfig},
    classifier::{Aggregate, Classifier},
    error::FlowTagError,
    lookup::LookupIndex,
    output::ReportWriter,
    protocols::ProtocolTable,
    records::flow_record::Validation,
};

/// Line accounting for one pass over a flow log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines: u64,
    pub classified: u64,
    pub malformed: u64,
}

/// Reference tables and validation mode for a run.
pub struct Pipeline {
    protocols: ProtocolTable,
    index: LookupIndex,
    validation: Validation,
}

impl Pipeline {
    pub fn new(protocols: ProtocolTable, index: LookupIndex, validation: Validation) -> Self {
        Self {
            protocols,
            index,
            validation,
        }
    }

    /// Loads the protocol table and the lookup index named by `config`.
    pub fn from_config(config: &RunConfig) -> Result<Self, FlowTagError> {
        let protocols = match &config.protocols {
            Some(path) => ProtocolTable::from_path(path)?,
            None => ProtocolTable::iana()?,
        };
        let index = LookupIndex::from_path(&config.lookup_table, !config.no_lookup_header)?;
        let validation = if config.strict {
            Validation::Strict
        } else {
            Validation::Lenient
        };
        debug!(
            "Using {} protocol numbers, {} lookup entries, {:?} validation",
            protocols.len(),
            index.len(),
            validation
        );

        Ok(Self::new(protocols, index, validation))
    }

    pub fn process_path(&self, path: &Path) -> Result<(Aggregate, RunStats), FlowTagError> {
        info!("Processing flow logs from {}", path.display());
        let file = File::open(path).map_err(|source| FlowTagError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        self.process(BufReader::new(file))
    }

    /// Classifies every line of a flow log.
    ///
    /// Malformed lines, blank ones included, are logged and skipped. Lines
    /// that are not valid UTF-8 are decoded lossily and then fail validation
    /// like any other bad line. Only a failing reader aborts the pass.
    pub fn process<R: BufRead>(&self, reader: R) -> Result<(Aggregate, RunStats), FlowTagError> {
        let classifier = Classifier::new(&self.index);
        let mut aggregate = Aggregate::seeded(&self.index);
        let mut stats = RunStats::default();

        for (idx, raw) in reader.split(b'\n').enumerate() {
            let raw = raw?;
            let line_number = idx + 1;
            let line = String::from_utf8_lossy(&raw);
            stats.lines += 1;

            match self.validation.parse_line(&line) {
                Ok(record) => {
                    classifier.classify(record.port_protocol(&self.protocols), &mut aggregate);
                    stats.classified += 1;
                }
                Err(e) => {
                    warn!(
                        "Flow log error on line {}: {} - {:?}",
                        line_number,
                        e,
                        line.trim()
                    );
                    stats.malformed += 1;
                }
            }
        }

        Ok((aggregate, stats))
    }
}

/// Loads inputs, classifies the flow log and writes the report.
///
/// Every input is read in full before the report is written, so a missing
/// or unreadable input never leaves an output file behind.
pub fn run(config: &RunConfig, output: &OutputConfig) -> anyhow::Result<RunStats> {
    let start = Instant::now();

    let pipeline = Pipeline::from_config(config)?;
    let (aggregate, stats) = pipeline.process_path(&config.flow_logs)?;

    info!(
        "Processed {} lines: {} classified, {} malformed, {} in tag counts",
        stats.lines,
        stats.classified,
        stats.malformed,
        aggregate.total()
    );

    debug!("Writing report via {}", output.output);
    ReportWriter::new(output.output, output.export_path.clone()).write(&aggregate)?;

    info!("Duration: {:.4} seconds", start.elapsed().as_secs_f64());
    Ok(stats)
}
