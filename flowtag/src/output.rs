use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use chrono::Local;
use csv::WriterBuilder;
use log::{debug, info};

use crate::{args::ExportMethodType, classifier::Aggregate, error::FlowTagError};

pub const TAG_SECTION: &str = "Tag Counts:";
pub const PORT_PROTOCOL_SECTION: &str = "Port/Protocol Combination Counts:";

pub struct ReportWriter {
    export_type: ExportMethodType,
    file_path: Option<PathBuf>,
}

impl ReportWriter {
    pub fn new(export_type: ExportMethodType, file_path: Option<PathBuf>) -> Self {
        ReportWriter {
            export_type,
            file_path,
        }
    }

    /// Renders the whole report before touching the destination, so a failed
    /// render never leaves a partial file behind.
    ///
    /// Returns the path written to, if the report went to a file.
    pub fn write(&self, aggregate: &Aggregate) -> Result<Option<PathBuf>, FlowTagError> {
        let report = render_report(aggregate)?;
        debug!("Rendered report of {} bytes", report.len());

        match self.export_type {
            ExportMethodType::Csv => {
                let path = self.file_path.clone().unwrap_or_else(default_export_path);
                fs::write(&path, &report)?;
                info!(
                    "Tag counts and port/protocol counts written to {}",
                    path.display()
                );
                Ok(Some(path))
            }
            ExportMethodType::Print => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&report)?;
                stdout.flush()?;
                Ok(None)
            }
        }
    }
}

/// `output_results_<YYYYmmddHHMMSS>.csv` in the working directory.
pub fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "output_results_{}.csv",
        Local::now().format("%Y%m%d%H%M%S")
    ))
}

/// Serializes both count tables as two CSV sections separated by an empty line.
pub fn render_report(aggregate: &Aggregate) -> Result<Vec<u8>, FlowTagError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record([TAG_SECTION])?;
    writer.write_record(["Tag", "Count"])?;
    for row in aggregate.tag_rows() {
        writer.serialize(row)?;
    }

    // csv writes an empty record as `""`, so the separator goes in raw
    writer.flush()?;
    let mut buf = writer
        .into_inner()
        .map_err(|e| FlowTagError::Io(e.into_error()))?;
    buf.push(b'\n');
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(buf);

    writer.write_record([PORT_PROTOCOL_SECTION])?;
    writer.write_record(["Port", "Protocol", "Count"])?;
    for row in aggregate.port_protocol_rows() {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| FlowTagError::Io(e.into_error()))
}
