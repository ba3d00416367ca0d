//! Reconciliation reporter
//!
//! Routes report records into four append-only streams. The errors stream
//! is written and flushed as each error arrives, so a run that dies halfway
//! still leaves every error seen so far on disk. The other three streams are
//! buffered and written once, sorted by object name, when the run finishes.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tablerecon_core::{
    ArtifactEntry, CatalogOnlyRecord, ComparisonKey, ObjectDiff, OutputConfig, ReportRecord,
    RunReport, RunSummary, StreamKind,
};

/// Errors that can occur while persisting records
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sink error: {0}")]
    Sink(String),
}

/// Destination of one report stream
pub trait ReportSink: Send {
    /// Append one record
    fn write_record(&mut self, record: &ReportRecord) -> Result<(), ReportError>;

    /// Make every appended record durable
    fn flush(&mut self) -> Result<(), ReportError>;
}

/// CSV file sink
///
/// The file is truncated and the header row written on creation, so a
/// stream with no records still produces a valid artifact.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvSink {
    pub fn create(path: &Path, header: &[&str]) -> Result<Self, ReportError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;

        writer.write_record(header)?;
        writer.flush().map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for CsvSink {
    fn write_record(&mut self, record: &ReportRecord) -> Result<(), ReportError> {
        self.writer.write_record(record.fields())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.writer.flush().map_err(|source| ReportError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ReportRecord>>>,
    flushed: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written so far
    pub fn records(&self) -> Vec<ReportRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records that had been written at the time of the last flush
    pub fn flushed(&self) -> usize {
        self.flushed.load(Ordering::SeqCst)
    }
}

impl ReportSink for MemorySink {
    fn write_record(&mut self, record: &ReportRecord) -> Result<(), ReportError> {
        self.records
            .lock()
            .map_err(|_| ReportError::Sink("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        let len = self
            .records
            .lock()
            .map_err(|_| ReportError::Sink("memory sink lock poisoned".to_string()))?
            .len();
        self.flushed.store(len, Ordering::SeqCst);
        Ok(())
    }
}

/// One sink per stream
pub struct ReportSinks {
    pub only_in_left: Box<dyn ReportSink>,
    pub only_in_right: Box<dyn ReportSink>,
    pub mismatches: Box<dyn ReportSink>,
    pub errors: Box<dyn ReportSink>,
}

impl ReportSinks {
    fn get_mut(&mut self, stream: StreamKind) -> &mut dyn ReportSink {
        match stream {
            StreamKind::OnlyInLeft => self.only_in_left.as_mut(),
            StreamKind::OnlyInRight => self.only_in_right.as_mut(),
            StreamKind::Mismatches => self.mismatches.as_mut(),
            StreamKind::Errors => self.errors.as_mut(),
        }
    }
}

/// Collects the records of one run into the four streams
pub struct Reporter {
    left: String,
    right: String,
    sinks: ReportSinks,

    /// Buffered records of the streams written at finish
    pending: BTreeMap<StreamKind, Vec<ReportRecord>>,

    /// Records written or buffered per stream
    counts: BTreeMap<StreamKind, usize>,

    /// Artifact locations, when writing to files
    paths: BTreeMap<StreamKind, PathBuf>,
    run_report_path: Option<PathBuf>,
}

impl Reporter {
    /// Create a reporter over arbitrary sinks
    pub fn new(left: impl Into<String>, right: impl Into<String>, sinks: ReportSinks) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            sinks,
            pending: BTreeMap::new(),
            counts: StreamKind::ALL.iter().map(|stream| (*stream, 0)).collect(),
            paths: BTreeMap::new(),
            run_report_path: None,
        }
    }

    /// Create a reporter writing CSV artifacts into the output directory
    ///
    /// Existing artifacts with the same names are truncated.
    pub fn create(
        output: &OutputConfig,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Result<Self, ReportError> {
        std::fs::create_dir_all(&output.directory).map_err(|source| ReportError::Io {
            path: output.directory.clone(),
            source,
        })?;

        let paths: BTreeMap<StreamKind, PathBuf> = StreamKind::ALL
            .iter()
            .map(|stream| (*stream, output.path_for(*stream)))
            .collect();

        let open = |stream: StreamKind| -> Result<Box<dyn ReportSink>, ReportError> {
            Ok(Box::new(CsvSink::create(&paths[&stream], stream.header())?))
        };

        let sinks = ReportSinks {
            only_in_left: open(StreamKind::OnlyInLeft)?,
            only_in_right: open(StreamKind::OnlyInRight)?,
            mismatches: open(StreamKind::Mismatches)?,
            errors: open(StreamKind::Errors)?,
        };

        tracing::debug!(directory = %output.directory.display(), "Opened report artifacts");

        let mut reporter = Self::new(left, right, sinks);
        reporter.paths = paths;
        reporter.run_report_path = output.run_report_path();
        Ok(reporter)
    }

    /// Record objects present only in the left container
    pub fn record_only_left<'a>(&mut self, keys: impl IntoIterator<Item = &'a ComparisonKey>) {
        let container = self.left.clone();
        for key in keys {
            self.buffer(
                StreamKind::OnlyInLeft,
                ReportRecord::CatalogOnly(CatalogOnlyRecord::new(key, &container)),
            );
        }
    }

    /// Record objects present only in the right container
    pub fn record_only_right<'a>(&mut self, keys: impl IntoIterator<Item = &'a ComparisonKey>) {
        let container = self.right.clone();
        for key in keys {
            self.buffer(
                StreamKind::OnlyInRight,
                ReportRecord::CatalogOnly(CatalogOnlyRecord::new(key, &container)),
            );
        }
    }

    /// Record the outcomes of one compared object
    ///
    /// Errors are persisted before this returns; mismatches are buffered.
    pub fn record_diff(&mut self, diff: &ObjectDiff) -> Result<(), ReportError> {
        for outcome in &diff.outcomes {
            match ReportRecord::from_outcome(&diff.key, outcome) {
                Some(record @ ReportRecord::Error(_)) => {
                    let sink = self.sinks.get_mut(StreamKind::Errors);
                    sink.write_record(&record)?;
                    sink.flush()?;
                    *self.counts.entry(StreamKind::Errors).or_default() += 1;
                }
                Some(record) => self.buffer(StreamKind::Mismatches, record),
                None => {}
            }
        }
        Ok(())
    }

    /// Number of records routed to a stream so far
    pub fn count(&self, stream: StreamKind) -> usize {
        self.counts.get(&stream).copied().unwrap_or(0)
    }

    /// Write the buffered streams and the run report
    pub fn finish(mut self, summary: &RunSummary) -> Result<RunReport, ReportError> {
        for (stream, mut records) in std::mem::take(&mut self.pending) {
            records.sort_by_key(|record| record.fields());
            let sink = self.sinks.get_mut(stream);
            for record in &records {
                sink.write_record(record)?;
            }
        }

        for stream in StreamKind::ALL {
            self.sinks.get_mut(stream).flush()?;
        }

        let artifacts: Vec<ArtifactEntry> = self
            .paths
            .iter()
            .map(|(stream, path)| ArtifactEntry {
                stream: *stream,
                path: path.display().to_string(),
                records: self.count(*stream),
            })
            .collect();

        for artifact in &artifacts {
            tracing::info!(stream = %artifact.stream, path = %artifact.path, records = artifact.records, "Wrote artifact");
        }

        let report = RunReport::new(summary.clone(), artifacts);

        if let Some(path) = &self.run_report_path {
            report.save_to_file(path).map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "Wrote run report");
        }

        Ok(report)
    }

    fn buffer(&mut self, stream: StreamKind, record: ReportRecord) {
        self.pending.entry(stream).or_default().push(record);
        *self.counts.entry(stream).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tablerecon_core::{ComparisonOutcome, Direction};

    struct MemorySinks {
        only_in_left: MemorySink,
        only_in_right: MemorySink,
        mismatches: MemorySink,
        errors: MemorySink,
    }

    fn memory_reporter() -> (Reporter, MemorySinks) {
        let memory = MemorySinks {
            only_in_left: MemorySink::new(),
            only_in_right: MemorySink::new(),
            mismatches: MemorySink::new(),
            errors: MemorySink::new(),
        };
        let sinks = ReportSinks {
            only_in_left: Box::new(memory.only_in_left.clone()),
            only_in_right: Box::new(memory.only_in_right.clone()),
            mismatches: Box::new(memory.mismatches.clone()),
            errors: Box::new(memory.errors.clone()),
        };
        (Reporter::new("PROD", "DEV", sinks), memory)
    }

    fn key(name: &str) -> ComparisonKey {
        ComparisonKey::new("SALES", name)
    }

    fn errored(name: &str) -> ObjectDiff {
        ObjectDiff::new(
            key(name),
            vec![ComparisonOutcome::Errored {
                direction: Direction::LeftMinusRight,
                query: format!("q {}", name),
                error: "boom".to_string(),
            }],
        )
    }

    fn mismatched(name: &str, row_count: u64) -> ObjectDiff {
        ObjectDiff::new(
            key(name),
            vec![ComparisonOutcome::Mismatched {
                direction: Direction::RightMinusLeft,
                row_count,
                query: format!("q {}", name),
            }],
        )
    }

    #[test]
    fn test_errors_are_flushed_immediately() {
        let (mut reporter, memory) = memory_reporter();

        reporter.record_diff(&errored("A")).unwrap();
        assert_eq!(memory.errors.records().len(), 1);
        assert_eq!(memory.errors.flushed(), 1);

        reporter.record_diff(&errored("B")).unwrap();
        assert_eq!(memory.errors.flushed(), 2);
        assert_eq!(reporter.count(StreamKind::Errors), 2);
    }

    #[test]
    fn test_other_streams_written_sorted_at_finish() {
        let (mut reporter, memory) = memory_reporter();

        reporter.record_only_left(&[key("Z"), key("A")]);
        reporter.record_diff(&mismatched("M2", 4)).unwrap();
        reporter.record_diff(&mismatched("M1", 1)).unwrap();
        reporter.record_diff(&ObjectDiff::matched(key("OK"))).unwrap();

        assert!(memory.only_in_left.records().is_empty());
        assert!(memory.mismatches.records().is_empty());

        let report = reporter.finish(&RunSummary::new("PROD", "DEV")).unwrap();
        assert!(report.artifacts.is_empty());

        let names: Vec<_> = memory
            .only_in_left
            .records()
            .iter()
            .map(|r| r.object_name().to_string())
            .collect();
        assert_eq!(names, vec!["SALES.A", "SALES.Z"]);

        let mismatches = memory.mismatches.records();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].fields(), vec!["SALES.M1", "right_minus_left", "1", "q M1"]);
        assert!(memory.only_in_right.records().is_empty());
    }

    #[test]
    fn test_catalog_only_descriptions_name_container() {
        let (mut reporter, memory) = memory_reporter();

        reporter.record_only_right(&[key("D")]);
        reporter.finish(&RunSummary::new("PROD", "DEV")).unwrap();

        assert_eq!(
            memory.only_in_right.records()[0].fields(),
            vec!["SALES.D", "present only in DEV"]
        );
    }

    #[test]
    fn test_csv_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            directory: dir.path().join("out"),
            ..OutputConfig::default()
        };

        let mut reporter = Reporter::create(&output, "PROD", "DEV").unwrap();
        reporter.record_only_left(&[key("A")]);
        reporter.record_diff(&errored("E")).unwrap();

        // Errors are on disk before the run finishes
        let errors = std::fs::read_to_string(output.path_for(StreamKind::Errors)).unwrap();
        assert_eq!(
            errors,
            "object_name,direction,query,error\nSALES.E,left_minus_right,q E,boom\n"
        );

        let mut summary = RunSummary::new("PROD", "DEV");
        summary.only_left = 1;
        let report = reporter.finish(&summary).unwrap();

        let only_left = std::fs::read_to_string(output.path_for(StreamKind::OnlyInLeft)).unwrap();
        assert_eq!(only_left, "object_name,description\nSALES.A,present only in PROD\n");

        let mismatches = std::fs::read_to_string(output.path_for(StreamKind::Mismatches)).unwrap();
        assert_eq!(mismatches, "object_name,direction,mismatch_rows_count,query\n");

        assert_eq!(report.artifacts.len(), 4);
        let run_report = std::fs::read_to_string(output.run_report_path().unwrap()).unwrap();
        let parsed: RunReport = serde_json::from_str(&run_report).unwrap();
        assert_eq!(parsed.summary.only_left, 1);
    }

    #[test]
    fn test_csv_quotes_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.csv");

        let mut sink = CsvSink::create(&path, StreamKind::Errors.header()).unwrap();
        let diff = ObjectDiff::new(
            key("Q"),
            vec![ComparisonOutcome::Errored {
                direction: Direction::RightMinusLeft,
                query: "select 1".to_string(),
                error: "bad, \"quoted\"".to_string(),
            }],
        );
        let record = ReportRecord::from_outcome(&diff.key, &diff.outcomes[0]).unwrap();
        sink.write_record(&record).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert!(contents.ends_with("SALES.Q,right_minus_left,select 1,\"bad, \"\"quoted\"\"\"\n"));
    }
}
