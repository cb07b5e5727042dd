use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bench_core::errors::{BenchError, ErrorInfo};
use bench_core::{AxisValue, Combination, CombinationKey};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::AggregatedRow;
use crate::plan::{AxisKind, SweepPlan};
use crate::serde::{from_json_slice, to_canonical_json_bytes};
use crate::stats::MetricStats;

/// Cell text for an undefined statistic.
pub const UNDEFINED: &str = "NA";

const COUNT_COLUMNS: [&str; 4] = ["repeats", "n_ok", "n_fail", "last_exit_status"];
const TIMESTAMP_COLUMN: &str = "timestamp";

/// How an existing store is treated when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Delete any previous table and manifest.
    Fresh,
    /// Keep existing rows; a torn final record is cut off.
    Resume,
    /// Keep existing rows and never touch the file.
    ReadOnly,
}

/// Fixed column layout of one family's result table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    axes: Vec<(String, AxisKind)>,
    metrics: Vec<String>,
    extremes: BTreeSet<String>,
    derived: Vec<String>,
}

impl TableSchema {
    pub fn from_plan(plan: &SweepPlan) -> Self {
        Self {
            axes: plan
                .axes
                .iter()
                .map(|axis| (axis.name.clone(), axis.kind()))
                .collect(),
            metrics: plan.family.metric_names(),
            extremes: plan.family.extremes.iter().cloned().collect(),
            derived: plan
                .family
                .derived
                .iter()
                .map(|derived| derived.name.clone())
                .collect(),
        }
    }

    pub fn axis_names(&self) -> Vec<String> {
        self.axes.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Header row: axes, counts, per-metric statistics, ratios, timestamp.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = self.axis_names();
        columns.extend(COUNT_COLUMNS.iter().map(|column| column.to_string()));
        for metric in &self.metrics {
            columns.push(format!("{metric}_mean"));
            columns.push(format!("{metric}_std"));
            if self.extremes.contains(metric) {
                columns.push(format!("{metric}_min"));
                columns.push(format!("{metric}_max"));
            }
        }
        columns.extend(self.derived.iter().cloned());
        columns.push(TIMESTAMP_COLUMN.to_string());
        columns
    }

    pub fn encode(&self, row: &AggregatedRow) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.columns().len());
        for (name, _) in &self.axes {
            cells.push(
                row.combination
                    .get(name)
                    .map(AxisValue::canonical)
                    .unwrap_or_else(|| UNDEFINED.to_string()),
            );
        }
        cells.push(row.repeats().to_string());
        cells.push(row.n_ok.to_string());
        cells.push(row.n_fail.to_string());
        cells.push(row.last_exit_status.to_string());
        for metric in &self.metrics {
            let stats = row.stats(metric);
            cells.push(format_cell(stats.mean));
            cells.push(format_cell(stats.std));
            if self.extremes.contains(metric) {
                cells.push(format_cell(stats.min));
                cells.push(format_cell(stats.max));
            }
        }
        for name in &self.derived {
            cells.push(format_cell(row.derived(name)));
        }
        cells.push(row.timestamp.clone());
        cells
    }

    /// Rebuilds a row from a record laid out as [`TableSchema::columns`].
    pub fn decode(&self, record: &StringRecord) -> Result<AggregatedRow, BenchError> {
        let expected = self.columns().len();
        if record.len() != expected {
            return Err(BenchError::Store(
                ErrorInfo::new("store-row-width", "row has the wrong number of cells")
                    .with_context("expected", expected.to_string())
                    .with_context("found", record.len().to_string()),
            ));
        }
        let mut cells = record.iter();
        let mut next = || cells.next().unwrap_or(UNDEFINED);

        let mut axes = Vec::with_capacity(self.axes.len());
        for (name, kind) in &self.axes {
            let cell = next();
            let value = match kind {
                AxisKind::Int => cell.parse::<i64>().map(AxisValue::Int).ok(),
                AxisKind::Float => cell.parse::<f64>().map(AxisValue::Float).ok(),
            };
            let value = value.ok_or_else(|| bad_cell(name, cell))?;
            axes.push((name.clone(), value));
        }
        let repeats = parse_count::<u32>("repeats", next())?;
        let n_ok = parse_count::<u32>("n_ok", next())?;
        let n_fail = parse_count::<u32>("n_fail", next())?;
        let last_exit_status = parse_count::<i32>("last_exit_status", next())?;

        let mut metrics = BTreeMap::new();
        for metric in &self.metrics {
            let mut stats = MetricStats {
                mean: parse_cell(metric, next())?,
                std: parse_cell(metric, next())?,
                ..MetricStats::undefined()
            };
            if self.extremes.contains(metric) {
                stats.min = parse_cell(metric, next())?;
                stats.max = parse_cell(metric, next())?;
            }
            metrics.insert(metric.clone(), stats);
        }
        let mut derived = BTreeMap::new();
        for name in &self.derived {
            derived.insert(name.clone(), parse_cell(name, next())?);
        }
        let timestamp = next().to_string();

        Ok(AggregatedRow {
            combination: Combination::new(axes, repeats),
            n_ok,
            n_fail,
            last_exit_status,
            metrics,
            derived,
            timestamp,
        })
    }
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value}"),
        None => UNDEFINED.to_string(),
    }
}

fn parse_cell(column: &str, cell: &str) -> Result<Option<f64>, BenchError> {
    if cell == UNDEFINED {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|_| bad_cell(column, cell))
}

fn parse_count<T: std::str::FromStr>(column: &str, cell: &str) -> Result<T, BenchError> {
    cell.parse::<T>().map_err(|_| bad_cell(column, cell))
}

fn bad_cell(column: &str, cell: &str) -> BenchError {
    BenchError::Store(
        ErrorInfo::new("store-cell", "unparsable cell in result table")
            .with_context("column", column)
            .with_context("cell", cell),
    )
}

/// Rows loaded from a store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<AggregatedRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> BTreeSet<CombinationKey> {
        self.rows.iter().map(|row| row.combination.key()).collect()
    }
}

/// Sidecar recording which plan produced a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanManifest {
    pub plan: String,
    pub fingerprint: String,
    pub columns: Vec<String>,
    pub created: String,
}

/// `<store>.plan.json` next to the store.
pub fn manifest_path(store: &Path) -> PathBuf {
    let mut name = store.as_os_str().to_owned();
    name.push(".plan.json");
    PathBuf::from(name)
}

/// Append-only CSV result table with one row per combination.
///
/// Every append is a single buffered write followed by `sync_data`, so a
/// crash leaves at most one torn record at the end of the file.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    schema: TableSchema,
    header_written: bool,
}

impl ResultSink {
    pub fn open(
        path: impl Into<PathBuf>,
        mode: SinkMode,
        schema: TableSchema,
    ) -> Result<Self, BenchError> {
        let path = path.into();
        let mut sink = Self {
            path,
            schema,
            header_written: false,
        };
        match mode {
            SinkMode::Fresh => {
                remove_if_present(&sink.path)?;
                remove_if_present(&manifest_path(&sink.path))?;
                ensure_parent(&sink.path)?;
            }
            SinkMode::Resume | SinkMode::ReadOnly => {
                if !sink.path.exists() {
                    return Err(BenchError::StoreMissing(
                        ErrorInfo::new("store-missing", "result table does not exist")
                            .with_context("path", sink.path.display().to_string())
                            .with_hint("run with --mode fresh to create it"),
                    ));
                }
                if mode == SinkMode::Resume {
                    sink.repair_tail()?;
                }
                sink.header_written = sink.check_header()?;
            }
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Persists one row durably before returning.
    pub fn append(&mut self, row: &AggregatedRow) -> Result<(), BenchError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if !self.header_written {
            writer
                .write_record(self.schema.columns())
                .map_err(|err| wrap_csv("store-write-header", err))?;
        }
        writer
            .write_record(self.schema.encode(row))
            .map_err(|err| wrap_csv("store-write-row", err))?;
        let buffer = writer.into_inner().map_err(|err| {
            BenchError::Store(
                ErrorInfo::new("store-buffer", "failed to finish CSV record")
                    .with_hint(err.to_string()),
            )
        })?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| self.io_error("store-open", "failed to open result table", err))?;
        file.write_all(&buffer)
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|err| self.io_error("store-write", "failed to write result row", err))?;
        self.header_written = true;
        Ok(())
    }

    /// Reads every complete row. A torn final record is ignored.
    pub fn load(&self) -> Result<ResultTable, BenchError> {
        let columns = self.schema.columns();
        if !self.path.exists() {
            return Err(BenchError::StoreMissing(
                ErrorInfo::new("store-missing", "result table does not exist")
                    .with_context("path", self.path.display().to_string()),
            ));
        }
        let bytes = fs::read(&self.path)
            .map_err(|err| self.io_error("store-read", "failed to read result table", err))?;
        let complete = complete_prefix(&bytes);
        if complete.is_empty() {
            return Ok(ResultTable {
                columns,
                rows: Vec::new(),
            });
        }

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(complete);
        let header = reader
            .headers()
            .map_err(|err| wrap_csv("store-header", err))?
            .clone();
        self.compare_header(&header)?;
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| wrap_csv("store-record", err))?;
            rows.push(self.schema.decode(&record)?);
        }
        Ok(ResultTable { columns, rows })
    }

    pub fn write_manifest(&self, manifest: &PlanManifest) -> Result<(), BenchError> {
        let bytes = to_canonical_json_bytes(manifest)?;
        let path = manifest_path(&self.path);
        fs::write(&path, bytes)
            .map_err(|err| self.io_error("manifest-write", "failed to write plan manifest", err))
    }

    pub fn read_manifest(&self) -> Result<Option<PlanManifest>, BenchError> {
        let path = manifest_path(&self.path);
        match fs::read(&path) {
            Ok(bytes) => from_json_slice(&bytes).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error("manifest-read", "failed to read plan manifest", err)),
        }
    }

    fn repair_tail(&self) -> Result<(), BenchError> {
        let bytes = fs::read(&self.path)
            .map_err(|err| self.io_error("store-read", "failed to read result table", err))?;
        let keep = complete_prefix(&bytes).len();
        if keep == bytes.len() {
            return Ok(());
        }
        warn!(
            path = %self.path.display(),
            dropped_bytes = bytes.len() - keep,
            "truncating torn record at end of result table"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|err| self.io_error("store-open", "failed to open result table", err))?;
        file.set_len(keep as u64)
            .and_then(|_| file.sync_data())
            .map_err(|err| self.io_error("store-truncate", "failed to truncate result table", err))
    }

    /// Validates the stored header; returns whether one is present.
    fn check_header(&self) -> Result<bool, BenchError> {
        let bytes = fs::read(&self.path)
            .map_err(|err| self.io_error("store-read", "failed to read result table", err))?;
        let complete = complete_prefix(&bytes);
        if complete.is_empty() {
            return Ok(false);
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(complete);
        let header = reader
            .headers()
            .map_err(|err| wrap_csv("store-header", err))?;
        self.compare_header(header)?;
        Ok(true)
    }

    fn compare_header(&self, header: &StringRecord) -> Result<(), BenchError> {
        let expected = self.schema.columns();
        let found: Vec<&str> = header.iter().collect();
        if found != expected.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(BenchError::Store(
                ErrorInfo::new("store-schema", "result table header does not match the plan")
                    .with_context("path", self.path.display().to_string())
                    .with_context("expected", expected.join(","))
                    .with_context("found", found.join(","))
                    .with_hint("use a new store or rerun with --mode fresh"),
            ));
        }
        Ok(())
    }

    fn io_error(&self, code: &str, message: &str, err: io::Error) -> BenchError {
        BenchError::Store(
            ErrorInfo::new(code, message)
                .with_context("path", self.path.display().to_string())
                .with_hint(err.to_string()),
        )
    }
}

/// Bytes up to and including the last newline.
fn complete_prefix(bytes: &[u8]) -> &[u8] {
    match bytes.iter().rposition(|byte| *byte == b'\n') {
        Some(idx) => &bytes[..=idx],
        None => &[],
    }
}

fn remove_if_present(path: &Path) -> Result<(), BenchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(BenchError::Store(
            ErrorInfo::new("store-remove", "failed to remove previous result table")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )),
    }
}

fn ensure_parent(path: &Path) -> Result<(), BenchError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            BenchError::Store(
                ErrorInfo::new("store-create", "failed to create store directory")
                    .with_context("path", parent.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?
    }
    Ok(())
}

fn wrap_csv(code: &str, err: csv::Error) -> BenchError {
    BenchError::Store(ErrorInfo::new(code, "CSV result table failure").with_hint(err.to_string()))
}
