use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, ErrorKind},
    path::Path,
    str::FromStr,
};

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{ParseError, ParseErrorReason, PlotError},
    record::Record,
};

/// What to do with a row that fails to parse
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParsePolicy {
    /// Log a warning and continue with the next row
    #[default]
    Skip,
    /// Stop the run with the parse error
    Abort,
}

impl FromStr for ParsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(format!("Unknown parse policy {s}, expected skip or abort")),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    pub policy: ParsePolicy,
    /// Only metrics matching this are kept
    pub metric_filter: Option<Regex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub metric_id: String,
    pub filter_key: String,
    pub series_id: String,
    pub sub_series_id: String,
}

impl From<&Record> for GroupKey {
    fn from(record: &Record) -> Self {
        Self {
            metric_id: record.metric_id.clone(),
            filter_key: record.filter_key.clone(),
            series_id: record.series_id.clone(),
            sub_series_id: record.sub_series_id.clone(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.metric_id, self.filter_key, self.series_id, self.sub_series_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub rank_count: u32,
    pub elapsed_seconds: f64,
}

impl From<&Record> for Sample {
    fn from(record: &Record) -> Self {
        Self {
            rank_count: record.rank_count,
            elapsed_seconds: record.elapsed_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    key: GroupKey,
    samples: Vec<Sample>,
}

impl Group {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Stable, so samples with equal rank counts keep their input order
    pub fn sort_by_rank(&mut self) {
        self.samples.sort_by_key(|sample| sample.rank_count);
    }
}

/// Every group of a run, in the order their keys were first seen.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    groups: Vec<Group>,
    index: HashMap<GroupKey, usize>,
    rows_read: usize,
    rows_skipped: usize,
}

impl Dataset {
    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self, PlotError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PlotError::MissingFile(path.to_owned()),
            _ => PlotError::Read {
                path: path.to_owned(),
                source,
            },
        })?;
        Self::from_reader(file, path, options)
    }

    /// `origin` only names the input in errors.
    pub fn from_reader<R: io::Read>(
        reader: R,
        origin: &Path,
        options: &LoadOptions,
    ) -> Result<Self, PlotError> {
        let read_error = |err: csv::Error| PlotError::Read {
            path: origin.to_owned(),
            source: match err.into_kind() {
                csv::ErrorKind::Io(err) => err,
                kind => io::Error::other(format!("{kind:?}")),
            },
        };

        // Fields are split on every comma, a `"` is part of the value
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        let header = reader.byte_headers().map_err(read_error)?;
        debug!("Skipping header: {}", String::from_utf8_lossy(header.as_slice()));

        let mut dataset = Self::default();
        let mut row = ByteRecord::new();
        while reader.read_byte_record(&mut row).map_err(read_error)? {
            let line = row.position().map_or(0, |pos| pos.line());
            let parsed = StringRecord::from_byte_record(row.clone())
                .map_err(|_| ParseError {
                    line,
                    reason: ParseErrorReason::InvalidUtf8,
                })
                .and_then(|fields| Record::parse(&fields, line));

            match parsed {
                Ok(record) => {
                    dataset.rows_read += 1;
                    if let Some(filter) = &options.metric_filter
                        && !filter.is_match(&record.metric_id)
                    {
                        continue;
                    }
                    dataset.insert(record);
                }
                Err(err) => match options.policy {
                    ParsePolicy::Abort => return Err(err.into()),
                    ParsePolicy::Skip => {
                        warn!("Skipping malformed row, {err}");
                        dataset.rows_skipped += 1;
                    }
                },
            }
        }

        debug!(
            "Read {} rows into {} groups, skipped {}",
            dataset.rows_read,
            dataset.groups.len(),
            dataset.rows_skipped
        );
        Ok(dataset)
    }

    pub fn insert(&mut self, record: Record) {
        let sample = Sample::from(&record);
        let key = GroupKey::from(&record);
        match self.index.get(&key) {
            Some(&idx) => self.groups[idx].samples.push(sample),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(Group {
                    key,
                    samples: vec![sample],
                });
            }
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Group> {
        self.index.get(key).map(|&idx| &self.groups[idx])
    }

    pub fn sort_samples(&mut self) {
        self.groups.iter_mut().for_each(Group::sort_by_rank);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rows that parsed, including ones dropped by the metric filter
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }
}
