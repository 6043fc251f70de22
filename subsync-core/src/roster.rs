//! Row-source reader for the repository table.
//!
//! The table is a delimited file with a header row. Two columns are
//! required (identifier and remote locator); an optional third column
//! overrides the batch reference per row. Every other column is kept in
//! [`SubmissionRecord::extra`].
//!
//! [`Roster::open`] validates the header once. [`Roster::records`] returns
//! a lazy iterator and may be called any number of times: each call
//! re-reads the file from the start. [`Roster::load`] collects everything
//! and additionally rejects identifiers that share a working-copy
//! directory.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{input_io_err, InputError};
use crate::types::{RepoId, RepoLocator, SubmissionRecord, SyncReference};

pub const DEFAULT_ID_COLUMN: &str = "REPO_ID";
pub const DEFAULT_URL_COLUMN: &str = "REPO_URL";
pub const DEFAULT_REF_COLUMN: &str = "REF";

/// Names of the columns the reader looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Columns {
    pub id: String,
    pub url: String,
    /// Optional per-row reference override; absent in the file is fine.
    pub reference: Option<String>,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_COLUMN.to_string(),
            url: DEFAULT_URL_COLUMN.to_string(),
            reference: Some(DEFAULT_REF_COLUMN.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct ColumnIndex {
    id: usize,
    url: usize,
    reference: Option<usize>,
}

/// A validated repository table on disk.
#[derive(Debug, Clone)]
pub struct Roster {
    path: PathBuf,
    columns: Columns,
    delimiter: u8,
    headers: Vec<String>,
    index: ColumnIndex,
}

impl Roster {
    /// Open `path` with `,` as delimiter.
    pub fn open(path: impl Into<PathBuf>, columns: &Columns) -> Result<Self, InputError> {
        Self::open_with_delimiter(path, columns, b',')
    }

    /// Open `path` and validate its header row.
    pub fn open_with_delimiter(
        path: impl Into<PathBuf>,
        columns: &Columns,
        delimiter: u8,
    ) -> Result<Self, InputError> {
        let path = path.into();
        let mut reader = csv_reader(&path, delimiter)?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_err(&path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let id = find_column(&headers, &columns.id)
            .ok_or_else(|| missing_column(&path, &columns.id, &headers))?;
        let url = find_column(&headers, &columns.url)
            .ok_or_else(|| missing_column(&path, &columns.url, &headers))?;
        let reference = columns
            .reference
            .as_deref()
            .and_then(|name| find_column(&headers, name));

        Ok(Self {
            path,
            columns: columns.clone(),
            delimiter,
            headers,
            index: ColumnIndex { id, url, reference },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Whether the file carries a per-row reference column.
    pub fn has_reference_column(&self) -> bool {
        self.index.reference.is_some()
    }

    /// Lazily iterate the rows from the start of the file.
    pub fn records(&self) -> Result<Records<'_>, InputError> {
        let reader = csv_reader(&self.path, self.delimiter)?;
        Ok(Records {
            roster: self,
            inner: reader.into_records(),
        })
    }

    /// Read every row, failing on the first malformed one or on two
    /// identifiers that map to the same working-copy directory.
    pub fn load(&self) -> Result<Vec<SubmissionRecord>, InputError> {
        let mut seen: HashMap<String, u64> = HashMap::new();
        let mut records = Vec::new();
        for record in self.records()? {
            let record = record?;
            // Checked by `parse_row`; the fallback only keeps this total.
            let dir = record.id.dir_name().unwrap_or_default().to_lowercase();
            if let Some(first_line) = seen.get(&dir) {
                return Err(InputError::DuplicateIdentifier {
                    path: self.path.clone(),
                    line: record.line,
                    first_line: *first_line,
                    id: record.id.0.clone(),
                    dir,
                });
            }
            seen.insert(dir, record.line);
            records.push(record);
        }
        Ok(records)
    }

    fn parse_row(&self, row: csv::StringRecord) -> Result<SubmissionRecord, InputError> {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let cell = |idx: usize| row.get(idx).map(str::trim).unwrap_or_default();

        let id = cell(self.index.id);
        if id.is_empty() {
            return Err(InputError::EmptyIdentifier {
                path: self.path.clone(),
                line,
                column: self.columns.id.clone(),
            });
        }
        let id = RepoId::from(id);
        if id.dir_name().is_none() {
            return Err(InputError::InvalidIdentifier {
                path: self.path.clone(),
                line,
                id: id.0,
            });
        }

        let locator = cell(self.index.url);
        if locator.is_empty() {
            return Err(InputError::EmptyLocator {
                path: self.path.clone(),
                line,
                column: self.columns.url.clone(),
                id: id.0,
            });
        }

        let reference = self
            .index
            .reference
            .map(cell)
            .filter(|r| !r.is_empty())
            .map(SyncReference::from);

        let mut extra = BTreeMap::new();
        for (idx, header) in self.headers.iter().enumerate() {
            if idx == self.index.id || idx == self.index.url || Some(idx) == self.index.reference {
                continue;
            }
            extra.insert(header.clone(), cell(idx).to_string());
        }

        Ok(SubmissionRecord {
            id,
            locator: RepoLocator::from(locator),
            reference,
            extra,
            line,
        })
    }
}

/// Lazy row iterator returned by [`Roster::records`].
pub struct Records<'a> {
    roster: &'a Roster,
    inner: csv::StringRecordsIntoIter<File>,
}

impl Iterator for Records<'_> {
    type Item = Result<SubmissionRecord, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.inner.next()?;
        Some(
            row.map_err(|e| csv_err(&self.roster.path, e))
                .and_then(|row| self.roster.parse_row(row)),
        )
    }
}

/// Keep only the records whose identifier matches one of `ids`
/// (case-insensitive). An empty `ids` keeps everything.
pub fn filter_ids(records: Vec<SubmissionRecord>, ids: &[String]) -> Vec<SubmissionRecord> {
    if ids.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| ids.iter().any(|id| r.id.matches(id)))
        .collect()
}

fn csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>, InputError> {
    let file = File::open(path).map_err(|e| input_io_err(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file))
}

/// Exact header match first, then a case-insensitive one.
fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
}

fn missing_column(path: &Path, column: &str, headers: &[String]) -> InputError {
    InputError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
        found: headers.join(", "),
    }
}

fn csv_err(path: &Path, source: csv::Error) -> InputError {
    InputError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
