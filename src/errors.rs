//! Fault code table of the frequency converter.
//!
//! The resource is a plain text file with one record per line: an integer
//! code followed by free text. Blank lines and lines starting with `#` are
//! skipped.

use std::{
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

const BUNDLED: &str = include_str!("../data/errors.txt");

#[derive(Error, Debug)]
pub enum ErrorTableError {
    #[error("cannot read error table {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid error code on line {line}: '{text}'")]
    BadCode { line: usize, text: String },
    #[error("unknown error code {0}")]
    NotFound(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: u32,
    pub description: String,
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:4} {}", self.code, self.description)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorTable {
    records: Vec<ErrorRecord>,
}

impl ErrorTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ErrorTableError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ErrorTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&text)?;
        debug!("loaded {} error codes from {:?}", table.len(), path);
        Ok(table)
    }

    /// Table compiled into the crate.
    pub fn bundled() -> Result<Self, ErrorTableError> {
        Self::parse(BUNDLED)
    }

    /// Parses the whole text; any bad row fails the table.
    pub fn parse(text: &str) -> Result<Self, ErrorTableError> {
        let records = text
            .lines()
            .enumerate()
            .map(|(n, line)| (n + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(line, text)| parse_record(line, text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }

    /// First record with `code` wins.
    pub fn lookup(&self, code: u32) -> Result<&ErrorRecord, ErrorTableError> {
        self.records
            .iter()
            .find(|record| record.code == code)
            .ok_or(ErrorTableError::NotFound(code))
    }

    pub fn describe(&self, code: u32) -> String {
        match self.lookup(code) {
            Ok(record) => record.description.clone(),
            Err(e) => e.to_string(),
        }
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_record(line: usize, text: &str) -> Result<ErrorRecord, ErrorTableError> {
    let mut columns = text.split_whitespace();
    let code = columns
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| ErrorTableError::BadCode {
            line,
            text: text.to_string(),
        })?;

    Ok(ErrorRecord {
        code,
        description: columns.collect::<Vec<_>>().join(" "),
    })
}
