use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, trace};

use crate::line::LogLine;

/// Command id -> observed result
pub type CommandResultTable = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("file: {} has duplicate execution. Command ID: {command_id}", file.display())]
    DuplicateExecution { file: PathBuf, command_id: String },
    #[error("Reading {}: {source}", file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A command whose replicas disagree on the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub command_id: String,
    /// Each distinct result and the files that reported it
    pub results: BTreeMap<String, Vec<PathBuf>>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let results = self
            .results
            .iter()
            .map(|(result, files)| {
                format!(
                    "{result} ({})",
                    files.iter().map(|file| file.display()).join(", ")
                )
            })
            .join(", ");
        write!(f, "ERROR CommandId: {} results: {results}", self.command_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Merged table, the first file to report a command wins
    pub table: CommandResultTable,
    pub mismatches: Vec<Mismatch>,
    pub files: usize,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mismatch in &self.mismatches {
            writeln!(f, "{mismatch}")?;
        }
        write!(
            f,
            "checked {} commands across {} files, {} mismatches",
            self.table.len(),
            self.files,
            self.mismatches.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Auditor {
    executed_op: String,
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new("2")
    }
}

impl Auditor {
    /// `executed_op` is the op-type token of "executed with result" lines
    pub fn new(executed_op: impl Into<String>) -> Self {
        Self {
            executed_op: executed_op.into(),
        }
    }

    /// Reads every file, stopping at the first replica that executed a command twice,
    /// then merges the per-file tables.
    pub fn audit_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<AuditReport, AuditError> {
        let tables = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                self.read_file(path).map(|table| (path.to_path_buf(), table))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merge(tables))
    }

    pub fn read_file(&self, path: &Path) -> Result<CommandResultTable, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        self.read_results(path, BufReader::new(file))
    }

    /// Builds the result table of a single replica log. Lines that do not have the
    /// expected shape, such as a partially written last line, are skipped.
    pub fn read_results<R: BufRead>(
        &self,
        file: &Path,
        mut reader: R,
    ) -> Result<CommandResultTable, AuditError> {
        let mut table = CommandResultTable::new();
        let mut buf = Vec::new();
        let mut line_no = 0;
        let mut skipped = 0;
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| AuditError::Io {
                    file: file.to_path_buf(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let line = decode(&buf);
            let entry = match LogLine::parse(&line) {
                Ok(entry) => entry,
                Err(err) => {
                    trace!("{}:{line_no}: skipping line: {err}", file.display());
                    skipped += 1;
                    continue;
                }
            };
            if entry.op_type != self.executed_op {
                continue;
            }
            if table.contains_key(entry.command_id) {
                return Err(AuditError::DuplicateExecution {
                    file: file.to_path_buf(),
                    command_id: entry.command_id.to_owned(),
                });
            }
            table.insert(entry.command_id.to_owned(), entry.result.to_owned());
        }

        debug!(
            "{}: {} results from {line_no} lines, {skipped} skipped",
            file.display(),
            table.len()
        );
        Ok(table)
    }
}

/// Invalid bytes are kept as `\xNN` escapes so distinct raw results stay distinct
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(
            bytes
                .utf8_chunks()
                .map(|chunk| format!("{}{}", chunk.valid(), chunk.invalid().escape_ascii()))
                .collect(),
        ),
    }
}

/// Merges per-file tables. Every command reported with more than one distinct result
/// becomes a [`Mismatch`], regardless of the order of `tables`.
pub fn merge(tables: Vec<(PathBuf, CommandResultTable)>) -> AuditReport {
    let files = tables.len();
    let mut merged = CommandResultTable::new();
    let mut observed: BTreeMap<String, BTreeMap<String, Vec<PathBuf>>> = BTreeMap::new();

    for (file, table) in tables {
        for (command_id, result) in table {
            merged
                .entry(command_id.clone())
                .or_insert_with(|| result.clone());
            observed
                .entry(command_id)
                .or_default()
                .entry(result)
                .or_default()
                .push(file.clone());
        }
    }

    let mismatches = observed
        .into_iter()
        .filter(|(_, results)| results.len() > 1)
        .map(|(command_id, mut results)| {
            results.values_mut().for_each(|files| files.sort());
            let mismatch = Mismatch {
                command_id,
                results,
            };
            debug!("{mismatch}");
            mismatch
        })
        .collect();

    AuditReport {
        table: merged,
        mismatches,
        files,
    }
}
