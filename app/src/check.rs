use std::{io::Write, path::Path, process::ExitCode};

use auditor::{AuditError, Auditor};
use eyre::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Consistent,
    /// Replicas disagree on some results, not fatal
    Diverged,
    /// A replica executed a command twice, the audit stopped early
    DuplicateExecution,
}

impl Verdict {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Verdict::DuplicateExecution => ExitCode::FAILURE,
            Verdict::Consistent | Verdict::Diverged => ExitCode::SUCCESS,
        }
    }
}

/// Audits `files` and prints one line per fault followed by a summary
pub fn run<W: Write, P: AsRef<Path>>(
    out: &mut W,
    auditor: &Auditor,
    files: &[P],
) -> Result<Verdict> {
    match auditor.audit_files(files) {
        Ok(report) => {
            writeln!(out, "{report}")?;
            Ok(if report.is_consistent() {
                Verdict::Consistent
            } else {
                Verdict::Diverged
            })
        }
        Err(err @ AuditError::DuplicateExecution { .. }) => {
            writeln!(out, "{err}")?;
            Ok(Verdict::DuplicateExecution)
        }
        Err(err) => Err(err.into()),
    }
}
