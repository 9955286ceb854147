use std::{path::PathBuf, process::ExitCode};

use auditor::Auditor;
use clap::Parser;
use common::config::Config;
use eyre::Result;
use smr_bench::{check, logging::{LogArgs, init_tracing}};
use tracing::debug;

#[derive(Parser)]
#[command(about = "Check that every replica reports the same result for each command")]
struct Cli {
    /// Replica execution logs
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
    /// Op-type token of "executed with result" lines, overrides the config
    #[arg(long)]
    executed_op: Option<String>,
    #[command(flatten)]
    logging: LogArgs,
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let _guard = init_tracing(&args.logging)?;
    let config = Config::load_or_default(&args.config)?;

    let executed_op = args.executed_op.unwrap_or(config.audit.executed_op);
    debug!("Auditing {} files, executed op {executed_op}", args.files.len());
    let auditor = Auditor::new(executed_op);

    let mut stdout = std::io::stdout().lock();
    let verdict = check::run(&mut stdout, &auditor, &args.files)?;
    Ok(verdict.exit_code())
}
