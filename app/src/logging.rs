use clap::Args;
use eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const MODULES: &[&str] = &["stats", "check_consistency", "common", "auditor", "latency"];

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Extra tracing directives, ie. `auditor=trace`
    #[arg(short, long)]
    pub log: Vec<String>,
    /// Also write logs to log.log
    #[arg(long, default_value_t = false)]
    pub log_file: bool,
}

/// Keep the returned guard alive until exit, it flushes the log file
pub fn init_tracing(args: &LogArgs) -> Result<Option<WorkerGuard>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let env_filter = env_filter(args, &log_level)?;

    let (file_layer, guard) = if args.log_file {
        let file_appender = tracing_appender::rolling::never(".", "log.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (
            Some(layer().with_writer(non_blocking).with_ansi(false)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_writer(std::io::stderr)
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn env_filter(args: &LogArgs, log_level: &str) -> Result<EnvFilter> {
    let mut env_filter = EnvFilter::new(format!("smr_bench={log_level}"));

    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }
    Ok(env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(log: &[&str], log_level: &str) -> String {
        let args = LogArgs {
            log: log.iter().map(|x| x.to_string()).collect(),
            log_file: false,
        };
        env_filter(&args, log_level).unwrap().to_string()
    }

    #[test]
    fn binaries_are_enabled() {
        let filter = directives(&[], "error");
        for target in ["smr_bench", "stats", "check_consistency", "auditor"] {
            assert!(
                filter.contains(&format!("{target}=error")),
                "{target} missing from {filter}"
            );
        }
    }

    #[test]
    fn explicit_directive_wins() {
        let filter = directives(&["auditor=trace"], "warn");
        assert!(filter.contains("auditor=trace"));
        assert!(!filter.contains("auditor=warn"));
        assert!(filter.contains("latency=warn"));
    }

    #[test]
    fn bad_directive_is_rejected() {
        let args = LogArgs {
            log: vec!["auditor=loud".to_owned()],
            log_file: false,
        };
        assert!(env_filter(&args, "warn").is_err());
    }
}
