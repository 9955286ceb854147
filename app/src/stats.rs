use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::Parser;
use common::{config::Config, plot::PlotSink};
use eyre::{Context, Result};
use latency::{
    json::{FullRun, MinimalRun},
    multi_server::MultiServerDump,
};
use tracing::info;

use crate::logging::LogArgs;

#[derive(Debug, Parser)]
#[command(name = "stats", about = "Summarise the latencies of a benchmark run")]
pub struct Cli {
    /// Json run, or a multi-server text dump when SERVERS is given
    pub file: PathBuf,
    /// Number of server blocks in the text dump
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub servers: Option<u64>,
    /// Only print the mean latency of a json run
    #[arg(long, default_value_t = false, conflicts_with = "servers")]
    pub minimal: bool,
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,
    /// Do not generate plots
    #[arg(long, default_value_t = false)]
    pub skip_plot: bool,
    /// Also write per-server statistics as csv
    #[arg(long, requires = "servers")]
    pub csv: Option<PathBuf>,
    #[command(flatten)]
    pub logging: LogArgs,
}

impl Cli {
    pub fn mode(&self) -> Result<Mode> {
        Ok(match (self.servers, self.minimal) {
            (Some(servers), _) => Mode::MultiServer {
                servers: usize::try_from(servers)?,
            },
            (None, true) => Mode::Minimal,
            (None, false) => Mode::Full,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Json run: request count, conflicts, mean latency and a distribution plot
    Full,
    /// Json run, mean latency only
    Minimal,
    /// Text dump with `servers` blocks
    MultiServer { servers: usize },
}

pub fn run<W: Write>(
    out: &mut W,
    file: &Path,
    mode: Mode,
    config: &Config,
    sink: &dyn PlotSink,
    csv: Option<&Path>,
) -> Result<()> {
    let name = chart_name(file);
    match mode {
        Mode::Full => {
            let report = FullRun::load(file)
                .wrap_err(format!("Loading run {}", file.display()))?
                .summarize()?;
            writeln!(out, "{report}")?;
            sink.render(&report.chart_request(&name))?;
        }
        Mode::Minimal => {
            let mean = MinimalRun::load(file)
                .wrap_err(format!("Loading run {}", file.display()))?
                .mean_latency_us()?;
            writeln!(out, "mean latency: {mean}us")?;
        }
        Mode::MultiServer { servers } => {
            let report = MultiServerDump::load(file, servers, &config.hosts)
                .wrap_err(format!("Loading dump {}", file.display()))?
                .analyze(config.confidence)?;
            writeln!(out, "{report}")?;

            if let Some(csv) = csv {
                let writer = BufWriter::new(
                    File::create(csv).wrap_err(format!("Creating {}", csv.display()))?,
                );
                report.write_csv(writer)?;
                info!("Wrote server statistics to {}", csv.display());
            }
            sink.render(&report.chart_request(&name))?;
        }
    }
    Ok(())
}

fn chart_name(file: &Path) -> String {
    file.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("latency")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use std::{fs::write, sync::Mutex};

    use clap::error::ErrorKind;
    use common::{config::HostLabels, plot::ChartRequest};
    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ChartRequest>>);

    impl PlotSink for RecordingSink {
        fn render(&self, request: &ChartRequest) -> Result<()> {
            self.0.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn run_to_string(
        file: &Path,
        mode: Mode,
        config: &Config,
        sink: &RecordingSink,
        csv: Option<&Path>,
    ) -> Result<String> {
        let mut out = Vec::new();
        run(&mut out, file, mode, config, sink, csv)?;
        Ok(String::from_utf8(out)?)
    }

    fn parse_error(args: &[&str]) -> ErrorKind {
        Cli::try_parse_from(args).unwrap_err().kind()
    }

    #[test]
    fn cli_selects_mode() {
        let cli = Cli::try_parse_from(["stats", "run.json"]).unwrap();
        assert_eq!(cli.mode().unwrap(), Mode::Full);
        let cli = Cli::try_parse_from(["stats", "--minimal", "run.json"]).unwrap();
        assert_eq!(cli.mode().unwrap(), Mode::Minimal);
        let cli = Cli::try_parse_from(["stats", "dump.txt", "3", "--csv", "out.csv"]).unwrap();
        assert_eq!(cli.mode().unwrap(), Mode::MultiServer { servers: 3 });
    }

    #[test]
    fn cli_requires_a_file() {
        assert_eq!(
            parse_error(&["stats"]),
            ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn cli_rejects_minimal_with_servers() {
        assert_eq!(
            parse_error(&["stats", "--minimal", "dump.txt", "3"]),
            ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn cli_rejects_csv_without_servers() {
        assert_eq!(
            parse_error(&["stats", "run.json", "--csv", "out.csv"]),
            ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn cli_rejects_zero_servers() {
        assert_eq!(parse_error(&["stats", "dump.txt", "0"]), ErrorKind::ValueValidation);
    }

    #[test]
    fn full_mode_prints_and_plots() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("stats_42.json");
        write(
            &file,
            r#"{"LatenciesNano": [1000, 2000, 3000], "ReqsNb": 3, "Conflicts": 0}"#,
        )
        .unwrap();

        let sink = RecordingSink::default();
        let text = run_to_string(&file, Mode::Full, &Config::default(), &sink, None).unwrap();
        assert!(text.starts_with("Number of requests 3\nConflict percentage 0\nmean latency: "));

        let requests = sink.0.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name(), "stats_42");
        assert!(matches!(requests[0], ChartRequest::Distribution { .. }));
    }

    #[test]
    fn minimal_mode_does_not_plot() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("stats.json");
        write(&file, r#"{"LatenciesNano": [20000, 40000]}"#).unwrap();

        let sink = RecordingSink::default();
        let text = run_to_string(&file, Mode::Minimal, &Config::default(), &sink, None).unwrap();
        assert_eq!(text, "mean latency: 0.0003us\n");
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn multi_server_mode_writes_csv_and_bars() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("dump.txt");
        write(
            &file,
            "me@10.10.1.1\n-q 2 -T 1 -c 0\n1.0\n3.0\nme@10.10.1.2\n-q 1 -T 2 -c 0\n2.0\n2.0\n",
        )
        .unwrap();
        let csv = dir.path().join("servers.csv");
        let config = Config {
            hosts: [("10.10.1.1", "CA"), ("10.10.1.2", "VA")]
                .into_iter()
                .collect::<HostLabels>(),
            ..Config::default()
        };

        let sink = RecordingSink::default();
        let text = run_to_string(
            &file,
            Mode::MultiServer { servers: 2 },
            &config,
            &sink,
            Some(&csv),
        )
        .unwrap();
        assert!(text.contains("== CA (10.10.1.1) =="));
        assert!(text.contains("== VA (10.10.1.2) =="));
        assert_eq!(std::fs::read_to_string(&csv).unwrap().lines().count(), 3);

        let requests = sink.0.lock().unwrap();
        match &requests[0] {
            ChartRequest::Bars { bars, .. } => {
                assert_eq!(bars[0].error, 2.0);
                assert_eq!(bars[1].error, 0.0);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn unknown_host_fails_before_plotting() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("dump.txt");
        write(&file, "me@10.10.1.1\n-q 1 -T 1 -c 0\n1.0\n").unwrap();

        let sink = RecordingSink::default();
        let err = run_to_string(
            &file,
            Mode::MultiServer { servers: 1 },
            &Config::default(),
            &sink,
            None,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Unknown host address 10.10.1.1"));
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
