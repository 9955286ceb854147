//! Text dump of a run across several servers. Each server contributes a block:
//!
//! ```text
//! user@10.10.1.1
//! bin/clientlat -maddr 10.10.1.1 -q 2 -T 2 -c 0
//! 1.25
//! 0.98
//! 1.10
//! 1.31
//! ```
//!
//! The parameter line is followed by exactly `T * q` latency lines.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, Lines, Write},
    path::Path,
};

use common::{
    config::HostLabels,
    plot::{Bar, ChartRequest},
    stats::Summary,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ParseError;

/// Upper bound for the initial allocation of a server's samples
const MAX_PREALLOCATED: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunParams {
    /// `-c`
    pub conflicts: u64,
    /// `-q`
    pub requests_per_client: usize,
    /// `-T`
    pub clients_per_server: usize,
}

impl RunParams {
    pub fn expected_samples(&self) -> Option<usize> {
        self.clients_per_server
            .checked_mul(self.requests_per_client)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerDataset {
    pub user: String,
    pub address: String,
    pub label: String,
    pub params: RunParams,
    pub latencies: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiServerDump {
    pub servers: Vec<ServerDataset>,
}

struct FlagPatterns {
    conflicts: Regex,
    requests: Regex,
    clients: Regex,
}

impl FlagPatterns {
    fn new() -> Result<Self, regex::Error> {
        let flag =
            |name: &str| Regex::new(&format!(r"(?:^|\s){}\b\D*?(\d+)", regex::escape(name)));
        Ok(Self {
            conflicts: flag("-c")?,
            requests: flag("-q")?,
            clients: flag("-T")?,
        })
    }

    fn parse(&self, line_no: usize, line: &str) -> Result<RunParams, ParseError> {
        Ok(RunParams {
            conflicts: first_number(&self.conflicts, "-c", line_no, line)?,
            requests_per_client: first_number(&self.requests, "-q", line_no, line)?,
            clients_per_server: first_number(&self.clients, "-T", line_no, line)?,
        })
    }
}

fn first_number<T: std::str::FromStr>(
    re: &Regex,
    flag: &'static str,
    line_no: usize,
    line: &str,
) -> Result<T, ParseError> {
    let text = re
        .captures(line)
        .and_then(|cap| cap.get(1))
        .ok_or(ParseError::MissingFlag {
            line: line_no,
            flag,
        })?
        .as_str();
    text.parse().map_err(|_| ParseError::BadFlag {
        line: line_no,
        flag,
        text: text.to_owned(),
    })
}

fn parse_identity(line_no: usize, line: &str) -> Result<(String, String), ParseError> {
    let bad = || ParseError::BadIdentity {
        line: line_no,
        text: line.to_owned(),
    };
    let (user, address) = line.trim().split_once('@').ok_or_else(bad)?;
    let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
    if !valid(user) || !valid(address) {
        return Err(bad());
    }
    Ok((user.to_owned(), address.to_owned()))
}

fn parse_latency(line_no: usize, line: &str) -> Result<f64, ParseError> {
    let bad = || ParseError::BadLatency {
        line: line_no,
        text: line.to_owned(),
    };
    line.split_whitespace()
        .last()
        .ok_or_else(bad)?
        .parse()
        .map_err(|_| bad())
}

/// Line iterator that keeps track of 1-based line numbers
struct NumberedLines<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> NumberedLines<R> {
    fn next_line(&mut self) -> Result<Option<(usize, String)>, ParseError> {
        match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                Ok(Some((self.line_no, line?)))
            }
            None => Ok(None),
        }
    }
}

impl MultiServerDump {
    pub fn load(path: &Path, servers: usize, hosts: &HostLabels) -> Result<Self, ParseError> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file), servers, hosts)
    }

    /// Reads exactly `servers` blocks. Running out of input inside a block is an error,
    /// anything after the last block is ignored.
    pub fn parse<R: BufRead>(
        reader: R,
        servers: usize,
        hosts: &HostLabels,
    ) -> Result<Self, ParseError> {
        let flags = FlagPatterns::new()?;
        let mut lines = NumberedLines {
            lines: reader.lines(),
            line_no: 0,
        };

        let mut datasets = Vec::with_capacity(servers);
        for server in 0..servers {
            let (line_no, identity) = loop {
                match lines.next_line()? {
                    Some((_, line)) if line.trim().is_empty() => continue,
                    Some(item) => break item,
                    None => return Err(ParseError::MissingIdentity { server }),
                }
            };
            let (user, address) = parse_identity(line_no, &identity)?;
            let label = hosts.label(&address)?.to_owned();

            let (line_no, params_line) = lines
                .next_line()?
                .ok_or(ParseError::MissingParams { server })?;
            let params = flags.parse(line_no, &params_line)?;
            let expected = params.expected_samples().ok_or(ParseError::BadFlag {
                line: line_no,
                flag: "-T",
                text: params.clients_per_server.to_string(),
            })?;

            let mut latencies = Vec::with_capacity(expected.min(MAX_PREALLOCATED));
            while latencies.len() < expected {
                let Some((line_no, line)) = lines.next_line()? else {
                    return Err(ParseError::ShortRead {
                        server,
                        expected,
                        found: latencies.len(),
                    });
                };
                latencies.push(parse_latency(line_no, &line)?);
            }
            debug!("{label} ({address}): {} latencies, {params:?}", latencies.len());

            datasets.push(ServerDataset {
                user,
                address,
                label,
                params,
                latencies,
            });
        }

        let mut trailing = 0;
        while let Some((_, line)) = lines.next_line()? {
            if !line.trim().is_empty() {
                trailing += 1;
            }
        }
        if trailing > 0 {
            warn!("Ignoring {trailing} lines after the last of {servers} servers");
        }

        Ok(Self { servers: datasets })
    }

    /// Per server statistics, computed in parallel, plus statistics over every sample
    pub fn analyze(&self, confidence: f64) -> Result<MultiServerReport, ParseError> {
        let servers = self
            .servers
            .par_iter()
            .map(|server| {
                Summary::from_samples(&server.latencies, confidence).map(|summary| ServerSummary {
                    label: server.label.clone(),
                    address: server.address.clone(),
                    params: server.params,
                    summary,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pooled = self
            .servers
            .iter()
            .flat_map(|server| server.latencies.iter().copied())
            .collect::<Vec<_>>();
        let overall = Summary::from_samples(&pooled, confidence)?;

        Ok(MultiServerReport { servers, overall })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSummary {
    pub label: String,
    pub address: String,
    pub params: RunParams,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiServerReport {
    pub servers: Vec<ServerSummary>,
    pub overall: Summary,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    label: &'a str,
    address: &'a str,
    conflicts: u64,
    requests_per_client: usize,
    clients_per_server: usize,
    samples: usize,
    mean: f64,
    min: f64,
    max: f64,
    std_dev: f64,
    p99: f64,
    ci_lower: Option<f64>,
    ci_upper: Option<f64>,
}

impl MultiServerReport {
    /// One bar per server at its mean latency, error bars of twice the standard deviation
    pub fn chart_request(&self, name: &str) -> ChartRequest {
        ChartRequest::Bars {
            name: name.to_owned(),
            title: "Mean latency per server".to_owned(),
            y_label: "latency".to_owned(),
            bars: self
                .servers
                .iter()
                .map(|server| Bar {
                    label: server.label.clone(),
                    value: server.summary.mean,
                    error: 2.0 * server.summary.std_dev,
                })
                .collect(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for server in &self.servers {
            let summary = &server.summary;
            writer.serialize(CsvRow {
                label: &server.label,
                address: &server.address,
                conflicts: server.params.conflicts,
                requests_per_client: server.params.requests_per_client,
                clients_per_server: server.params.clients_per_server,
                samples: summary.count,
                mean: summary.mean,
                min: summary.min,
                max: summary.max,
                std_dev: summary.std_dev,
                p99: summary.p99,
                ci_lower: summary.confidence.map(|ci| ci.lower),
                ci_upper: summary.confidence.map(|ci| ci.upper),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for MultiServerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for server in &self.servers {
            writeln!(f, "== {} ({}) ==", server.label, server.address)?;
            writeln!(
                f,
                "conflicts: {}%, requests per client: {}, clients: {}",
                server.params.conflicts,
                server.params.requests_per_client,
                server.params.clients_per_server
            )?;
            writeln!(f, "{}", server.summary)?;
            writeln!(f)?;
        }
        writeln!(f, "== all servers ==")?;
        write!(f, "{}", self.overall)
    }
}
