//! Runs dumped by the closed-loop client as a single json object, ie.
//! `{"ReqsNb": 5000, "Writes": 100, "Rounds": 1, "Conflicts": 0, "LatenciesNano": [...]}`

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use common::{LATENCY_DIVISOR, plot::ChartRequest, stats};
use serde::{Deserialize, Serialize};

use crate::ParseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FullRun {
    pub latencies_nano: Vec<i64>,
    pub reqs_nb: u64,
    pub conflicts: i64,
    #[serde(default)]
    pub writes: Option<i64>,
    #[serde(default)]
    pub rounds: Option<i64>,
}

/// Only the latencies, for a quick look at the mean
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinimalRun {
    pub latencies_nano: Vec<i64>,
}

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ParseError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn scaled_latencies(latencies_nano: &[i64]) -> Vec<f64> {
    latencies_nano
        .iter()
        .map(|&x| x as f64 / LATENCY_DIVISOR)
        .collect()
}

/// The "us" figure printed for a run: the mean of the scaled latencies, scaled once more
pub fn reported_mean(scaled: &[f64]) -> Result<f64, ParseError> {
    Ok(stats::mean(scaled)? / LATENCY_DIVISOR)
}

impl FullRun {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        load(path)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ParseError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn summarize(&self) -> Result<FullReport, ParseError> {
        let latencies = scaled_latencies(&self.latencies_nano);
        Ok(FullReport {
            reqs_nb: self.reqs_nb,
            conflicts: self.conflicts,
            writes: self.writes,
            rounds: self.rounds,
            mean_us: reported_mean(&latencies)?,
            latencies,
        })
    }
}

impl MinimalRun {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        load(path)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ParseError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn mean_latency_us(&self) -> Result<f64, ParseError> {
        reported_mean(&scaled_latencies(&self.latencies_nano))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullReport {
    pub reqs_nb: u64,
    pub conflicts: i64,
    pub writes: Option<i64>,
    pub rounds: Option<i64>,
    pub mean_us: f64,
    /// Latencies after a single division by [`LATENCY_DIVISOR`]
    pub latencies: Vec<f64>,
}

impl FullReport {
    pub fn chart_request(&self, name: &str) -> ChartRequest {
        ChartRequest::Distribution {
            name: name.to_owned(),
            title: format!(
                "{} requests, {}% conflicts",
                self.reqs_nb, self.conflicts
            ),
            samples: self.latencies.clone(),
        }
    }
}

impl fmt::Display for FullReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of requests {}", self.reqs_nb)?;
        writeln!(f, "Conflict percentage {}", self.conflicts)?;
        if let Some(writes) = self.writes {
            writeln!(f, "Write percentage {writes}")?;
        }
        if let Some(rounds) = self.rounds {
            writeln!(f, "Rounds {rounds}")?;
        }
        write!(f, "mean latency: {}us", self.mean_us)
    }
}
