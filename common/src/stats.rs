use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE: f64 = 0.95;

#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("No data: cannot compute statistics over an empty sample set")]
    Empty,
    #[error("A confidence interval needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
    #[error("Confidence level must lie in (0, 1), got {0}")]
    InvalidConfidence(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn half_width(&self) -> f64 {
        self.upper - self.mean
    }
}

impl fmt::Display for ConfidenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.mean, self.lower, self.upper)
    }
}

pub fn mean(samples: &[f64]) -> Result<f64, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::Empty);
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation (divisor `n`)
pub fn std_dev(samples: &[f64]) -> Result<f64, StatsError> {
    let mean = mean(samples)?;
    let variance =
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    Ok(variance.sqrt())
}

/// Standard error of the mean, using the sample standard deviation (divisor `n - 1`)
pub fn standard_error(samples: &[f64]) -> Result<f64, StatsError> {
    let n = samples.len();
    if n < 2 {
        return Err(if n == 0 {
            StatsError::Empty
        } else {
            StatsError::TooFewSamples(n)
        });
    }
    let mean = mean(samples)?;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Ok(variance.sqrt() / (n as f64).sqrt())
}

/// `p`-th percentile with linear interpolation between the closest ranks.
pub fn percentile(samples: &[f64], p: f64) -> Result<f64, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::Empty);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64))
}

/// Confidence interval for the mean of `samples` using the Student t distribution
/// with `n - 1` degrees of freedom.
pub fn mean_confidence_interval(
    samples: &[f64],
    confidence: f64,
) -> Result<ConfidenceInterval, StatsError> {
    check_confidence(confidence)?;
    let n = samples.len();
    let se = standard_error(samples)?;
    let mean = mean(samples)?;

    let t = StudentsT::new(0.0, 1.0, (n - 1) as f64)
        .map_err(|_| StatsError::TooFewSamples(n))?
        .inverse_cdf((1.0 + confidence) / 2.0);
    let h = se * t;
    Ok(ConfidenceInterval {
        mean,
        lower: mean - h,
        upper: mean + h,
    })
}

fn check_confidence(confidence: f64) -> Result<(), StatsError> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(StatsError::InvalidConfidence(confidence))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub p99: f64,
    /// `None` when there are too few samples for an interval
    pub confidence: Option<ConfidenceInterval>,
}

impl Summary {
    pub fn from_samples(samples: &[f64], confidence: f64) -> Result<Self, StatsError> {
        check_confidence(confidence)?;
        let mean = mean(samples)?;
        let confidence = match mean_confidence_interval(samples, confidence) {
            Ok(ci) => Some(ci),
            Err(StatsError::TooFewSamples(_)) => None,
            Err(err) => return Err(err),
        };

        Ok(Self {
            count: samples.len(),
            mean,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: std_dev(samples)?,
            p99: percentile(samples, 99.0)?,
            confidence,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples: {}", self.count)?;
        writeln!(f, "mean: {}", self.mean)?;
        writeln!(f, "max: {}", self.max)?;
        writeln!(f, "min: {}", self.min)?;
        writeln!(f, "std: {}", self.std_dev)?;
        writeln!(f, "99th percentile: {}", self.p99)?;
        match &self.confidence {
            Some(ci) => write!(f, "confidence interval: {ci}"),
            None => write!(f, "confidence interval: n/a"),
        }
    }
}
