use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
    process::Command,
};

use eyre::{Context, ContextCompat, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlotSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    /// Error bar size
    pub error: f64,
}

/// A chart for the visualization sink to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartRequest {
    /// Histogram and box plot of a latency sequence
    Distribution {
        name: String,
        title: String,
        samples: Vec<f64>,
    },
    /// One bar per group with error bars
    Bars {
        name: String,
        title: String,
        y_label: String,
        bars: Vec<Bar>,
    },
}

impl ChartRequest {
    pub fn name(&self) -> &str {
        match self {
            ChartRequest::Distribution { name, .. } | ChartRequest::Bars { name, .. } => name,
        }
    }

    /// Renderer script, relative to [`PlotSettings::script_dir`]
    pub fn script(&self) -> &'static str {
        match self {
            ChartRequest::Distribution { .. } => "distribution.py",
            ChartRequest::Bars { .. } => "bars.py",
        }
    }
}

pub trait PlotSink {
    fn render(&self, request: &ChartRequest) -> Result<()>;
}

/// Drops every request, used with `--skip-plot`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlot;

impl PlotSink for NoPlot {
    fn render(&self, request: &ChartRequest) -> Result<()> {
        debug!("Skipping plot {}", request.name());
        Ok(())
    }
}

/// Dumps the request as json and hands it to a python renderer
#[derive(Debug, Clone)]
pub struct PythonPlotter {
    script_dir: PathBuf,
    output_dir: PathBuf,
    show: bool,
}

impl PythonPlotter {
    pub fn new(settings: &PlotSettings) -> Self {
        Self {
            script_dir: settings.script_dir.clone(),
            output_dir: settings.output_dir.clone(),
            show: settings.show,
        }
    }

    /// Writes `<output_dir>/plot_data/<name>.json` and returns its path
    pub fn write_plot_data(&self, request: &ChartRequest) -> Result<PathBuf> {
        let plot_data_dir = self.output_dir.join("plot_data");
        if !plot_data_dir.exists() {
            create_dir_all(&plot_data_dir)
                .wrap_err(format!("Creating {}", plot_data_dir.display()))?;
        }
        let plot_data_file = plot_data_dir.join(format!("{}.json", request.name()));
        write(&plot_data_file, serde_json::to_string(request)?)
            .wrap_err(format!("Writing {}", plot_data_file.display()))?;
        Ok(plot_data_file)
    }

    fn args(&self, request: &ChartRequest, data_file: &Path) -> Result<Vec<String>> {
        let filepath = self.output_dir.join(format!("{}.pdf", request.name()));
        let mut args = vec![
            path_str(&self.script_dir.join(request.script()))?,
            "--data".to_owned(),
            path_str(data_file)?,
            "--filepath".to_owned(),
            path_str(&filepath)?,
        ];
        if self.show {
            args.push("--show".to_owned());
        }
        Ok(args)
    }
}

impl PlotSink for PythonPlotter {
    fn render(&self, request: &ChartRequest) -> Result<()> {
        let data_file = self.write_plot_data(request)?;
        let args = self.args(request, &data_file)?;
        debug!("python3 {}", args.join(" "));

        let status = Command::new("python3")
            .args(&args)
            .spawn()
            .wrap_err("Spawning python3")?
            .wait()?;
        if !status.success() {
            bail!("Plotting {} failed with {status}", request.name());
        }
        info!("Rendered {}", request.name());
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_owned)
        .context(format!("Non utf-8 path {path:?}"))
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    fn bars() -> ChartRequest {
        ChartRequest::Bars {
            name: "servers".to_owned(),
            title: "Mean latency per server".to_owned(),
            y_label: "latency".to_owned(),
            bars: vec![Bar {
                label: "CA".to_owned(),
                value: 2.5,
                error: 1.0,
            }],
        }
    }

    #[test]
    fn request_is_tagged_by_kind() {
        let json = serde_json::to_value(bars()).unwrap();
        assert_eq!(json["kind"], "bars");
        assert_eq!(json["bars"][0]["label"], "CA");

        let dist = ChartRequest::Distribution {
            name: "run".to_owned(),
            title: "run".to_owned(),
            samples: vec![1.0],
        };
        assert_eq!(serde_json::to_value(&dist).unwrap()["kind"], "distribution");
        assert_eq!(dist.script(), "distribution.py");
    }

    #[test]
    fn writes_plot_data() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = PythonPlotter::new(&PlotSettings {
            script_dir: PathBuf::from("plots"),
            output_dir: dir.path().to_path_buf(),
            show: false,
        });

        let request = bars();
        let file = plotter.write_plot_data(&request).unwrap();
        assert_eq!(file, dir.path().join("plot_data").join("servers.json"));

        let back: ChartRequest = serde_json::from_str(&read_to_string(file).unwrap()).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn renderer_arguments() {
        let plotter = PythonPlotter::new(&PlotSettings {
            script_dir: PathBuf::from("plots"),
            output_dir: PathBuf::from("out"),
            show: true,
        });
        let args = plotter
            .args(&bars(), Path::new("out/plot_data/servers.json"))
            .unwrap();
        assert_eq!(
            args,
            [
                "plots/bars.py",
                "--data",
                "out/plot_data/servers.json",
                "--filepath",
                "out/servers.pdf",
                "--show"
            ]
        );
    }

    #[test]
    fn no_plot_accepts_everything() {
        assert!(NoPlot.render(&bars()).is_ok());
    }
}
