use clap::Parser;
use common::{
    config::Config,
    plot::{NoPlot, PlotSink, PythonPlotter},
};
use eyre::Result;
use smr_bench::{
    logging::init_tracing,
    stats::{Cli, run},
};
use tracing::error;

fn main() -> Result<()> {
    let args = Cli::parse();
    let _guard = init_tracing(&args.logging)?;
    let config = Config::load_or_default(&args.config)?;

    let mode = args.mode()?;
    let sink: Box<dyn PlotSink> = if args.skip_plot {
        Box::new(NoPlot)
    } else {
        Box::new(PythonPlotter::new(&config.plot))
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(err) = run(
        &mut stdout,
        &args.file,
        mode,
        &config,
        sink.as_ref(),
        args.csv.as_deref(),
    ) {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}
