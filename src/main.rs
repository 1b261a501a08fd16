use anyhow::{Context, Result};
use clap::Parser;
use pirscope::config::Config;
use pirscope::dsp::iir::IirFilter;
use pirscope::history::SampleHistory;
use pirscope::monitor::Monitor;
use pirscope::pipeline::Pipeline;
use pirscope::sensor::{DeviceSource, SyntheticSource};
use pirscope::util::signal::StopSignal;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pirscope")]
#[command(version, about = "Read a PIR motion sensor, smooth it, and watch the history")]
struct Cli {
    /// Feed the pipeline from a simulated sensor instead of the serial device
    #[arg(long)]
    test: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env(cli.test);

    let shutdown = StopSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("[main] interrupt received, stopping");
            shutdown.raise();
        })
        .context("failed to install interrupt handler")?;
    }

    let history = Arc::new(SampleHistory::prefilled(config.capacity));
    let filter = IirFilter::new(config.filter);
    let spawned = if config.simulate {
        Pipeline::spawn(SyntheticSource::new(config.synthetic), filter, history)
    } else {
        let source = DeviceSource::open(&config.device, config.baud)
            .context("failed to start serial interface")?;
        Pipeline::spawn(source, filter, history)
    };
    let pipeline = spawned.context("failed to spawn ingestion thread")?;

    let mut monitor = Monitor::new(
        pipeline.history(),
        config.motion,
        config.output,
        std::io::stdout().lock(),
    );
    let watched = monitor.run(&shutdown, config.refresh, || pipeline.is_finished());

    // Stopping an already finished thread just collects its result.
    let report = pipeline.stop().context("sensor ingestion failed")?;
    watched.context("failed to write snapshots")?;

    info!(
        "[main] done: {} readings, {} skipped frames, {} motion events",
        report.pushed,
        report.skipped,
        monitor.motion_events()
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
