//! CLI Entry Point for impydance
//!
//! Provides command-line interface for:
//! - Generating a configuration file (`cfg`)
//! - Frequency sweeps (`fsweep`)
//! - Amplitude sweeps (`asweep`)
//!
//! # Usage
//!
//! ```bash
//! impydance cfg --device USB0::0xF4EC::0xEE38::123456789::INSTR
//! impydance fsweep results.txt
//! impydance asweep --batch results.txt
//! impydance fsweep --simulate
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use impydance::app::{self, SweepRequest};
use impydance::config::{self, Configuration, DEFAULT_CONFIG_FILE};
use impydance::data::WriteMode;
use impydance::instrument::{MockLcrMeter, Session, Transport};
use impydance::logging::{self, OutputFormat, TracingConfig};
use impydance::measurement::{Sample, SweepResult};
use impydance::sweep::{StepInfo, SweepKind};
use std::path::PathBuf;

const CONNECTION_HINTS: &str = "Could not connect to the device. You can try the following:
  - make sure remote control is set to USBTMC
  - reconnect the USB cable
  - generate a new configuration file with `impydance cfg`";

#[derive(Parser)]
#[command(name = "impydance", version)]
#[command(about = "Read data from a BK894 LCR meter", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new configuration file
    Cfg {
        /// File to store the configuration in
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        filename: PathBuf,

        /// VISA resource string of the meter (a placeholder is written otherwise)
        #[arg(long)]
        device: Option<String>,
    },

    /// Perform a frequency sweep
    Fsweep(SweepArgs),

    /// Perform an amplitude sweep
    Asweep(SweepArgs),
}

#[derive(Args)]
struct SweepArgs {
    /// File to save measured data to; data is not saved if omitted
    filename: Option<PathBuf>,

    /// Perform a batch run of 5 sweeps
    #[arg(short, long)]
    batch: bool,

    /// Append to the file instead of replacing it
    #[arg(long)]
    append: bool,

    /// Configuration file to use
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Use the built-in simulated meter instead of the VISA device
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = logging::parse_log_level(&cli.log_level).map_err(anyhow::Error::msg)?;
    logging::init(TracingConfig::new(level).with_format(OutputFormat::Compact))
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Cfg { filename, device } => write_config_file(filename, device),
        Commands::Fsweep(args) => sweep(SweepKind::Frequency, args),
        Commands::Asweep(args) => sweep(SweepKind::Amplitude, args),
    }
}

fn write_config_file(filename: PathBuf, device: Option<String>) -> Result<()> {
    let mut configuration = Configuration::default();
    if let Some(device) = device {
        configuration.device = device;
    }
    config::write_config(&filename, &configuration)
        .with_context(|| format!("Failed to write configuration to {}", filename.display()))?;
    println!("Configuration file saved as: {}", filename.display());
    Ok(())
}

fn sweep(kind: SweepKind, args: SweepArgs) -> Result<()> {
    let configuration = config::load(&args.config).with_context(|| {
        format!(
            "Failed to load configuration from {} (generate one with `impydance cfg`)",
            args.config.display()
        )
    })?;

    let mode = if args.append {
        WriteMode::Append
    } else {
        WriteMode::Truncate
    };
    let request = SweepRequest::new(kind)
        .batch(args.batch)
        .output(args.filename.as_deref())
        .mode(mode);

    if let Some(path) = request.output {
        println!("Saving data to {}", path.display());
    }

    let results = if args.simulate {
        let session = Session::with_transport(MockLcrMeter::new());
        run(&configuration, session, &request)?
    } else {
        let session = Session::open(&configuration.device, configuration.timeout)
            .context(CONNECTION_HINTS)?;
        run(&configuration, session, &request)?
    };

    tracing::info!(
        passes = results.len(),
        saved = request.output.is_some(),
        "sweep finished"
    );
    Ok(())
}

fn run<T: Transport>(
    configuration: &Configuration,
    session: Session<T>,
    request: &SweepRequest<'_>,
) -> Result<Vec<SweepResult>> {
    let (primary, secondary) = configuration.function.headers();
    let fixed = match request.kind {
        SweepKind::Frequency => configuration.voltage,
        SweepKind::Amplitude => configuration.frequency,
    };

    let print_row = |step: StepInfo, sample: &Sample| {
        if step.index == 0 {
            println!();
            println!("{} sweep {}/{}", title(request.kind), step.repetition + 1, request.repetitions());
            println!("{}", request.kind.describe_fixed(fixed));
            println!();
            println!("{:<18}{:<14}{:<14}", request.kind.column_header(), primary, secondary);
            println!("{}", "-".repeat(46));
        }
        println!(
            "{:<18}{:<14.3e}{:<14.3e}",
            sample.value, sample.primary, sample.secondary
        );
    };

    let results = app::execute_sweep(configuration, session, request, print_row)
        .with_context(|| format!("{} sweep failed", request.kind))?;
    println!();
    Ok(results)
}

fn title(kind: SweepKind) -> &'static str {
    match kind {
        SweepKind::Frequency => "Frequency",
        SweepKind::Amplitude => "Amplitude",
    }
}
