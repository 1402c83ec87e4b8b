use anyhow::Result;
use circq_core::{telemetry, Settings, StressConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

mod report;
mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "circq")]
#[command(about = "circq - stress driver for the lock-free circular queues", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (pretty, json)
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    output: OutputFormat,

    /// Directory holding default.toml / {env}.toml / local.toml
    #[arg(long, global = true, env = "CIRCQ_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// One producer, one consumer; checks strict FIFO
    Spsc(RunArgs),

    /// Many producers and consumers; checks exactly-once delivery
    Mpmc {
        #[command(flatten)]
        run: RunArgs,

        /// Producer threads
        #[arg(short, long)]
        producers: Option<usize>,

        /// Consumer threads
        #[arg(short, long)]
        consumers: Option<usize>,
    },

    /// Print the effective configuration
    Config {
        /// Print the JSON schema instead
        #[arg(long)]
        schema: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Items sent by each producer
    #[arg(short, long)]
    items: Option<u64>,

    /// Queue capacity (2, 4, 64, 1024 or 65536)
    #[arg(long)]
    capacity: Option<usize>,

    /// Pin worker threads to cores
    #[arg(long)]
    pin: bool,

    /// Deadline for the whole run in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl RunArgs {
    fn apply(&self, stress: &mut StressConfig) {
        if let Some(items) = self.items {
            stress.items_per_producer = items;
        }
        if let Some(capacity) = self.capacity {
            stress.capacity = capacity;
        }
        if self.pin {
            stress.pin_threads = true;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            stress.timeout_ms = timeout_ms;
        }
    }
}

/// Load settings and install the subscriber; nothing is logged before that.
fn startup(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config_dir.clone())?;
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    telemetry::init_tracing(&settings.logging)?;
    info!(config_dir = ?cli.config_dir, env = %settings.env, "configuration loaded");
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = startup(&cli)?;

    match cli.command {
        Commands::Config { schema } => {
            if schema {
                let schema = schemars::schema_for!(Settings);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print!("{}", settings.to_toml()?);
            }
            Ok(())
        }
        Commands::Spsc(run) => {
            run.apply(&mut settings.stress);
            settings.stress.producers = 1;
            settings.stress.consumers = 1;
            execute(Scenario::Spsc, &settings, cli.output)
        }
        Commands::Mpmc {
            run,
            producers,
            consumers,
        } => {
            run.apply(&mut settings.stress);
            if let Some(p) = producers {
                settings.stress.producers = p;
            }
            if let Some(c) = consumers {
                settings.stress.consumers = c;
            }
            execute(Scenario::Mpmc, &settings, cli.output)
        }
    }
}

fn execute(scenario: Scenario, settings: &Settings, output: OutputFormat) -> Result<()> {
    settings.validate()?;
    let report = scenario::run(scenario, &settings.stress)?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => print!("{}", report::render_pretty(&report)),
    }
    if !report.passed() {
        error!(?scenario, "run failed its checks");
        std::process::exit(1);
    }
    Ok(())
}
