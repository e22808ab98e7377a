use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use goalprob::report::to_json;
use goalprob::{DataDirectory, LogTarget, RunOverrides, commands, init_logging};

#[derive(Parser, Debug)]
#[command(name = "goalprob")]
#[command(about = "Monte Carlo probability of reaching financial goals")]
struct Args {
    /// Path to the data directory (default: ~/.goalprob/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Write logs to goalprob.log in the data directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the probability of reaching a goal
    Analyze(RunArgs),
    /// Analyze a goal, then rank what-if adjustments
    Scenarios(RunArgs),
    /// Inspect or clear the persisted simulation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// YAML file with the goal, profile, parameters and analyzer settings
    input: PathBuf,

    /// Number of Monte Carlo trials
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Base seed for the trials
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (1 runs sequentially)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Neither load nor save the cache snapshot
    #[arg(long)]
    no_cache_persist: bool,
}

impl From<&RunArgs> for RunOverrides {
    fn from(args: &RunArgs) -> Self {
        RunOverrides {
            iterations: args.iterations,
            seed: args.seed,
            workers: args.workers,
            no_cache_persist: args.no_cache_persist,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show how many live entries the snapshot holds
    Stats,
    /// Delete the snapshot
    Clear,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = DataDirectory::new(args.data_dir.unwrap_or_else(DataDirectory::default_path));

    let target = if args.log_file {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    let _guard = init_logging(data_dir.root(), &args.log_level, target)?;

    let output = match &args.command {
        Command::Analyze(run) => {
            to_json(&commands::analyze(&data_dir, &run.input, &RunOverrides::from(run))?)?
        }
        Command::Scenarios(run) => {
            to_json(&commands::scenarios(&data_dir, &run.input, &RunOverrides::from(run))?)?
        }
        Command::Cache {
            action: CacheAction::Stats,
        } => to_json(&commands::cache_stats(&data_dir))?,
        Command::Cache {
            action: CacheAction::Clear,
        } => {
            let removed = commands::cache_clear(&data_dir)?;
            to_json(&serde_json::json!({ "removed": removed }))?
        }
    };
    println!("{output}");

    tracing::debug!("goalprob exiting");
    Ok(())
}
