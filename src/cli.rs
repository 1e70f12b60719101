use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convoy")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative configuration for your hosts over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/convoy/config.toml)
    #[arg(long, global = true, env = "CONVOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file, overriding the settings file
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check declarations without contacting any host
    Validate(DirArgs),

    /// Show what deploy would change
    Propose(DirArgs),

    /// Converge hosts to their declarations and record the result
    Deploy(DeployArgs),

    /// Inspect or edit the recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DirArgs {
    /// Directory to search for convoy.toml / convoy.json
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub dir: DirArgs,

    /// Hosts deployed at once (default from settings)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded resources
    List,

    /// Show the recorded spec of a resource
    Show {
        /// Resource name
        name: String,
    },

    /// Drop a resource from state without touching its host
    Forget {
        /// Resource name
        name: String,
    },
}
