use anyhow::Result;
use clap::{Parser, Subcommand};
use juno::cli::{AppContext, ConfigOverrides, commands};
use juno::infra::config::default_config_dir;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "juno",
    version,
    about = "Manage Python virtual environments registered as Jupyter kernels"
)]
struct Cli {
    /// Directory holding the virtual environments (default: ~/.jupyter_venvs)
    #[arg(long, env = "JUNO_VENV_DIR", global = true)]
    venv_dir: Option<PathBuf>,

    /// Configuration directory (default: ~/.config/juno)
    #[arg(long, env = "JUNO_CONFIG_DIR", default_value_os_t = default_config_dir(), global = true)]
    config_dir: PathBuf,

    /// Host Python used for `venv` and `jupyter` (default: python3)
    #[arg(long, env = "JUNO_PYTHON", global = true)]
    python: Option<PathBuf>,

    /// Seconds before a single venv/pip/jupyter call is killed (0 disables)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Number of operations run in parallel
    #[arg(long, default_value_t = 2, global = true)]
    jobs: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List managed environments
    List,
    /// Show name, path and Python version of an environment
    Show { name: String },
    /// Create environments and register them as Jupyter kernels
    Create {
        #[arg(required = true)]
        names: Vec<String>,
        /// Extra packages, comma separated (e.g. "numpy, pandas")
        #[arg(long, short)]
        packages: Option<String>,
    },
    /// Unregister kernels and delete environments
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Install packages into an environment
    Install {
        name: String,
        /// Comma separated package list
        packages: String,
    },
    /// List installed packages in freeze format
    Packages { name: String },
    /// Export requirements (pip freeze) to stdout or a file
    Export {
        name: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the command that activates an environment
    Activate { name: String },
    /// Write a default juno.toml into the config directory
    Setup,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("juno=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = cli.config_dir;
    let overrides = ConfigOverrides {
        venv_dir: cli.venv_dir,
        python: cli.python,
        timeout_secs: cli.timeout,
    };
    let jobs = cli.jobs;
    // Setup runs without loading the config.
    let load = || AppContext::load(&config_dir, overrides.clone(), jobs);

    match cli.command {
        Commands::Setup => commands::setup(&config_dir),
        Commands::List => commands::list(&load()?),
        Commands::Show { name } => commands::show(&load()?, &name),
        Commands::Create { names, packages } => {
            commands::create(&load()?, &names, packages.as_deref())
        }
        Commands::Remove { names, yes } => commands::remove(&load()?, &names, yes),
        Commands::Install { name, packages } => commands::install(&load()?, &name, &packages),
        Commands::Packages { name } => commands::packages(&load()?, &name),
        Commands::Export { name, output } => {
            commands::export(&load()?, &name, output.as_deref())
        }
        Commands::Activate { name } => commands::activate(&load()?, &name),
    }
}
