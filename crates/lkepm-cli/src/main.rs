mod commands;

use clap::{Parser, Subcommand};
use commands::{exit_code_for, json_pretty};
use lkepm_core::{CoreError, ManagerConfig, PluginManager, RestoreMode};
use lkepm_store::DeploymentState;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "lkepm",
    version,
    about = "Inspect Linkurious Enterprise plugin packages and move them between deployment states"
)]
struct Cli {
    /// Path to a TOML config file (defaults to $LKEPM_CONFIG, then ~/.config/lkepm/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of the running plugin manager package.
    #[arg(long, global = true)]
    self_dir: Option<PathBuf>,

    /// Host-root candidate, probed in order. Repeat to add more; replaces the configured list.
    #[arg(long = "host-root", global = true)]
    host_roots: Vec<PathBuf>,

    /// Whether `restore` copies or moves the recycle-bin artifact.
    #[arg(long, global = true)]
    restore_mode: Option<RestoreMode>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the manifest of the plugin manager itself.
    Manifest,
    /// List the valid packages of a deployment state.
    List {
        /// enabled, disabled, recyclebin, available, or deployed.
        #[arg(long, default_value = "enabled")]
        state: DeploymentState,
    },
    /// Show the manifest of an enabled package.
    Inspect {
        /// File name in the enabled directory.
        file: String,
    },
    /// Install a package file, directory, or `-` for an archive on stdin.
    Install {
        source: String,
        /// Consume the source file, as for a temporary upload.
        #[arg(long = "move", default_value_t = false)]
        consume: bool,
    },
    /// Install a package bundled with the host distribution.
    InstallAvailable {
        /// Plugin name or catalog file name.
        name: String,
    },
    /// Move an enabled package to the disabled directory.
    Disable { file: String },
    /// Move a disabled package back to the enabled directory.
    Enable { file: String },
    /// Bring a package back from the recycle bin.
    Restore { file: String },
    /// Move an enabled package to the recycle bin.
    Delete { file: String },
    /// Remove every entry of the disabled or recycle-bin directory.
    Purge {
        /// disabled or recyclebin.
        state: DeploymentState,
    },
    /// Print the log file of a plugin instance.
    Logs {
        /// Instance name; defaults to the configured instance.
        instance: Option<String>,
    },
    /// Parse a package source and show what was found, without installing it.
    Parse {
        /// File, directory, or `-` for an archive on stdin.
        source: String,
    },
}

fn resolve_config(cli: &Cli) -> Result<ManagerConfig, CoreError> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::load_default()?,
    };
    if let Some(dir) = &cli.self_dir {
        config.self_dir.clone_from(dir);
    }
    if !cli.host_roots.is_empty() {
        config.host_roots.clone_from(&cli.host_roots);
    }
    if let Some(mode) = cli.restore_mode {
        config.restore_mode = mode;
    }
    tracing::debug!(
        "self dir {}, {} host-root candidates, restore mode {}",
        config.self_dir.display(),
        config.host_roots.len(),
        config.restore_mode
    );
    Ok(config)
}

fn run(cli: &Cli) -> Result<u8, CoreError> {
    use commands::lifecycle::Action;

    let json = cli.json;
    let open = || -> Result<PluginManager, CoreError> { PluginManager::open(&resolve_config(cli)?) };

    match &cli.command {
        Commands::Parse { source } => commands::parse::run(source, json),
        Commands::Manifest => commands::manifest::run(&open()?, json),
        Commands::List { state } => commands::list::run(&open()?, *state, json),
        Commands::Inspect { file } => commands::inspect::run(&open()?, file, json),
        Commands::Install { source, consume } => {
            commands::install::run(&open()?, source, *consume, json)
        }
        Commands::InstallAvailable { name } => {
            commands::install::run_available(&open()?, name, json)
        }
        Commands::Disable { file } => commands::lifecycle::run(&open()?, Action::Disable, file, json),
        Commands::Enable { file } => commands::lifecycle::run(&open()?, Action::Enable, file, json),
        Commands::Restore { file } => commands::lifecycle::run(&open()?, Action::Restore, file, json),
        Commands::Delete { file } => commands::lifecycle::run(&open()?, Action::Delete, file, json),
        Commands::Purge { state } => commands::purge::run(&open()?, *state, json),
        Commands::Logs { instance } => {
            let config = resolve_config(cli)?;
            let manager = PluginManager::open(&config)?;
            let instance = instance.as_deref().or(config.instance.as_deref());
            commands::logs::run(&manager, instance)
        }
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LKEPM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let kind = e.kind();
            if cli.json {
                match json_pretty(&e.report()) {
                    Ok(report) => println!("{report}"),
                    Err(_) => eprintln!("error: {kind}: {e}"),
                }
            } else {
                eprintln!("error: {kind}: {e}");
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}
