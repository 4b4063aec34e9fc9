//! mcp-setup - MCP server setup CLI

use clap::{Parser, Subcommand};
use console::style;
use mcp_setup::registry::parse_key_list;
use mcp_setup::{
    workflow, Catalog, EnvError, EnvManager, InstallMethod, InstallerOptions, Paths, Quickstart, QuickstartOptions,
    Registry, RegistryError, Selection, SystemRunner, TerminalPrompter, TestType, TesterOptions, WorkflowError,
};

#[derive(Parser)]
#[command(name = "mcp-setup")]
#[command(about = "MCP server setup - install, configure, and smoke-test MCP connectors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry file path or http(s) URL
    #[arg(long, global = true, default_value = "mcp-servers-config.json")]
    config: String,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install MCP servers from the registry
    Install {
        /// Only install servers of this method
        #[arg(long, value_enum)]
        method: Option<InstallMethod>,

        /// Comma-separated server keys
        #[arg(long)]
        servers: Option<String>,

        /// Skip the toolchain prerequisite check
        #[arg(long)]
        skip_check: bool,
    },

    /// Smoke-test the servers in the generated editor configuration
    Test {
        /// Which passes to run
        #[arg(long, value_enum, default_value = "all")]
        test_type: TestType,

        /// Comma-separated server keys
        #[arg(long)]
        servers: Option<String>,

        /// Leave started servers running
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Manage server environment variables
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Guided setup: environment, install, test, editor integration
    Quickstart {
        /// Only install servers of this method
        #[arg(long, value_enum)]
        method: Option<InstallMethod>,

        /// Comma-separated server keys
        #[arg(long)]
        servers: Option<String>,

        /// Skip environment variable setup
        #[arg(long)]
        skip_env: bool,

        /// Skip server tests
        #[arg(long)]
        skip_test: bool,
    },

    /// Show resolved paths (for debugging)
    Paths,
}

#[derive(Subcommand)]
enum EnvAction {
    /// Prompt for variable values and save them
    Setup {
        /// Only variables needed by these comma-separated server keys
        #[arg(long)]
        servers: Option<String>,
    },

    /// List saved variables (sensitive values masked)
    List,

    /// Export saved variables into this process and report them
    Apply,

    /// Remove a saved variable
    Remove {
        /// Variable name
        name: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Env(#[from] EnvError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let paths = Paths::resolve();
    log::debug!("base dir: {}", paths.base_dir.display());

    if let Err(e) = run(cli, &paths).await {
        eprintln!("{}", style(format!("Error: {}", e)).red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, paths: &Paths) -> Result<(), CliError> {
    match cli.command {
        Commands::Paths => {
            print_paths(paths);
        }
        Commands::Install { method, servers, skip_check } => {
            let registry = Registry::load(&cli.config).await?;
            let selection = Selection::new(method, servers.as_deref());
            workflow::install(paths, &registry, &selection, &SystemRunner, InstallerOptions::default(), skip_check)
                .await?;
        }
        Commands::Test { test_type, servers, no_cleanup } => {
            let registry = Registry::load(&cli.config).await?;
            let keys = servers.as_deref().map(parse_key_list);
            let options = TesterOptions { cleanup: !no_cleanup, ..Default::default() };
            workflow::test(paths, &registry, keys.as_deref(), test_type, options).await?;
        }
        Commands::Env { action } => {
            let registry = load_registry_or_empty(&cli.config).await;
            let manager = EnvManager::new(paths, Catalog::builtin().with_registry(&registry));
            match action {
                EnvAction::Setup { servers } => {
                    let keys = servers.as_deref().map(parse_key_list);
                    let mut prompter = TerminalPrompter::new();
                    let summary = manager.setup(&mut prompter, keys.as_deref())?;
                    println!(
                        "\n{}",
                        style(format!("{} set, {} skipped", summary.set.len(), summary.skipped.len())).green()
                    );
                }
                EnvAction::List => manager.list()?,
                EnvAction::Apply => {
                    let applied = manager.apply()?;
                    if applied > 0 {
                        for var in manager.listed()? {
                            println!("{}", style(format!("✓ {}", var.name)).green());
                        }
                        println!("\n{}", style(format!("Applied {} environment variables", applied)).green());
                        println!(
                            "{}",
                            style("Variables are set for this process only; source an activation script to keep them:")
                                .dim()
                        );
                        println!("  {}", style(paths.activation_sh().display()).cyan());
                    }
                }
                EnvAction::Remove { name } => {
                    manager.remove(&name)?;
                }
            }
        }
        Commands::Quickstart { method, servers, skip_env, skip_test } => {
            let registry = Registry::load(&cli.config).await?;
            let options = QuickstartOptions {
                method,
                keys: servers.as_deref().map(parse_key_list),
                skip_env,
                skip_test,
                ..Default::default()
            };
            let mut prompter = TerminalPrompter::new();
            let outcome = Quickstart::new(paths, &registry, &SystemRunner, &mut prompter).run(options).await?;
            if let Some(steps) = outcome {
                if steps.failed.is_empty() {
                    println!("\n{}", style("Quick-start complete. Every step succeeded.").green().bold());
                } else {
                    println!(
                        "\n{}",
                        style("Quick-start finished with failed steps. Check the errors above.").yellow().bold()
                    );
                }
            }
        }
    }
    Ok(())
}

/// Registry for variable ownership. Environment management works from the
/// built-in catalog alone, so a missing registry only narrows it.
async fn load_registry_or_empty(location: &str) -> Registry {
    match Registry::load(location).await {
        Ok(registry) => registry,
        Err(e) => {
            log::warn!("{}; continuing without registry metadata", e);
            Registry::default()
        }
    }
}

fn print_paths(paths: &Paths) {
    println!("Base dir:    {}", paths.base_dir.display());
    println!("Servers dir: {}", paths.servers_dir().display());
    println!("Config dir:  {}", paths.config_dir().display());
    let files = [
        ("Integration file", paths.integration_file()),
        ("Environment store", paths.env_store_file()),
        ("Install log", paths.install_log_file()),
        ("Test report", paths.test_report_file()),
        ("Activation script", paths.activation_sh()),
    ];
    for (label, path) in files {
        println!("{:<18} {} (exists: {})", format!("{}:", label), path.display(), path.exists());
    }
}
