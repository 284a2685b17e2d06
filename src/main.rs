use anyhow::Result;
use clap::{Parser, Subcommand};
use dumptruck::config::{self, Config, SourceKind, StorageTarget};
use dumptruck::managers::logging::{init_console_logging, init_logging, LoggingConfig};
use dumptruck::utils::locker::with_staging_lock;
use dumptruck::{BackupManager, RestoreRequest};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dumptruck")]
#[command(about = "Database backup orchestration: dump, upload, rotate, restore", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "dumptruck.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up all configured sources or a single one
    Run {
        /// Specific source to back up (defaults to all sources)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Restore a remote object into a source's database
    Restore {
        /// Configured source the object belongs to
        #[arg(short, long)]
        source: String,

        /// Remote object name, e.g. orders.20240101-0300.gz.enc
        #[arg(short, long)]
        object: String,

        /// Restore into this database instead of the configured one
        #[arg(short, long)]
        database: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List configured sources and storage targets
    List,

    /// Validate configuration file
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_console_logging();
            tracing::error!("Cannot load {:?}", cli.config);
            return Err(e.into());
        }
    };

    // Setup logging with file rotation (must keep guard alive)
    let logging_config = LoggingConfig::from_config(&config.global);
    let _log_guard = init_logging(&logging_config)?;

    match cli.command {
        Commands::Run { source } => {
            let manager = BackupManager::new(config)?;
            let staging_dir = manager.staging_dir();

            let report = with_staging_lock(&staging_dir, || match source {
                Some(ref name) => manager.backup_named(name),
                None => Ok(manager.backup_all()),
            })??;

            for name in &report.succeeded {
                println!("✓ {}", name);
            }
            for failure in &report.failed {
                println!("✗ {} ({}): {}", failure.source, failure.error.stage(), failure.error);
            }
            println!("{}", report.summary());
        }

        Commands::Restore {
            source,
            object,
            database,
            yes,
        } => {
            use dialoguer::Confirm;

            let target = database.as_deref().unwrap_or("its configured database");
            println!("Restore '{}' into source '{}' ({})", object, source, target);

            if !yes {
                let confirm = Confirm::new()
                    .with_prompt("This overwrites the target database. Proceed?")
                    .default(false)
                    .interact()?;

                if !confirm {
                    println!("Restore cancelled.");
                    return Ok(());
                }
            }

            let manager = BackupManager::new(config)?;
            let request = RestoreRequest {
                source,
                object,
                database,
            };

            let outcome = with_staging_lock(&manager.staging_dir(), || {
                manager.restorer().restore(&request)
            })?;

            match outcome {
                Ok(()) => println!("✓ Restore completed successfully"),
                Err(e) => {
                    eprintln!("✗ Restore failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::List => print_configuration(&config),

        Commands::Validate => {
            println!("✓ Configuration is valid");
            println!("  {} source(s), {} storage target(s)", config.sources.len(), config.storage.len());

            let mut missing = false;
            for tool in required_tools(&config) {
                match which::which(&tool) {
                    Ok(path) => println!("✓ {} found at {}", tool, path.display()),
                    Err(_) => {
                        eprintln!("✗ {} not found", tool);
                        missing = true;
                    }
                }
            }

            if missing {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// External programs the configuration depends on
fn required_tools(config: &Config) -> Vec<String> {
    let mut tools = vec![config.global.dump_tool.clone()];
    if config
        .storage
        .iter()
        .any(|t| matches!(t, StorageTarget::Rclone(_)))
    {
        tools.push(config.global.rclone_binary.clone());
    }
    tools
}

fn print_configuration(config: &Config) {
    println!("Configured sources:");
    for source in &config.sources {
        println!("  {}", source.name);
        println!("    Type: {}", source.dbtype());
        match source.kind {
            SourceKind::RavenDbCluster(ref cluster) => {
                println!("    Databases matching: {}", cluster.name_pattern.as_str());
            }
            _ => {
                if let Some(database) = source.database() {
                    println!("    Database: {}", database);
                }
            }
        }
        println!("    Keep: {}", source.keep);
    }

    println!();
    println!("Storage targets:");
    for target in &config.storage {
        println!("  {}", target.label());
    }

    if let Some(ref monitor) = config.monitor {
        println!();
        println!("Monitoring: {}", monitor.url);
    }
}
