// src/main.rs

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use flux::{Config, InstallOutcome, PackageManager, UpdateOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "flux")]
#[command(author, version, about = "Binary package manager with checksum-verified installs", long_about = None)]
struct Cli {
    /// Install root directory
    #[arg(short, long, global = true, default_value = "/")]
    root: PathBuf,

    /// Package database directory (default: <root>/var/lib/flux/packages)
    #[arg(short, long, global = true)]
    db_dir: Option<PathBuf>,

    /// Directory for downloads and staging (default: system temp dir)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Network timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Fail installs when manifest files are missing from the archive
    #[arg(long, global = true)]
    strict: bool,

    /// Do not run packages' post-install scripts
    #[arg(long, global = true)]
    no_scripts: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package from its manifest URL
    Install {
        /// URL or path of the package manifest
        manifest_url: String,
    },
    /// Remove an installed package
    Remove {
        /// Package name to remove
        package_name: String,
    },
    /// Update a package if its manifest carries a newer version
    Update {
        /// Installed package name
        package_name: String,
        /// URL or path of the package manifest
        manifest_url: String,
    },
    /// Update several packages, each given as NAME=MANIFEST_URL
    Upgrade {
        /// Packages and their manifests, e.g. hello=https://repo/hello.json
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// List installed packages
    List,
    /// Show dependencies of an installed package
    Depends {
        /// Package name
        package_name: String,
    },
    /// Show installed packages that depend on a package
    Rdepends {
        /// Package name
        package_name: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(&self.root)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_strict(self.strict)
            .with_run_scripts(!self.no_scripts);

        if let Some(db_dir) = &self.db_dir {
            config = config.with_db_dir(db_dir);
        }
        if let Some(cache_dir) = &self.cache_dir {
            config = config.with_cache_dir(cache_dir);
        }
        config
    }
}

/// Split `name=manifest_url` upgrade targets
fn parse_targets(targets: &[String]) -> Result<Vec<(String, String)>> {
    targets
        .iter()
        .map(|target| match target.split_once('=') {
            Some((name, url)) if !name.is_empty() && !url.is_empty() => {
                Ok((name.to_string(), url.to_string()))
            }
            _ => bail!("Invalid upgrade target '{}': expected NAME=MANIFEST_URL", target),
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command.as_ref() else {
        // No command provided, show help
        println!("Flux Package Manager v{}", env!("CARGO_PKG_VERSION"));
        println!("Run 'flux --help' for usage information");
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        clap_complete::generate(*shell, &mut Cli::command(), "flux", &mut std::io::stdout());
        return Ok(());
    }

    let manager = PackageManager::new(cli.config())?;

    match command {
        Commands::Install { manifest_url } => {
            info!("Installing package from: {}", manifest_url);

            match manager.install(manifest_url)? {
                InstallOutcome::AlreadyInstalled { name, version } => {
                    println!("Package {} version {} is already installed", name, version);
                }
                InstallOutcome::Installed {
                    name,
                    version,
                    entries,
                    warnings,
                } => {
                    println!("Installed package: {} version {}", name, version);
                    println!("  Entries: {}", entries);
                    for warning in &warnings {
                        eprintln!("Warning: {}", warning);
                    }
                }
            }
        }
        Commands::Remove { package_name } => {
            info!("Removing package: {}", package_name);

            let report = manager.remove(package_name)?;
            println!("Removed package: {} version {}", report.name, report.version);
            println!("  Files removed: {}", report.removed);
            for failure in &report.failures {
                eprintln!("Warning: could not remove {}", failure);
            }
        }
        Commands::Update {
            package_name,
            manifest_url,
        } => {
            info!("Checking for updates to {}", package_name);

            match manager.update(package_name, manifest_url)? {
                UpdateOutcome::UpToDate {
                    installed,
                    available,
                } => {
                    println!(
                        "{} is up to date (installed: {}, available: {})",
                        package_name, installed, available
                    );
                }
                UpdateOutcome::Updated { from, to, warnings } => {
                    println!("Updated {}: {} -> {}", package_name, from, to);
                    for warning in &warnings {
                        eprintln!("Warning: {}", warning);
                    }
                }
            }
        }
        Commands::Upgrade { targets } => {
            let targets = parse_targets(targets)?;
            info!("Upgrading {} package(s)", targets.len());

            let report = manager.upgrade(&targets)?;
            for (name, outcome) in &report.outcomes {
                match outcome {
                    UpdateOutcome::UpToDate { installed, .. } => {
                        println!("- {} {} is up to date", name, installed);
                    }
                    UpdateOutcome::Updated { from, to, warnings } => {
                        println!("- {} {} -> {}", name, from, to);
                        for warning in warnings {
                            eprintln!("Warning: {}", warning);
                        }
                    }
                }
            }
            println!("\nUpgrade complete: {} package(s) updated", report.updated());
        }
        Commands::List => {
            let packages = manager.list()?;

            if packages.is_empty() {
                println!("No packages are currently installed.");
            } else {
                for package in &packages {
                    println!("{} (version: {})", package.name, package.version);
                }
                println!("\nTotal: {} package(s)", packages.len());
            }
        }
        Commands::Depends { package_name } => {
            let depends = manager.depends(package_name)?;

            if depends.is_empty() {
                println!("{} has no dependencies", package_name);
            } else {
                println!("{} depends on:", package_name);
                for dep in &depends {
                    let status = if manager.db().exists(dep) {
                        "installed"
                    } else {
                        "missing"
                    };
                    println!("  {} ({})", dep, status);
                }
            }
        }
        Commands::Rdepends { package_name } => {
            let dependents = manager.rdepends(package_name)?;

            if dependents.is_empty() {
                println!("No installed packages depend on {}", package_name);
            } else {
                println!("Packages that depend on {}:", package_name);
                for dependent in &dependents {
                    println!("  {}", dependent);
                }
            }
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
