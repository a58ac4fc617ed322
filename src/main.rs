use anyhow::{anyhow, Result};
use clap::Parser;
use retrolaunch::cli::{Cli, Commands, ConfigAction};
use retrolaunch::config::{get_config_file_path, load_config, normalize_key, save_config, LauncherConfig};
use retrolaunch::locator;
use retrolaunch::types::UpdateOutcome;
use retrolaunch::version_store::{VersionKey, VersionStore};
use retrolaunch::Launcher;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    // Load configuration
    let config = load_config()?;

    match cli.command {
        Commands::Version => {
            println!("retrolaunch v{}", env!("CARGO_PKG_VERSION"));
        }

        Commands::List => {
            list_targets(&config);
        }

        Commands::Run { target, content } => {
            let (install_target, release) = config.target(&target)?;
            let launcher = build_launcher(&config, !cli.quiet);

            match launcher
                .resolve_and_launch(&install_target, release.as_ref(), content.as_deref())
                .await
            {
                Ok(resolution) => {
                    tracing::debug!("[{}] load finished ({})", install_target.name, resolution.outcome);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Update { target } => {
            let names: Vec<String> = if target == "all" {
                config.targets.keys().cloned().collect()
            } else {
                vec![normalize_key(&target)]
            };
            let launcher = build_launcher(&config, !cli.quiet);

            let mut failures = 0;
            for name in names {
                let (install_target, release) = config.target(&name)?;
                match launcher.resolve(&install_target, release.as_ref()).await {
                    Ok(resolution) => {
                        if let UpdateOutcome::Failed(reason) = &resolution.outcome {
                            tracing::warn!("Failed to update {}: {}", name, reason);
                            failures += 1;
                        }
                        println!("{}: {}", name, resolution.outcome);
                    }
                    Err(e) => {
                        tracing::error!("{}", e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                std::process::exit(1);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { format } => match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&config)?),
                "yaml" => print!("{}", serde_yaml::to_string(&config)?),
                other => return Err(anyhow!("Unsupported format '{}'. Use json or yaml", other)),
            },
            ConfigAction::Path => {
                println!("{}", get_config_file_path()?.display());
            }
            ConfigAction::Init { force } => {
                let path = get_config_file_path()?;
                if path.exists() && !force {
                    return Err(anyhow!(
                        "{} already exists. Use --force to overwrite it",
                        path.display()
                    ));
                }
                save_config(&config, &path)?;
                tracing::info!("Wrote configuration to {}", path.display());
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn build_launcher(config: &LauncherConfig, show_progress: bool) -> Launcher {
    let settings = &config.settings;
    Launcher::system(
        &settings.user_agent,
        settings.github_token.as_deref(),
        show_progress,
    )
    .with_lock_stale_after(Duration::from_secs(settings.lock_stale_after_secs))
}

fn list_targets(config: &LauncherConfig) {
    println!("--- Configured Targets ---");
    for (name, target_config) in &config.targets {
        let target = target_config.install_target(name, &config.settings);
        let resolved = locator::locate(&target);
        let version = VersionStore::new(&target.root_dir)
            .get(VersionKey::CurrentVersion)
            .ok()
            .flatten()
            .unwrap_or_else(|| "unknown".to_string());

        println!("  - {} ({}) [updates: {:?}]", name, target_config.display_name, target.update_policy);
        match resolved.existing_path() {
            Some(path) => println!("    Path:    {}\n    Version: {}\n", path.display(), version),
            None => println!("    Not installed (looking in {})\n", target.root_dir.display()),
        }
    }
    println!("--------------------------");
}
