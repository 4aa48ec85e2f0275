//! tph CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tokio::io::BufReader;
use tph_sync::{
    commands::{
        cmd_blocks, cmd_check, cmd_init, cmd_list, cmd_points, cmd_show, cmd_status, cmd_sync,
        cmd_watch, endpoint_source, print_block_completions, print_blocks, print_check,
        print_init, print_listing, print_points, print_record_detail, print_status,
        print_sync_failure, print_sync_report, print_watch_summary, print_watch_update,
        SyncOptions,
    },
    config::Config,
    error::Result,
    geofence::Geofence,
    models::GeoPoint,
    progress::LogWriterFactory,
    session::Session,
    store::LocationStore,
};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tph")]
#[command(version, about = "Offline TPH lookup and geofence checks", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize tph configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Download TPH data and replace the local cache
    Sync {
        /// Fetch from this URL instead of the configured endpoint
        #[arg(long)]
        url: Option<String>,
    },

    /// List block codes
    Blocks {
        /// Output block codes for shell completions
        #[arg(long, value_enum, hide = true)]
        completion: Option<Shell>,
    },

    /// List the TPH points of a block
    Points {
        /// Block code (use 'tph blocks' to list)
        block: String,
    },

    /// Show one TPH record
    Show { block: String, point: String },

    /// Show cached records
    List {
        /// Maximum number of records (defaults to display.list_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Check whether a position is within the radius of a TPH
    Check {
        block: String,
        point: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Radius in meters (defaults to geofence.radius_m)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Read "lat,lng" lines from stdin and report the verdict for each
    Watch {
        block: String,
        point: String,

        /// Radius in meters (defaults to geofence.radius_m)
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let config_path = cli.config.unwrap_or_else(Config::default_config_path);
        let config = cmd_init(&config_path, force).await?;
        if cli.json {
            println!(
                r#"{{"status": "ok", "config": {}}}"#,
                serde_json::to_string(&config.paths.config_file.display().to_string())?
            );
        } else {
            print_init(&config);
        }
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "tph", &mut std::io::stdout());
        print_completion_extras(shell);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let store = LocationStore::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Sync { url } => {
            let options = SyncOptions {
                url,
                quiet: cli.json,
            };

            match cmd_sync(&config, &store, options).await {
                Ok(report) if cli.json => println!("{}", serde_json::to_string_pretty(&report)?),
                Ok(report) => print_sync_report(&report),
                Err(e) => {
                    if !cli.json {
                        print_sync_failure(&e);
                    }
                    return Err(e);
                }
            }
        }

        Commands::Blocks { completion } => {
            let blocks = cmd_blocks(&store).await?;

            if let Some(shell) = completion {
                print_block_completions(&blocks, shell);
            } else if cli.json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                print_blocks(&blocks);
            }
        }

        Commands::Points { block } => {
            let points = cmd_points(&store, &block).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                print_points(&block, &points);
            }
        }

        Commands::Show { block, point } => {
            let detail = cmd_show(&store, &block, &point).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print_record_detail(&detail);
            }
        }

        Commands::List { limit } => {
            let listing = cmd_list(&store, limit.unwrap_or(config.display.list_limit)).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
        }

        Commands::Check {
            block,
            point,
            lat,
            lng,
            radius,
        } => {
            let geofence = geofence_for(&config, radius)?;
            let position = GeoPoint::new(lat, lng)?;
            let result = cmd_check(&store, &geofence, &block, &point, position).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_check(&result);
            }
        }

        Commands::Watch {
            block,
            point,
            radius,
        } => {
            let geofence = geofence_for(&config, radius)?;
            let source = endpoint_source(&config, None)?;
            let (mut session, _events) = Session::new(store.clone(), source, geofence);
            let reader = BufReader::new(tokio::io::stdin());
            let json = cli.json;

            let summary = cmd_watch(&mut session, &block, &point, reader, |update| {
                if json {
                    match serde_json::to_string(update) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to encode update: {}", e),
                    }
                } else {
                    print_watch_update(update);
                }
            })
            .await?;

            if !json {
                print_watch_summary(&summary);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    store.close().await;
    Ok(())
}

fn geofence_for(config: &Config, radius: Option<f64>) -> Result<Geofence> {
    Geofence::new(
        radius.unwrap_or(config.geofence.radius_m),
        config.geofence.distance_method,
    )
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        warn!(
            "Config file not found: {}. Using defaults; run 'tph init' to create one.",
            config_path.display()
        );
        let config = Config::at(&config_path);
        config.validate()?;
        return Ok(config);
    }

    Config::load(&config_path)
}

fn print_completion_extras(shell: Shell) {
    match shell {
        Shell::Bash => {
            println!();
            println!("{raw}", raw = r#"# Dynamic completion for block codes"#);
            println!("{raw}", raw = r#"_tph_dynamic() {"#);
            println!("{raw}", raw = r#"    local cur="${COMP_WORDS[COMP_CWORD]}""#);
            println!("{raw}", raw = r#"    local sub="${COMP_WORDS[1]}""#);
            println!("{raw}", raw = r#"    case "$sub" in"#);
            println!("{raw}", raw = r#"        points|show|check|watch)"#);
            println!("{raw}", raw = r#"            if [[ $COMP_CWORD -eq 2 ]]; then"#);
            println!(
                "{raw}",
                raw = r#"                COMPREPLY=( $(compgen -W "$(tph blocks --completion bash 2>/dev/null)" -- "$cur") )"#
            );
            println!("{raw}", raw = r#"                return 0"#);
            println!("{raw}", raw = r#"            fi"#);
            println!("{raw}", raw = r#"            ;;"#);
            println!("{raw}", raw = r#"    esac"#);
            println!("{raw}", raw = r#"    _tph "$@""#);
            println!("{raw}", raw = r#"}"#);
            println!(
                "{raw}",
                raw = r#"complete -F _tph_dynamic -o bashdefault -o default tph"#
            );
        }
        Shell::Zsh => {
            println!();
            println!("{}", r#"# Dynamic completion for block codes"#);
            println!("{}", r#"_tph_block_codes() {"#);
            println!("{}", r#"    local -a entries"#);
            println!(
                "{}",
                r#"    entries=("${(@f)$(tph blocks --completion zsh 2>/dev/null)}")"#
            );
            println!("{}", r#"    _describe -t blocks 'block codes' entries"#);
            println!("{}", r#"}"#);
        }
        Shell::Fish => {
            println!();
            println!("{}", r#"# Dynamic completion for block codes"#);
            println!(
                "{}",
                r#"complete -c tph -n '__fish_seen_subcommand_from points show check watch' -a '(tph blocks --completion fish 2>/dev/null)'"#
            );
        }
        _ => {}
    }
}
