//! poiframe CLI: snapshot regeneration and POI reframing.
//!
//! Usage:
//!   poiframe init-db [--db PATH] [--reset]   Create the SQLite schema
//!   poiframe snapshot [OPTIONS]              Rebuild stale snapshots
//!   poiframe reframe [OPTIONS]               Reframe a clip along a POI path
//!   poiframe check                           Check tools and database

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use poiframe_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "poiframe",
    about = "Keyframe-driven reframing and snapshot regeneration",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/poiframe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    InitDb {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Delete and recreate the database
        #[arg(long)]
        reset: bool,
    },

    /// Regenerate stale snapshot outputs
    Snapshot(commands::snapshot::SnapshotArgs),

    /// Reframe a video along POI keyframes from a CSV file
    Reframe(commands::reframe::ReframeArgs),

    /// Check external tools and database schema
    Check {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    poiframe_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::InitDb { db, reset } => {
            commands::init_db::run(db.unwrap_or_else(|| config.database.clone()), reset)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Snapshot(args) => commands::snapshot::run(args, &config).await,
        Commands::Reframe(args) => commands::reframe::run(args, &config),
        Commands::Check { db } => {
            commands::check::run(db.unwrap_or_else(|| config.database.clone()), &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_snapshot_flags_parse() {
        let cli = Cli::try_parse_from([
            "poiframe",
            "snapshot",
            "--db",
            "shoot/toweb.db",
            "--out-w",
            "320",
            "--out-h",
            "180",
            "--duration",
            "2.5",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Snapshot(args) => {
                assert_eq!(args.db, Some(PathBuf::from("shoot/toweb.db")));
                assert_eq!(args.out_w, Some(320));
                assert_eq!(args.out_h, Some(180));
                assert_eq!(args.duration, Some(2.5));
                assert!(args.dry_run);
                assert!(args.out_dir.is_none());
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_reframe_defaults() {
        let cli = Cli::try_parse_from(["poiframe", "reframe"]).unwrap();
        match cli.command {
            Commands::Reframe(args) => {
                assert_eq!(args.input, PathBuf::from("in.mov"));
                assert_eq!(args.poi, PathBuf::from("poi.csv"));
                assert_eq!(args.output, PathBuf::from("out_reframe.mp4"));
                assert_eq!((args.out_w, args.out_h), (1920, 1080));
                assert_eq!(args.venc, "h264_videotoolbox");
                assert_eq!(args.vb, "20M");
            }
            _ => panic!("expected reframe"),
        }
    }
}
