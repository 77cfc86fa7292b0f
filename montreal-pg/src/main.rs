//! Point d'entrée CLI pour montreal-pg

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use montreal_pg::ImportError;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Importer les données ouvertes de Montréal dans PostGIS
#[derive(Parser)]
#[command(name = "montreal-pg")]
#[command(author, version)]
#[command(about = "Import Montreal open data (boundaries, land use, buildings, property assessment) into PostGIS")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(err) = cli::cmd_import(&cli.command).await {
        // Fichier absent : le pipeline a déjà affiché le message
        if !matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::SourceNotFound(_))
        ) {
            eprintln!("Error: {:#}", err);
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
