use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use pantry::auth;
use pantry::config::ServerConfig;
use pantry::db::PantryDb;
use pantry::models::UserRole;
use pantry::seed;
use pantry::server;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(version, about = "Recipe-sharing platform backend")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        media_dir: Option<PathBuf>,
        /// Bind all interfaces and allow any CORS origin
        #[arg(long)]
        dev: bool,
    },
    /// Seed ingredients from a `name,measurement_unit` CSV file
    LoadIngredients {
        file: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Seed tags from a `name,color,slug` CSV file
    LoadTags {
        file: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Create an account from the terminal
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        password: String,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve { port, db, media_dir, dev } => {
            let mut config = ServerConfig::load(Path::new("."))?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = db {
                config.db_path = db;
            }
            if let Some(media_dir) = media_dir {
                config.media_dir = media_dir;
            }
            config.dev_mode = dev;
            server::start_server(config).await
        }
        Commands::LoadIngredients { file, db } => {
            let db = open_db(db)?;
            let stats = seed::load_ingredients(&db, &file)?;
            println!(
                "Loaded {} ingredients ({} already present)",
                stats.created, stats.skipped
            );
            Ok(())
        }
        Commands::LoadTags { file, db } => {
            let db = open_db(db)?;
            let stats = seed::load_tags(&db, &file)?;
            println!("Loaded {} tags ({} already present)", stats.created, stats.skipped);
            Ok(())
        }
        Commands::CreateUser {
            email,
            username,
            first_name,
            last_name,
            password,
            admin,
            db,
        } => {
            auth::validate_password(&password).map_err(|e| anyhow::anyhow!("{}", e))?;
            let db = open_db(db)?;
            let role = if admin { UserRole::Admin } else { UserRole::User };
            let user = db.create_user(
                &email,
                &username,
                &first_name,
                &last_name,
                &auth::hash_password(&password),
                &role,
            )?;
            println!("Created {} user {} (id {})", user.role, user.username, user.id);
            Ok(())
        }
    }
}

/// Open the database named by `--db`, falling back to the configured path.
fn open_db(db: Option<PathBuf>) -> Result<PantryDb> {
    let config = ServerConfig::load(Path::new("."))?;
    let path = db.unwrap_or(config.db_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    PantryDb::new(&path)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "pantry=debug,tower_http=debug"
    } else {
        "pantry=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
