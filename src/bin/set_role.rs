//! Account Role Tool
//!
//! Promotes or demotes an account. Signup always creates plain users, so this
//! is the only way to grant admin.
//!
//! Usage:
//!   cargo run --bin set_role -- --email admin@example.com --role admin
//!   cargo run --bin set_role -- --email someone@example.com --role user

use anyhow::{Context, Result};
use clap::Parser;
use movie_catalog_backend::auth::models::UserRole;
use movie_catalog_backend::auth::UserStore;
use movie_catalog_backend::config::{load_env, Config};
use tracing::info;

/// Change the role of an existing account
#[derive(Parser, Debug)]
#[command(name = "set_role")]
#[command(about = "Grant or revoke admin rights for an account")]
struct Cli {
    /// E-mail address of the account
    #[arg(long)]
    email: String,

    /// New role: user or admin
    #[arg(long)]
    role: UserRole,

    /// SQLite database (defaults to DATABASE_PATH)
    #[arg(long)]
    db_path: Option<String>,
}

fn main() -> Result<()> {
    load_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = match cli.db_path {
        Some(path) => path,
        None => Config::from_env()?.database_path,
    };

    let store = UserStore::new(&db_path)?;
    let email = cli.email.trim().to_lowercase();
    let user = store
        .find_by_email(&email)?
        .with_context(|| format!("No active account with email {}", email))?;

    if user.role == cli.role {
        println!("{} is already {}", email, cli.role.as_str());
        return Ok(());
    }

    store.set_role(&user.id, cli.role)?;
    info!(user_id = %user.id, role = cli.role.as_str(), "🛡️  Role updated");
    println!("{} is now {}", email, cli.role.as_str());

    Ok(())
}
