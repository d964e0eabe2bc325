//! Movie Data Importer
//!
//! Seeds or clears the movie collection from a JSON file.
//!
//! Usage:
//!   cargo run --bin import_movies -- --import
//!   cargo run --bin import_movies -- --import --file ./data/movies.json
//!   cargo run --bin import_movies -- --delete

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use movie_catalog_backend::config::{load_env, Config};
use movie_catalog_backend::movies::{MovieInput, MovieStore, NewMovie};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Import or delete the movie catalog data
#[derive(Parser, Debug)]
#[command(name = "import_movies")]
#[command(about = "Load movies from a JSON file into the catalog, or clear it")]
#[command(group(ArgGroup::new("action").required(true).args(["import", "delete"])))]
struct Cli {
    /// Create the movies listed in --file
    #[arg(long)]
    import: bool,

    /// Delete every movie in the catalog
    #[arg(long)]
    delete: bool,

    /// JSON array of movies
    #[arg(long, default_value = "data/movies.json")]
    file: PathBuf,

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
    let config = Config::from_env()?;
    let db_path = cli.db_path.unwrap_or(config.database_path);

    let store = MovieStore::new(&db_path)?.with_creator(config.movie_creator);
    info!("📊 Using database at {}", db_path);

    if cli.delete {
        let deleted = store.delete_all()?;
        println!("Data successfully deleted ({} movies)", deleted);
    }

    if cli.import {
        let movies = load_movies(&cli.file)?;
        match store.import(&movies) {
            Ok(count) => println!("Data successfully imported ({} movies)", count),
            Err(e) => {
                error!("Import failed: {:#}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Parse and validate every entry, reporting all invalid ones at once
fn load_movies(path: &Path) -> Result<Vec<NewMovie>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let inputs: Vec<MovieInput> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of movies", path.display()))?;

    let mut movies = Vec::with_capacity(inputs.len());
    let mut problems = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let label = input.name.clone().unwrap_or_else(|| format!("#{}", index));
        match input.into_new_movie() {
            Ok(movie) => movies.push(movie),
            Err(errors) => problems.push(format!("{}: {}", label, errors.join(". "))),
        }
    }

    if !problems.is_empty() {
        anyhow::bail!("Invalid movies in {}:\n{}", path.display(), problems.join("\n"));
    }

    Ok(movies)
}
