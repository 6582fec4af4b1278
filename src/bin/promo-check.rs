use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use log::*;

use promo_quorum::config::{StorageKind, ValidatorConfig};
use promo_quorum::validator::QUORUM;
use promo_quorum::{open_store, QuorumValidator, Result};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Storage {
    Memory,
    Sqlite,
}

impl From<Storage> for StorageKind {
    fn from(value: Storage) -> Self {
        match value {
            Storage::Memory => StorageKind::Memory,
            Storage::Sqlite => StorageKind::Sqlite,
        }
    }
}

/// Check promo codes against three code lists (valid when found in at least two).
#[derive(Debug, Parser)]
#[command(name = "promo-check", version)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage backend, overriding the configuration
    #[arg(long, value_enum)]
    storage: Option<Storage>,

    /// SQLite database path, overriding the configuration
    #[arg(long)]
    db: Option<PathBuf>,

    /// Source files in order (exactly three), overriding the configuration
    #[arg(long = "source", num_args = 3)]
    sources: Option<Vec<PathBuf>>,

    /// Also print how many sources contain each code
    #[arg(short, long)]
    verbose: bool,

    /// Codes to check
    #[arg(required = true)]
    codes: Vec<String>,
}

fn build_config(args: &Args) -> Result<ValidatorConfig> {
    let mut config = match &args.config {
        Some(path) => ValidatorConfig::from_json_file(path)?,
        None => ValidatorConfig::default(),
    };
    if let Some(storage) = args.storage {
        config.storage = storage.into();
    }
    if let Some(db) = &args.db {
        config.sqlite.database_path = db.clone();
    }
    if let Some(sources) = &args.sources {
        config.source_paths = sources.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Verdict for one code, plus the number of sources holding it when asked.
/// Each code is looked up once.
fn check_code(validator: &QuorumValidator, code: &str, with_hits: bool) -> Result<(bool, Option<usize>)> {
    if with_hits && !code.is_empty() {
        let hits = validator.hit_count(code)?;
        Ok((hits >= QUORUM, Some(hits)))
    } else {
        Ok((validator.validate_code(code)?, None))
    }
}

fn run(args: &Args) -> Result<bool> {
    let config = build_config(args)?;
    info!("Opening {:?} promo store", config.storage);
    let validator = QuorumValidator::new(Arc::from(open_store(&config)?));

    let mut all_valid = true;
    for code in &args.codes {
        match check_code(&validator, code, args.verbose) {
            Ok((valid, hits)) => {
                all_valid &= valid;
                let verdict = if valid { "valid" } else { "invalid" };
                match hits {
                    Some(hits) => println!("{}\t{}\t{} sources", code, verdict, hits),
                    None => println!("{}\t{}", code, verdict),
                }
            }
            Err(e) if e.is_user_input() => {
                all_valid = false;
                println!("{}\tinvalid\t{}", code, e);
            }
            Err(e) => {
                if let Err(close_err) = validator.close() {
                    warn!("Failed to close promo store: {}", close_err);
                }
                return Err(e);
            }
        }
    }
    validator.close()?;
    Ok(all_valid)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
