//! AutoDB Inspect Binary
//!
//! Inspection of an AutoDB data directory.
//!
//! Every subcommand is read-only: torn tails and damaged records are reported
//! as found, never repaired.

use std::path::{Path, PathBuf};
use std::process;

use autodb::table::{LoadedTable, RecordState, TableRecovery};
use autodb::{AutoDbError, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AutoDB Inspect
#[derive(Parser, Debug)]
#[command(name = "autodb-inspect")]
#[command(about = "Inspect AutoDB table files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tables and files that failed to load
    Tables {
        /// Data directory
        #[arg(short, long, default_value = "./autodb_data")]
        data_dir: PathBuf,
    },

    /// Print the records of one table
    Dump {
        /// Data directory
        #[arg(short, long, default_value = "./autodb_data")]
        data_dir: PathBuf,

        /// Type id of the table
        #[arg(short, long)]
        type_id: String,

        /// Include tombstoned records
        #[arg(short, long)]
        all: bool,
    },

    /// Check a single table file without modifying it
    Verify {
        /// Table file
        file: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,autodb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> autodb::Result<()> {
    let max_record_size = Config::default().max_record_size;

    match command {
        Commands::Tables { data_dir } => {
            for (path, loaded) in scan(&data_dir, max_record_size)? {
                match loaded {
                    Ok(table) => {
                        let live = table.records.iter().filter(|r| r.is_live()).count();
                        println!(
                            "{}\t{} live / {} slots\t{}{}",
                            table.meta.type_id,
                            live,
                            table.records.len(),
                            path.display(),
                            if table.report.is_clean() { "" } else { "\t(damaged)" }
                        );
                    }
                    Err(e) => println!("FAILED\t{}\t{}", path.display(), e),
                }
            }
        }
        Commands::Dump {
            data_dir,
            type_id,
            all,
        } => {
            let table = find_table(&data_dir, &type_id, max_record_size)?;
            for record in &table.records {
                if !all && record.state() == RecordState::Tombstoned {
                    continue;
                }
                let state = match record.state() {
                    RecordState::Live => "live",
                    RecordState::Tombstoned => "deleted",
                };
                match record.decode(&table.meta.schema, &table.meta.type_id) {
                    Ok(object) => println!("{}\t{}\t{}", record.slot(), state, object),
                    Err(e) => println!("{}\t{}\t<{}>", record.slot(), state, e),
                }
            }
        }
        Commands::Verify { file } => {
            let report = TableRecovery::verify(&file, max_record_size)?;
            println!("frames applied:    {}", report.frames_applied);
            println!("records recovered: {}", report.records_recovered);
            println!("damaged records:   {}", report.damaged_records);
            println!("frames skipped:    {}", report.frames_skipped);
            println!("bytes truncated:   {}", report.bytes_truncated);
            if !report.is_clean() {
                process::exit(2);
            }
        }
    }
    Ok(())
}

fn scan(
    data_dir: &Path,
    max_record_size: usize,
) -> autodb::Result<Vec<(PathBuf, autodb::Result<LoadedTable>)>> {
    tracing::debug!("AutoDB Inspect v{}", autodb::VERSION);
    if !data_dir.is_dir() {
        return Err(AutoDbError::Config(format!(
            "{} is not a directory",
            data_dir.display()
        )));
    }
    TableRecovery::recover_dir(data_dir, max_record_size)
}

/// The loaded table whose header names `type_id`
fn find_table(
    data_dir: &Path,
    type_id: &str,
    max_record_size: usize,
) -> autodb::Result<LoadedTable> {
    let mut failed = None;
    for (path, loaded) in scan(data_dir, max_record_size)? {
        match loaded {
            Ok(table) if table.meta.type_id == type_id => return Ok(table),
            Ok(_) => {}
            Err(e) => failed = Some((path, e)),
        }
    }
    Err(match failed {
        Some((path, e)) => AutoDbError::CorruptFile {
            path,
            reason: format!("no readable table for '{}'; unreadable file: {}", type_id, e),
        },
        None => AutoDbError::DatabaseNotFound {
            path: data_dir.to_path_buf(),
        },
    })
}
