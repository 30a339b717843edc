//! Command-line front end for `history-store` archives (spec.md §6).

use clap::{Parser, Subcommand};
use history_store::{Archive, ColumnMatchPolicy, CommitInfo, CreateOptions, FileStore, Scalar, Table};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "history-store-cli", version, about = "Inspect and mutate a history-store archive")]
struct Cli {
    /// Directory the archive is stored in.
    #[arg(long, default_value = "./archive")]
    path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new, empty archive at `--path`.
    Create {
        /// Primary key column names, comma-separated. Omit for an
        /// un-keyed archive.
        #[arg(long, value_delimiter = ',')]
        key: Vec<String>,
        /// Reject commits that change a matched row's key value.
        #[arg(long)]
        immutable_key: bool,
    },
    /// List every committed version.
    List,
    /// Print the table live at `version`.
    Checkout { version: i64 },
    /// Commit a CSV snapshot (first line is the header row).
    Commit {
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    /// Truncate the archive to retain only versions `<= version`.
    Rollback { version: i64 },
    /// Alias for `list`, showing commit provenance.
    Log,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(2)
        }
        Err(CliError::History(err)) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

enum CliError {
    Usage(String),
    History(history_store::HistoryError),
}

impl From<history_store::HistoryError> for CliError {
    fn from(err: history_store::HistoryError) -> Self {
        CliError::History(err)
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Create { key, immutable_key } => {
            let options = if key.is_empty() {
                CreateOptions::default()
            } else {
                CreateOptions::keyed(key)
            }
            .with_immutable_key(immutable_key)
            .with_column_match_policy(ColumnMatchPolicy::ByName);
            Archive::create(options, Box::new(FileStore::open(&cli.path)?))?;
            println!("created archive at {}", cli.path.display());
            Ok(())
        }
        Command::List | Command::Log => {
            let archive = open(&cli.path)?;
            for descriptor in archive.snapshots().as_slice() {
                println!(
                    "v{}\t{}\t{}",
                    descriptor.version,
                    descriptor.committed_at.to_rfc3339(),
                    descriptor.description.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Checkout { version } => {
            let archive = open(&cli.path)?;
            let table = archive.checkout(version)?;
            print_table(&table);
            Ok(())
        }
        Command::Commit { file, description } => {
            let archive = open(&cli.path)?;
            let (columns, rows) = read_csv(&file).map_err(CliError::Usage)?;
            let version = archive.commit(
                columns,
                rows,
                CommitInfo { description, operation: Some("commit".to_string()), source: Some(file.display().to_string()) },
            )?;
            println!("committed version {version}");
            Ok(())
        }
        Command::Rollback { version } => {
            let archive = open(&cli.path)?;
            archive.rollback(version)?;
            println!("rolled back to version {version}");
            Ok(())
        }
    }
}

fn open(path: &PathBuf) -> Result<Archive, CliError> {
    Archive::open(Box::new(FileStore::open(path)?)).map_err(CliError::from)
}

fn read_csv(path: &PathBuf) -> Result<(Vec<String>, Vec<Vec<Scalar>>), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut lines = contents.lines();
    let header = lines.next().ok_or_else(|| "empty CSV file".to_string())?;
    let columns: Vec<String> = header.split(',').map(str::trim).map(str::to_string).collect();

    let rows = lines
        .filter(|l| !l.trim().is_empty())
        .map(|line| line.split(',').map(str::trim).map(parse_scalar).collect())
        .collect();
    Ok((columns, rows))
}

fn parse_scalar(field: &str) -> Scalar {
    if field.is_empty() {
        Scalar::Null
    } else if let Ok(i) = field.parse::<i64>() {
        Scalar::Integer(i)
    } else if let Ok(f) = field.parse::<f64>() {
        Scalar::Float(f)
    } else if let Ok(b) = field.parse::<bool>() {
        Scalar::Bool(b)
    } else {
        Scalar::Text(field.to_string())
    }
}

fn print_table(table: &Table) {
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
    for row in &table.rows {
        for (i, value) in row.iter().enumerate() {
            let len = scalar_text(value).len();
            if i < widths.len() {
                widths[i] = widths[i].max(len);
            }
        }
    }

    print_rule(&widths, '┌', '┬', '┐');
    print_row(&widths, &table.columns);
    print_rule(&widths, '├', '┼', '┤');
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(scalar_text).collect();
        print_row(&widths, &cells);
    }
    print_rule(&widths, '└', '┴', '┘');
}

fn print_rule(widths: &[usize], left: char, mid: char, right: char) {
    print!("{left}");
    for (i, width) in widths.iter().enumerate() {
        print!("{}", "─".repeat(width + 2));
        if i + 1 < widths.len() {
            print!("{mid}");
        }
    }
    println!("{right}");
}

fn print_row<S: AsRef<str>>(widths: &[usize], cells: &[S]) {
    print!("│");
    for (i, width) in widths.iter().enumerate() {
        let text = cells.get(i).map(AsRef::as_ref).unwrap_or("");
        print!(" {text:width$} ");
        print!("│");
    }
    println!();
}

fn scalar_text(value: &Scalar) -> String {
    match value {
        Scalar::Null => "NULL".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => format!("{f}"),
        Scalar::Text(s) => s.clone(),
        Scalar::DateTime(dt) => dt.to_rfc3339(),
    }
}
