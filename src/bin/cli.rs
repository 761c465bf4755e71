//! JQLDB - CLI Client

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use jqldb::catalog::{Catalog, Column};
use jqldb::config::{DEFAULT_SERVER, DEFAULT_STORAGE};
use jqldb::storage::{Row, Value};
use jqldb::{EngineConfig, ExecutionEngine, Outcome};

/// Print welcome banner
fn print_banner(config: &EngineConfig) {
    println!(
        r#"
   _  ___  _     ____  ____
  | |/ _ \| |   |  _ \| __ )
  | | | | | |   | | | |  _ \
 _| | |_| | |___| |_| | |_) |
|___|\__\_\_____|____/|____/

 JSON tables queried with JQL
 Server '{}', database '{}'
 Type '.help' for help, '.quit' to exit
"#,
        config.server, config.database
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help                         Show this help message
  .quit                         Exit JQLDB
  .tables                       List all tables
  .schema <table>               Show a table's columns
  .create <table> <col:type>... Create a table
  .clear                        Clear screen

JQL:
  table.action(params)[.extension(args)]...

  actions:    select insert replace update delete truncate count
  extensions: where and order limit in with as group on link

Examples:
  .create users id:int name:string age:int
  users.insert(1, 'Alice', 30).and(2, 'Bob', 25)
  users.select(name, age).where(age >= 18).order(age, desc)
  users.update(age).with(31).where(name = 'Alice')
  users.count(*).group(age)
"#
    );
}

/// Format result rows as a table
fn format_results(rows: &[Row]) -> String {
    let columns: Vec<String> = match rows.first() {
        Some(row) => row.keys().cloned().collect(),
        None => return "0 row(s) returned\n".to_string(),
    };

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(Value::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in &cells {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", line));
    }
    output.push_str(&separator);

    output.push_str(&format!("{} row(s) returned\n", rows.len()));
    output
}

/// Execute a JQL query
fn execute_query(query: &str, engine: &mut ExecutionEngine) {
    let query = query.trim().trim_end_matches(';');
    if query.is_empty() {
        return;
    }

    match engine.run(query) {
        Ok(Outcome::Rows(result)) => {
            print!("{}", format_results(result.rows()));
            println!("({:.3} ms)", result.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(Outcome::Written { affected_rows }) => {
            println!("{} row(s) affected", affected_rows);
        }
        Err(e) => eprintln!("{}", e),
    }
}

/// Parse `name:type` column specs, the type defaulting to string
fn parse_columns(specs: &[&str]) -> Vec<Column> {
    specs
        .iter()
        .map(|spec| match spec.split_once(':') {
            Some((name, column_type)) => Column::new(name, column_type),
            None => Column::untyped(*spec),
        })
        .collect()
}

/// Handle special dot commands, returning false to exit
fn handle_special_command(cmd: &str, engine: &mut ExecutionEngine) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return false,
        Some(".tables") => match engine.catalog().list_tables() {
            Ok(tables) if tables.is_empty() => println!("No tables found."),
            Ok(tables) => {
                println!("Tables:");
                for table in tables {
                    println!("  {}", table);
                }
            }
            Err(e) => eprintln!("{}", e),
        },
        Some(".schema") => match parts.get(1) {
            Some(name) => match engine.catalog().read_table(name) {
                Ok(table) => {
                    println!("Table: {}", name);
                    for (column, properties) in &table.properties.columns {
                        match serde_json::to_string(properties) {
                            Ok(json) => println!("  {} {}", column, json),
                            Err(e) => eprintln!("{}", e),
                        }
                    }
                }
                Err(e) => eprintln!("{}", e),
            },
            None => eprintln!("Usage: .schema <table>"),
        },
        Some(".create") => match parts.get(1) {
            Some(name) if parts.len() > 2 => {
                match engine.create_table(name, parse_columns(&parts[2..])) {
                    Ok(_) => println!("Table '{}' created", name),
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ => eprintln!("Usage: .create <table> <column:type>..."),
        },
        Some(".clear") => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = io::stdout().flush();
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    true
}

/// Interactive shell for JQLDB databases
#[derive(Parser, Debug)]
#[command(name = "jqldb-cli", version, about = "Interactive shell for JQLDB databases")]
struct Args {
    /// Root directory holding every server
    #[arg(long, env = "JQLDB_STORAGE", default_value = DEFAULT_STORAGE)]
    storage: PathBuf,

    /// Server directory name
    #[arg(long, env = "JQLDB_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Database to open
    #[arg(short = 'd', long, env = "JQLDB_DATABASE")]
    database: String,

    /// Create the database directory if it does not exist
    #[arg(long)]
    create: bool,
}

impl Args {
    fn config(&self) -> EngineConfig {
        EngineConfig::new()
            .storage_path(&self.storage)
            .server(&self.server)
            .database(&self.database)
    }
}

/// Main REPL loop
fn run_repl(mut engine: ExecutionEngine) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialize the line editor")?;

    loop {
        match editor.readline("jqldb> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);

                if trimmed.starts_with('.') {
                    if !handle_special_command(trimmed, &mut engine) {
                        break;
                    }
                    continue;
                }
                execute_query(trimmed, &mut engine);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jqldb=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();
    if args.create {
        Catalog::new(config.clone())
            .create_database()
            .with_context(|| format!("failed to create database '{}'", config.database))?;
    }

    let engine = ExecutionEngine::new(config.clone())
        .with_context(|| format!("failed to open database '{}'", config.database))?;

    print_banner(&config);
    run_repl(engine)
}
