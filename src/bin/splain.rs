//! splain: explain log search queries from the command line
//!
//! # Usage
//!
//! ```bash
//! # Explain a query
//! splain 'index=main earliest=-24h | stats count BY host | table host, count'
//!
//! # From a file, as JSON
//! splain --file detection.spl --format json
//!
//! # Only the warnings
//! splain check 'index=main | join host [search index=dns]' --strict
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::*;
use splain::prelude::*;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "splain")]
#[command(version)]
#[command(about = "Explain pipe-chained log search queries without running them", long_about = None)]
#[command(after_help = "EXAMPLES:
    splain 'index=main | stats count BY host'
    splain --file query.spl --format json
    splain parse 'index=web | join host [search index=dns | stats count]'
    splain check 'index=web | transaction user' --strict")]
struct Cli {
    /// The query to explain (read from --file or stdin when omitted)
    query: Option<String>,

    /// Read the query from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Leave the input query block out of the document
    #[arg(long)]
    no_raw_query: bool,

    /// Never call the external engine
    #[arg(long)]
    rule_only: bool,

    /// Model identifier reported in metadata
    #[arg(long, env = "SPLAIN_MODEL")]
    model: Option<String>,

    /// External engine command, e.g. "llm -m gpt-4o-mini"
    #[arg(long, env = "SPLAIN_ENGINE")]
    engine: Option<String>,

    /// Config file (default: ./splain.toml, then the user config dir)
    #[arg(long, env = "SPLAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the extracted structure of a query
    Parse {
        /// The query to parse
        query: Option<String>,
    },
    /// Print only the validation warnings
    Check {
        /// The query to check
        query: Option<String>,

        /// Exit with status 1 when any warning fires
        #[arg(long)]
        strict: bool,
    },
    /// Show the recognized command keywords
    Commands,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Parse { query }) => {
            read_query(query.as_deref(), cli.file.as_deref()).map(|q| show_structure(&q))
        }
        Some(Commands::Check { query, strict }) => {
            read_query(query.as_deref(), cli.file.as_deref()).map(|q| {
                if !check_query(&q) && *strict {
                    std::process::exit(1);
                }
            })
        }
        Some(Commands::Commands) => {
            show_commands();
            Ok(())
        }
        None => explain_query(&cli),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "splain=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SPLAIN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_query(query: Option<&str>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(q) = query {
        return Ok(q.to_string());
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("No query given. Pass it as an argument, use --file, or pipe it to stdin");
    }
    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn explain_query(cli: &Cli) -> anyhow::Result<()> {
    let query = read_query(cli.query.as_deref(), cli.file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.engine.model = model.clone();
    }
    if let Some(engine) = &cli.engine {
        config.engine.command = engine.split_whitespace().map(String::from).collect();
        config.engine.enabled = true;
    }
    if cli.no_raw_query {
        config.output.include_raw_query = false;
    }
    let format = cli.format.unwrap_or(config.output.format);

    let explainer = Explainer::from_config(&config).prefer_external(!cli.rule_only);
    let explanation = explainer.explain(&query);

    if cli.verbose {
        eprintln!(
            "{} engine={} model={}",
            "Explained:".dimmed(),
            explanation.engine.to_string().cyan(),
            explanation.model
        );
        if let Some(err) = &explanation.error {
            eprintln!("{} {}", "Engine error:".yellow(), err);
        }
    }

    match format {
        OutputFormat::Markdown => println!("{}", explanation.document),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&explanation)?),
    }
    Ok(())
}

fn show_structure(query: &str) {
    let pipeline = splain::parse(query);
    let ov = &pipeline.overview;

    println!("{}", "splain Parsed Structure".cyan().bold());
    println!();
    println!("  {} {}", "Base:".dimmed(), pipeline.base.white());
    println!("  {} {}", "Index:".dimmed(), join_or_dash(&ov.indexes));
    println!("  {} {}", "Sourcetype:".dimmed(), join_or_dash(&ov.sourcetypes));
    let window = if ov.time_window.is_unbounded() {
        "-".to_string()
    } else {
        ov.time_window.to_string()
    };
    println!("  {} {}", "Time range:".dimmed(), window);

    if !pipeline.segments.is_empty() {
        println!("  {}", "Segments:".dimmed());
        for seg in &pipeline.segments {
            let keyword = match seg.command {
                Command::Other => seg.keyword.yellow(),
                _ => seg.keyword.cyan(),
            };
            println!("    | {} {}", keyword, seg.body.white());
        }
    }

    for join in &pipeline.operations.joins {
        println!("  {}", "Join:".dimmed());
        println!("    {} {}", "on".dimmed(), join.fields.white());
        println!("    {} {}", "subsearch".dimmed(), join.subsearch.yellow());
    }

    println!();
    println!("{} {}", "Intent:".green().bold(), splain::intent::classify(query));
}

fn join_or_dash(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Print warnings; true when there are none.
fn check_query(query: &str) -> bool {
    let warnings = validate(&splain::parse(query));
    if warnings.is_empty() {
        println!("{} {}", "✓".green(), splain::validator::NO_WARNINGS);
        return true;
    }
    for w in &warnings {
        println!("{} {}", "⚠".yellow(), w);
    }
    false
}

fn show_commands() {
    println!("{}", "splain Recognized Commands".cyan().bold());
    println!();
    println!(
        "{:14} {:14} {}",
        "Keyword".white().bold(),
        "Category".white().bold(),
        "Purpose".white().bold()
    );
    println!("{}", "─".repeat(60).dimmed());

    for (keyword, command, purpose) in Command::KEYWORDS {
        println!(
            "{:14} {:14} {}",
            keyword.cyan().bold(),
            command.label().yellow(),
            purpose.dimmed()
        );
    }
    println!();
    println!(
        "{}",
        "Any other keyword is kept verbatim under 'other'.".dimmed()
    );
}
