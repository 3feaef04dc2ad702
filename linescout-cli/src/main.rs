use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use linescout::{
    cpu_features, line_counter, search, CliOverrides, Match, ScanConfig, SearchOutput,
};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pattern to search for (literal or regex)
    pattern: Option<String>,

    /// Files or directories to search (default: current directory)
    paths: Vec<PathBuf>,

    /// Additional pattern to search for (can be specified multiple times)
    #[arg(short = 'p', long = "pattern")]
    patterns: Vec<String>,

    /// Only search the top level of each directory
    #[arg(short = 'n', long, conflicts_with = "recurse")]
    no_recurse: bool,

    /// Search subdirectories even if the config file turns that off
    #[arg(short = 'r', long)]
    recurse: bool,

    /// File extensions to include (e.g. rs,go,js)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Directory names or path globs to skip (replaces the VCS defaults)
    #[arg(long = "exclude-dir")]
    exclude_dirs: Vec<String>,

    /// File name globs to skip
    #[arg(long = "ignore-file")]
    ignore_files: Vec<String>,

    /// Case-insensitive matching
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Number of scanning threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Paths the walker may queue ahead of the scanners
    #[arg(long)]
    queue_capacity: Option<NonZeroUsize>,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file to load after the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    /// Print detected CPU features and the selected line counter, then exit
    #[arg(long)]
    cpu_info: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let patterns: Vec<String> = self
            .pattern
            .iter()
            .chain(self.patterns.iter())
            .cloned()
            .collect();
        let file_extensions = self.extensions.as_ref().map(|e| {
            e.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });
        let recurse_subdirs = if self.no_recurse {
            Some(false)
        } else if self.recurse {
            Some(true)
        } else {
            None
        };

        CliOverrides {
            patterns: non_empty(patterns),
            roots: non_empty(self.paths.clone()),
            recurse_subdirs,
            file_extensions,
            ignore_files: non_empty(self.ignore_files.clone()),
            exclude_dirs: non_empty(self.exclude_dirs.clone()),
            ignore_case: self.ignore_case.then_some(true),
            stats_only: self.stats.then_some(true),
            thread_count: self.threads,
            queue_capacity: self.queue_capacity,
            log_level: self.log_level.clone(),
        }
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether anything matched.
fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    if cli.cpu_info {
        print_cpu_info(cli.json)?;
        return Ok(true);
    }

    let config = ScanConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(cli.overrides());
    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    if config.patterns.iter().all(|p| p.is_empty()) {
        bail!("no search pattern given");
    }

    let output = search(&config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_search_results(&output, config.stats_only);
    }
    Ok(output.has_matches())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_cpu_info(json: bool) -> anyhow::Result<()> {
    let features = cpu_features();
    let variant = line_counter().variant();
    if json {
        let info = serde_json::json!({
            "features": features,
            "line_counter": variant.name(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("sse2:    {}", features.sse2);
    println!("sse4.2:  {}", features.sse4_2);
    println!("popcnt:  {}", features.popcnt);
    println!("line counter: {}", variant.name().green());
    Ok(())
}

fn highlight(m: &Match) -> String {
    let line = &m.line_content;
    match (line.get(..m.start), line.get(m.start..m.end), line.get(m.end..)) {
        (Some(before), Some(hit), Some(after)) => {
            format!("{}{}{}", before, hit.red().bold(), after)
        }
        _ => line.to_string(),
    }
}

fn print_search_results(result: &SearchOutput, stats_only: bool) {
    if stats_only {
        println!(
            "Found {} matches in {} files ({} files scanned, {} directories pruned, {} unreadable)",
            result.total_matches,
            result.files_with_matches,
            result.files_scanned,
            result.walk.dirs_pruned,
            result.walk.unreadable_dirs
        );
        return;
    }

    for file_result in &result.file_results {
        println!("\n{}", file_result.path.display().to_string().blue());
        for m in &file_result.matches {
            println!("{}: {}", m.line_number.to_string().green(), highlight(m));
        }
    }

    println!(
        "\nFound {} matches in {} files",
        result.total_matches, result.files_with_matches
    );
}
