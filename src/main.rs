//! CLI entry point for `mboxscan`.

use std::io::{BufWriter, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxscan::config::Config;
use mboxscan::parser::mbox::MboxReader;
use mboxscan::pipeline::{self, ScanStats};
use mboxscan::report::summary::SummaryFormat;
use mboxscan::report::{JsonSink, MatchSink, TextSink};
use mboxscan::search::Pattern;

#[derive(Parser)]
#[command(
    name = "mboxscan",
    version,
    about = "Search and summarize MBOX files of any size without indexing them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hide the progress bar and the final statistics
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search headers and plain-text bodies for a pattern
    Search {
        path: PathBuf,
        pattern: String,
        /// Match case exactly (default is case-insensitive)
        #[arg(short = 's', long)]
        case_sensitive: bool,
        /// Treat the pattern as a literal string, not a regex
        #[arg(short = 'F', long)]
        fixed_strings: bool,
        /// One JSON object per matching message
        #[arg(long)]
        json: bool,
    },
    /// Print From, Subject and Date of every message, tab-separated
    Summary {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print every From/To/Cc/Bcc address
    Addresses { path: PathBuf },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mboxscan::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let quiet = cli.quiet;

    match cli.command {
        Commands::Search {
            path,
            pattern,
            case_sensitive,
            fixed_strings,
            json,
        } => cmd_search(
            &path,
            &pattern,
            case_sensitive,
            fixed_strings,
            json,
            &config,
            quiet,
        ),
        Commands::Summary { path, json } => cmd_summary(&path, json, &config, quiet),
        Commands::Addresses { path } => cmd_addresses(&path, &config, quiet),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mboxscan::config::cache_dir(config);
    if config.general.log_to_file && std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender =
            tracing_appender::rolling::never(&log_dir, mboxscan::config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        tracing::info!(
            path = %mboxscan::config::log_file_path(config).display(),
            "Logging to file"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Open the mailbox with the configured buffer and message sizes.
fn open_mailbox(path: &Path, config: &Config) -> anyhow::Result<MboxReader<std::fs::File>> {
    if !path.exists() {
        anyhow::bail!("MBOX file not found: {}", path.display());
    }
    let reader = MboxReader::open_with_capacity(path, config.performance.read_buffer_size)?;
    Ok(reader.with_max_message_size(config.performance.max_message_size))
}

/// Byte progress bar on stderr, hidden when quiet or not on a terminal.
fn progress_bar(reader: &MboxReader<std::fs::File>, label: &str, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(reader.source_len().unwrap_or(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{eta}})"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Search a mailbox and print the matches.
fn cmd_search(
    path: &Path,
    pattern: &str,
    case_sensitive: bool,
    fixed_strings: bool,
    json: bool,
    config: &Config,
    quiet: bool,
) -> anyhow::Result<()> {
    // Invalid patterns are reported before the file is touched.
    let mut options = config.search.pattern_options();
    if case_sensitive {
        options.ignore_case = false;
    }
    if fixed_strings {
        options.literal = true;
    }
    let pattern = Pattern::new(pattern, options)?;

    let mut reader = open_mailbox(path, config)?;
    let pb = progress_bar(&reader, "Searching", quiet);
    let start = Instant::now();

    let out = BufWriter::new(std::io::stdout().lock());
    let mut sink: Box<dyn MatchSink> = if json {
        Box::new(JsonSink::new(out))
    } else {
        Box::new(TextSink::new(out))
    };

    let stats = pipeline::search(
        &mut reader,
        &pattern,
        sink.as_mut(),
        Some(&|current: u64, total: u64| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    if !quiet {
        print_stats(&stats, start.elapsed(), "matching message(s)");
    }
    Ok(())
}

/// Print a one-line summary of every message.
fn cmd_summary(path: &Path, json: bool, config: &Config, quiet: bool) -> anyhow::Result<()> {
    let mut reader = open_mailbox(path, config)?;
    let pb = progress_bar(&reader, "Summarizing", quiet);
    let start = Instant::now();

    let format = if json {
        SummaryFormat::Json
    } else {
        SummaryFormat::Tsv
    };
    let mut out = BufWriter::new(std::io::stdout().lock());

    let stats = pipeline::summarize(
        &mut reader,
        &mut out,
        format,
        Some(&|current: u64, total: u64| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    if !quiet {
        print_stats(&stats, start.elapsed(), "message(s) summarized");
    }
    Ok(())
}

/// Print every address found in the address headers.
fn cmd_addresses(path: &Path, config: &Config, quiet: bool) -> anyhow::Result<()> {
    let mut reader = open_mailbox(path, config)?;
    let pb = progress_bar(&reader, "Extracting", quiet);
    let start = Instant::now();

    let mut out = BufWriter::new(std::io::stdout().lock());

    let stats = pipeline::extract_addresses(
        &mut reader,
        &mut out,
        Some(&|current: u64, total: u64| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    if !quiet {
        print_stats(&stats, start.elapsed(), "message(s) with addresses");
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxscan", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// End-of-run statistics on stderr, so stdout stays pipeable.
fn print_stats(stats: &ScanStats, elapsed: std::time::Duration, matched_label: &str) {
    use humansize::{format_size, BINARY};

    eprintln!();
    eprintln!("  {:<25} {}", "Messages", stats.messages);
    eprintln!("  {:<25} {}", matched_label, stats.matched);
    if stats.skipped > 0 {
        eprintln!("  {:<25} {}", "Skipped (malformed)", stats.skipped);
    }
    eprintln!("  {:<25} {}", "Scanned", format_size(stats.bytes, BINARY));
    eprintln!("  {:<25} {:.2?}", "Elapsed", elapsed);
}
