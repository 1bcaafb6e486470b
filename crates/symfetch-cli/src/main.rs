//! sym-fetch - debug symbol retrieval
//!
//! Scans a directory for binaries, fetches the matching PDB for each from
//! a symbol server and prints one summary line per binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use symfetch_core::{
    scan_binaries, BatchOrchestrator, BatchReport, DeletionPolicy, Engine, FetchConfig,
    OutputLayout, RetrievalOutcome, SizeUnits,
};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "sym-fetch")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch debug symbols for binaries from a symbol server", long_about = None)]
struct Cli {
    /// The input directory to probe for binaries
    #[arg(short = 'i', long = "in", default_value = ".")]
    input: PathBuf,

    /// The symbol destination directory
    #[arg(short = 'o', long = "out", default_value = ".")]
    output: PathBuf,

    /// The output path style [ Debugger | SideBySide ]
    #[arg(short, long, default_value = "SideBySide")]
    style: OutputLayout,

    /// Delete binaries without symbols, e.g. NotFound+NoSymbols+DryRun
    #[arg(short, long, default_value = "None")]
    delete: DeletionPolicy,

    /// Symbol server base URL
    #[arg(long, env = "SYMFETCH_SERVER")]
    server: Option<String>,

    /// Descend into subdirectories of the input directory
    #[arg(short, long)]
    recursive: bool,

    /// Binary extensions to scan
    #[arg(long = "ext", value_delimiter = ',', default_value = "dll")]
    extensions: Vec<String>,

    /// Append-only failure log
    #[arg(long, env = "SYMFETCH_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Program used to expand compressed symbol files
    #[arg(long, env = "SYMFETCH_EXPAND")]
    expand_program: Option<String>,

    /// Expansion timeout in seconds
    #[arg(long, env = "SYMFETCH_EXPAND_TIMEOUT_SECS")]
    expand_timeout: Option<u64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "SYMFETCH_HTTP_TIMEOUT_SECS")]
    http_timeout: Option<u64>,

    /// Print sizes in powers of 1000 (kB, MB) instead of 1024
    #[arg(long)]
    si: bool,

    /// Write the batch report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Result<FetchConfig> {
        let mut config = FetchConfig::from_env()
            .context("Invalid environment configuration")?
            .with_input_dir(&self.input)
            .with_output_dir(&self.output)
            .with_layout(self.style)
            .with_deletion(self.delete)
            .with_recursive(self.recursive)
            .with_extensions(&self.extensions);

        if let Some(server) = &self.server {
            config = config.with_server(server);
        }
        if let Some(log_file) = &self.log_file {
            config = config.with_log_file(log_file);
        }
        if let Some(program) = &self.expand_program {
            config = config.with_expand_program(program);
        }
        if let Some(secs) = self.expand_timeout {
            config = config.with_expand_timeout_secs(secs);
        }
        if let Some(secs) = self.http_timeout {
            config = config.with_http_timeout_secs(secs);
        }
        Ok(config)
    }

    fn size_units(&self) -> SizeUnits {
        if self.si {
            SizeUnits::Decimal
        } else {
            SizeUnits::Binary
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    symfetch_core::init_tracing(cli.json, level);

    let config = cli.config()?;
    let units = cli.size_units();
    let engine = Engine::from_config(&config).context("Invalid configuration")?;
    let binaries = scan_binaries(&config.input_dir, config.recursive, &config.extensions)
        .context("Failed to scan input directory")?;

    info!(
        server = %config.server,
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        layout = %config.layout,
        binaries = binaries.len(),
        "starting symbol retrieval"
    );

    let mut batch = BatchOrchestrator::new(engine, config.deletion);
    let mut stdout = std::io::stdout();
    for binary in &binaries {
        write!(stdout, "Fetching {}... ", binary.display())?;
        stdout.flush()?;
        let file = batch.process(binary).await;
        writeln!(stdout, "{}", file.summary_line_in(units))?;
    }

    let report = batch.finish();
    print_summary(&report);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &BatchReport) {
    if !report.failures.is_empty() {
        println!();
        println!("Symbols not resolved:");
        for (file, diagnostic) in report.failures.iter() {
            println!("  {}{}", file, diagnostic);
        }
    }

    println!();
    let counts: Vec<String> = RetrievalOutcome::ALL
        .iter()
        .map(|outcome| format!("{}: {}", outcome, report.count(*outcome)))
        .collect();
    println!("{} binaries | {}", report.files.len(), counts.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sym-fetch"]).unwrap();
        assert_eq!(cli.style, OutputLayout::SideBySide);
        assert!(cli.delete.is_empty());
        assert_eq!(cli.extensions, vec!["dll".to_string()]);
        assert_eq!(cli.input, PathBuf::from("."));
    }

    #[test]
    fn test_style_is_case_insensitive() {
        let cli = Cli::try_parse_from(["sym-fetch", "-s", "debugger"]).unwrap();
        assert_eq!(cli.style, OutputLayout::Debugger);
    }

    #[test]
    fn test_invalid_style_is_rejected() {
        assert!(Cli::try_parse_from(["sym-fetch", "--style", "Flat"]).is_err());
    }

    #[test]
    fn test_delete_flags_combine() {
        let cli = Cli::try_parse_from(["sym-fetch", "-d", "NotFound+DryRun"]).unwrap();
        assert_eq!(cli.delete, DeletionPolicy::NOT_FOUND | DeletionPolicy::DRY_RUN);
        assert!(Cli::try_parse_from(["sym-fetch", "-d", "Everything"]).is_err());
    }

    #[test]
    fn test_config_applies_flags() {
        let cli = Cli::try_parse_from([
            "sym-fetch",
            "-i",
            "bin",
            "-o",
            "syms",
            "--server",
            "https://symbols.example.com/",
            "--ext",
            "dll,exe",
            "-r",
            "--expand-timeout",
            "30",
        ])
        .unwrap();

        let config = cli.config().unwrap();
    let units = cli.size_units();
        assert_eq!(config.input_dir, PathBuf::from("bin"));
        assert_eq!(config.output_dir, PathBuf::from("syms"));
        assert_eq!(config.server, "https://symbols.example.com");
        assert_eq!(config.extensions, vec!["dll".to_string(), "exe".to_string()]);
        assert!(config.recursive);
        assert_eq!(config.expand_timeout_secs, 30);
    }

    #[test]
    fn test_http_timeout_flag() {
        let cli = Cli::try_parse_from(["sym-fetch", "--http-timeout", "45"]).unwrap();
        let config = cli.config().unwrap();
        assert_eq!(config.http_timeout_secs, 45);
        assert_eq!(config.http_timeout(), std::time::Duration::from_secs(45));
    }

    #[test]
    fn test_si_flag_selects_decimal_units() {
        let cli = Cli::try_parse_from(["sym-fetch"]).unwrap();
        assert_eq!(cli.size_units(), SizeUnits::Binary);

        let cli = Cli::try_parse_from(["sym-fetch", "--si"]).unwrap();
        assert_eq!(cli.size_units(), SizeUnits::Decimal);
    }
}
