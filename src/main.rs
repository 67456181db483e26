use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use msbuild_console::{
    BuildResult, ConsoleScanner, HtmlAnnotator, NoopAnnotator, OutcomePolicy, ScanConfig,
    ScanReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    #[value(name = "none")]
    Off,
}

#[derive(Parser)]
#[command(name = "msbuild-console")]
#[command(about = "Pass MSBuild console output through while counting warnings and errors")]
#[command(version)]
struct Args {
    /// Input file with MSBuild output (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file for the unchanged console bytes (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// Console encoding label, e.g. UTF-8, windows-1252, ibm866
    #[arg(short = 'e', long, default_value = "UTF-8")]
    encoding: String,

    /// Write HTML-annotated diagnostic lines to FILE
    #[arg(long, value_name = "FILE")]
    markup: Option<PathBuf>,

    /// Report printed to stderr once the stream ends
    #[arg(long, value_enum, default_value = "text")]
    report: ReportFormat,

    /// Include every parsed diagnostic in the JSON report
    #[arg(long)]
    details: bool,

    /// Exit code of the MSBuild process that produced the output
    #[arg(long, value_name = "N", default_value = "0", allow_hyphen_values = true)]
    exit_code: i32,

    /// Treat a build whose summary lists warnings as unstable
    #[arg(long)]
    unstable_if_warnings: bool,

    /// Do not fail on a non-zero MSBuild exit code
    #[arg(long)]
    continue_on_build_failure: bool,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("--buffer-size must be greater than zero".to_string());
        }
        if self.details && self.report != ReportFormat::Json {
            return Err("--details requires --report json".to_string());
        }
        Ok(())
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            encoding: self.encoding.clone(),
            buffer_size: self.buffer_size,
            policy: OutcomePolicy {
                unstable_if_warnings: self.unstable_if_warnings,
                continue_on_build_failure: self.continue_on_build_failure,
            },
            retain_diagnostics: self.details,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();

    debug!("msbuild-console started with verbosity level: {}", verbose);
}

fn main() {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(args.verbose);

    match run(args) {
        Ok(result) => std::process::exit(result.exit_code()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<BuildResult> {
    let scanner = ConsoleScanner::new(args.scan_config())?;
    info!(encoding = %scanner.encoding(), "scanning console output");

    // Set up input
    let input: Box<dyn Read> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path)
            .with_context(|| format!("Failed to open input file '{}'", input_path.display()))?;
        Box::new(BufReader::with_capacity(args.buffer_size, file))
    } else {
        Box::new(io::stdin().lock())
    };

    // Set up output
    let mut output: Box<dyn Write> = if let Some(output_path) = &args.output_file {
        let file = File::create(output_path).with_context(|| {
            format!("Failed to create output file '{}'", output_path.display())
        })?;
        Box::new(BufWriter::with_capacity(args.buffer_size, file))
    } else {
        Box::new(BufWriter::with_capacity(args.buffer_size, io::stdout()))
    };

    let mut markup = match &args.markup {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create markup file '{}'", path.display()))?;
            Some(HtmlAnnotator::new(BufWriter::new(file)))
        }
        None => None,
    };

    let report = match markup.as_mut() {
        Some(html) => scanner.scan(input, &mut output, html),
        None => scanner.scan(input, &mut output, NoopAnnotator),
    }
    .context("Processing failed")?;

    output.flush()?;
    if let Some(html) = markup {
        html.into_inner().flush().context("Failed to write markup file")?;
    }

    let result = scanner.outcome(&report, args.exit_code);
    print_report(&report, result, args.report)?;

    Ok(result)
}

fn print_report(report: &ScanReport, result: BuildResult, format: ReportFormat) -> Result<()> {
    let stderr = io::stderr();
    let mut err = stderr.lock();

    match format {
        ReportFormat::Off => {}
        ReportFormat::Json => {
            let value = serde_json::json!({
                "result": result,
                "report": report,
            });
            writeln!(err, "{}", serde_json::to_string(&value)?)?;
        }
        ReportFormat::Text => {
            writeln!(
                err,
                "msbuild-console: summary: {} warning(s), {} error(s)",
                summary_value(report.summary.warnings()),
                summary_value(report.summary.errors())
            )?;
            writeln!(
                err,
                "msbuild-console: diagnostics: {} warning line(s), {} error line(s)",
                report.diagnostics.warnings, report.diagnostics.errors
            )?;
            if result == BuildResult::Unstable {
                writeln!(err, "> Set build UNSTABLE because there are warnings.")?;
            }
            writeln!(err, "msbuild-console: result: {}", result)?;
        }
    }

    Ok(())
}

fn summary_value(count: i32) -> String {
    if count < 0 {
        "unreported".to_string()
    } else {
        count.to_string()
    }
}
