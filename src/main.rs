use anyhow::{Context, Result};
use clap::Parser;
use cycleprof::cli::{Cli, Command};
use cycleprof::config::SessionConfig;
use cycleprof::demo::{self, DemoKind};
use cycleprof::report::Report;
use cycleprof::session::Session;
use cycleprof::timer;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Settings for one demo run
struct DemoArgs {
    kind: DemoKind,
    output: Option<PathBuf>,
    format: Option<cycleprof::ReportFormat>,
    config: Option<PathBuf>,
    capacity: Option<usize>,
    depth: u32,
    bytes: usize,
    input: Option<PathBuf>,
}

fn run_demo(args: DemoArgs) -> Result<()> {
    // fib(40) already takes hundreds of millions of calls
    if args.kind == DemoKind::Recursion && args.depth > 40 {
        anyhow::bail!("Invalid value for --depth: {} (must be <= 40)", args.depth);
    }

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(output) = args.output {
        config = config.with_output(output);
    }
    if let Some(format) = args.format {
        config = config.with_format(format);
    }
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }

    let session = Session::open(config)?;
    match args.kind {
        DemoKind::Nested => {
            demo::nested();
        }
        DemoKind::Recursion => {
            let value = demo::fib(args.depth);
            println!("fib({}) = {}", args.depth, value);
        }
        DemoKind::Bandwidth => match &args.input {
            Some(path) => {
                let data = demo::read_file(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                println!("Read {} bytes from {}", data.len(), path.display());
            }
            None => {
                demo::copy_buffer(args.bytes);
                println!("Copied {} bytes", args.bytes);
            }
        },
    }

    let report = session
        .close()
        .context("Profiling session was lost before it could be closed")?;
    eprintln!(
        "{} blocks, {:.3}ms total",
        report.blocks.len(),
        report.total_ms
    );
    Ok(())
}

fn run_show(
    path: PathBuf,
    format: cycleprof::ReportFormat,
    sort: cycleprof::report::SortKey,
    filter: Option<String>,
    top: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    let mut report = Report::from_json(&content)
        .with_context(|| format!("{} is not a JSON report", path.display()))?;

    if let Some(pattern) = filter {
        let regex = Regex::new(&pattern)
            .with_context(|| format!("Invalid --filter regex: {}", pattern))?;
        report.retain_matching(&regex);
    }
    report.sort_by(sort);
    if let Some(n) = top {
        report.truncate(n);
    }

    print!("{}", report.render(format)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Command::Demo {
            kind,
            output,
            format,
            config,
            capacity,
            depth,
            bytes,
            input,
        } => run_demo(DemoArgs {
            kind,
            output,
            format,
            config,
            capacity,
            depth,
            bytes,
            input,
        })?,
        Command::Show {
            report,
            format,
            sort,
            filter,
            top,
        } => run_show(report, format, sort, filter, top)?,
        Command::Calibrate { interval_ms } => {
            if interval_ms == 0 {
                anyhow::bail!("Invalid value for --interval-ms: 0 (must be > 0)");
            }
            let freq = timer::estimate_cpu_freq(Duration::from_millis(interval_ms));
            println!("Estimated cycle counter frequency: {} Hz", freq);
        }
    }

    Ok(())
}
