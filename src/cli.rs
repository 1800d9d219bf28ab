//! CLI argument parsing for cycleprof

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::demo::DemoKind;
use crate::report::{ReportFormat, SortKey};

#[derive(Parser, Debug)]
#[command(name = "cycleprof")]
#[command(version)]
#[command(about = "Low-overhead instrumentation profiler with cycle-accurate block timing", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a bundled workload under a profiling session
    Demo {
        /// Workload to run
        #[arg(value_enum)]
        kind: DemoKind,

        /// Report destination (default: profile_results.txt)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,

        /// Report format (default: inferred from the output extension)
        #[arg(long = "format", value_enum)]
        format: Option<ReportFormat>,

        /// TOML session configuration file
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Statistics table capacity
        #[arg(long = "capacity", value_name = "SLOTS")]
        capacity: Option<usize>,

        /// Fibonacci argument for the recursion workload
        #[arg(long = "depth", default_value = "25")]
        depth: u32,

        /// Buffer size for the bandwidth workload when no input is given
        #[arg(long = "bytes", default_value = "67108864")]
        bytes: usize,

        /// File to read for the bandwidth workload
        #[arg(long = "input", value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Render a saved JSON report
    Show {
        /// Report produced with --format json
        report: PathBuf,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: ReportFormat,

        /// Row ordering
        #[arg(long = "sort", value_enum, default_value = "inclusive")]
        sort: SortKey,

        /// Only show blocks whose label or function matches this regex
        #[arg(long = "filter", value_name = "REGEX")]
        filter: Option<String>,

        /// Show at most N blocks
        #[arg(long = "top", value_name = "N")]
        top: Option<usize>,
    },

    /// Estimate the CPU cycle counter frequency
    Calibrate {
        /// Calibration interval in milliseconds
        #[arg(long = "interval-ms", default_value = "100")]
        interval_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_demo() {
        let cli = Cli::parse_from(["cycleprof", "demo", "recursion", "--depth", "20"]);
        match cli.command {
            Command::Demo { kind, depth, output, .. } => {
                assert_eq!(kind, DemoKind::Recursion);
                assert_eq!(depth, 20);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_demo_output_and_format() {
        let cli = Cli::parse_from([
            "cycleprof", "demo", "nested", "-o", "out.csv", "--format", "json",
        ]);
        match cli.command {
            Command::Demo { output, format, .. } => {
                assert_eq!(output, Some(PathBuf::from("out.csv")));
                assert_eq!(format, Some(ReportFormat::Json));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_show_defaults() {
        let cli = Cli::parse_from(["cycleprof", "show", "report.json"]);
        match cli.command {
            Command::Show { report, format, sort, filter, top } => {
                assert_eq!(report, PathBuf::from("report.json"));
                assert_eq!(format, ReportFormat::Text);
                assert_eq!(sort, SortKey::Inclusive);
                assert!(filter.is_none());
                assert!(top.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_debug_is_global() {
        let cli = Cli::parse_from(["cycleprof", "calibrate", "--debug", "--interval-ms", "5"]);
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Calibrate { interval_ms: 5 }));
    }

    #[test]
    fn test_cli_rejects_unknown_demo() {
        assert!(Cli::try_parse_from(["cycleprof", "demo", "sorting"]).is_err());
    }
}
