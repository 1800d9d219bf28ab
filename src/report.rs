//! Report generation for closed sessions
//!
//! A [`Report`] is a flat, owned snapshot of every block that completed at
//! least one region, with cycle counts converted to milliseconds using the
//! calibrated counter frequency. It renders as a fixed-width text table,
//! JSON, or CSV.

use std::fmt::Write as _;
use std::path::Path;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::block_id::BlockId;
use crate::error::{ProfilerError, Result};
use crate::profiler::Profiler;
use crate::timer::cycles_to_ms;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Fixed-width text table (default)
    Text,
    /// JSON for machine parsing and `cycleprof show`
    Json,
    /// CSV for spreadsheet analysis
    Csv,
}

impl ReportFormat {
    /// Pick a format from a file extension, defaulting to text
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => ReportFormat::Json,
            Some("csv") => ReportFormat::Csv,
            _ => ReportFormat::Text,
        }
    }
}

/// Ordering applied to report rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Inclusive cycles, descending
    Inclusive,
    /// Exclusive cycles, descending
    Exclusive,
    /// Hit count, descending
    Hits,
    /// Label, ascending
    Label,
    /// File then line, ascending
    Location,
}

/// One row of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockReport {
    pub id: BlockId,
    pub label: String,
    pub function: String,
    pub file: String,
    pub line: u32,
    pub hits: u64,
    pub inclusive_cycles: u64,
    pub exclusive_cycles: u64,
    pub inclusive_ms: f64,
    pub exclusive_ms: f64,
    pub inclusive_percent: f64,
    pub exclusive_percent: f64,
    #[serde(default)]
    pub processed_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_gb_per_s: Option<f64>,
}

impl BlockReport {
    /// `file:line` using only the file's base name
    pub fn location(&self) -> String {
        let name = Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file);
        format!("{}:{}", name, self.line)
    }
}

/// Snapshot of a closed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Seconds since the Unix epoch when the report was produced
    pub timestamp: u64,
    pub total_cycles: u64,
    /// Estimated cycles per second; 0 if calibration failed
    pub cpu_freq: u64,
    pub total_ms: f64,
    pub blocks: Vec<BlockReport>,
}

/// `ctime`-style UTC rendering of a unix timestamp
fn format_timestamp(secs: u64) -> String {
    let datetime = i64::try_from(secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_default();
    datetime.format("%a %b %e %H:%M:%S %Y UTC").to_string()
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

impl Report {
    /// Build a report from a profiler's table, sorted by inclusive cycles
    pub fn from_profiler(profiler: &Profiler, cpu_freq: u64, timestamp: u64) -> Self {
        let total_cycles = profiler.total_cycles();

        let blocks = profiler
            .table()
            .iter_recorded()
            .map(|stats| {
                let bandwidth_gb_per_s = if stats.processed_bytes > 0 && cpu_freq > 0 {
                    let seconds = stats.inclusive_cycles as f64 / cpu_freq as f64;
                    (seconds > 0.0).then(|| stats.processed_bytes as f64 / 1e9 / seconds)
                } else {
                    None
                };

                BlockReport {
                    id: stats.id,
                    label: stats.label.to_string(),
                    function: stats.function.to_string(),
                    file: stats.file.to_string(),
                    line: stats.line,
                    hits: stats.hit_count,
                    inclusive_cycles: stats.inclusive_cycles,
                    exclusive_cycles: stats.exclusive_cycles,
                    inclusive_ms: cycles_to_ms(stats.inclusive_cycles, cpu_freq),
                    exclusive_ms: cycles_to_ms(stats.exclusive_cycles, cpu_freq),
                    inclusive_percent: percent(stats.inclusive_cycles, total_cycles),
                    exclusive_percent: percent(stats.exclusive_cycles, total_cycles),
                    processed_bytes: stats.processed_bytes,
                    bandwidth_gb_per_s,
                }
            })
            .collect();

        let mut report = Report {
            timestamp,
            total_cycles,
            cpu_freq,
            total_ms: cycles_to_ms(total_cycles, cpu_freq),
            blocks,
        };
        report.sort_by(SortKey::Inclusive);
        report
    }

    /// Look up a block by label
    pub fn block(&self, label: &str) -> Option<&BlockReport> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn sort_by(&mut self, key: SortKey) {
        match key {
            SortKey::Inclusive => self
                .blocks
                .sort_by(|a, b| b.inclusive_cycles.cmp(&a.inclusive_cycles)),
            SortKey::Exclusive => self
                .blocks
                .sort_by(|a, b| b.exclusive_cycles.cmp(&a.exclusive_cycles)),
            SortKey::Hits => self.blocks.sort_by(|a, b| b.hits.cmp(&a.hits)),
            SortKey::Label => self.blocks.sort_by(|a, b| a.label.cmp(&b.label)),
            SortKey::Location => self
                .blocks
                .sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line))),
        }
    }

    /// Keep only blocks whose label or function matches `pattern`
    pub fn retain_matching(&mut self, pattern: &Regex) {
        self.blocks
            .retain(|b| pattern.is_match(&b.label) || pattern.is_match(&b.function));
    }

    pub fn truncate(&mut self, n: usize) {
        self.blocks.truncate(n);
    }

    /// Render the fixed-width text table
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let show_bandwidth = self.blocks.iter().any(|b| b.processed_bytes > 0);

        // Writing into a String cannot fail
        let _ = writeln!(out, "=== PROFILER RESULTS ===");
        let _ = writeln!(out, "Timestamp: {}", format_timestamp(self.timestamp));
        if self.cpu_freq > 0 {
            let _ = writeln!(
                out,
                "Total time: {:.4}ms (CPU freq ~{} Hz)",
                self.total_ms, self.cpu_freq
            );
        } else {
            let _ = writeln!(out, "Total time: {} cycles", self.total_cycles);
        }
        out.push('\n');

        let _ = write!(
            out,
            "{:<32} {:<8} {:<15} {:<10} {:<10} {:<10} {:<10} ",
            "Block", "Hits", "Cycles", "ms (Total)", "ms (Exc)", "% Total", "% Excl."
        );
        if show_bandwidth {
            let _ = write!(out, "{:<24} ", "Bandwidth");
        }
        let _ = writeln!(out, "Location");
        let width = if show_bandwidth { 136 } else { 111 };
        let _ = writeln!(out, "{}", "-".repeat(width));

        for block in &self.blocks {
            let _ = write!(
                out,
                "{:<32} {:<8} {:<15} {:<10.2} {:<10.2} {:<10.2} {:<10.2} ",
                block.label,
                block.hits,
                block.inclusive_cycles,
                block.inclusive_ms,
                block.exclusive_ms,
                block.inclusive_percent,
                block.exclusive_percent,
            );
            if show_bandwidth {
                let bandwidth = match block.bandwidth_gb_per_s {
                    Some(gbps) => format!(
                        "{:.3}MB at {:.2}GB/s",
                        block.processed_bytes as f64 / (1024.0 * 1024.0),
                        gbps
                    ),
                    None if block.processed_bytes > 0 => format!(
                        "{:.3}MB",
                        block.processed_bytes as f64 / (1024.0 * 1024.0)
                    ),
                    None => String::new(),
                };
                let _ = write!(out, "{:<24} ", bandwidth);
            }
            let _ = writeln!(out, "{}", block.location());
        }

        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "label,function,hits,inclusive_cycles,exclusive_cycles,inclusive_ms,exclusive_ms,inclusive_percent,exclusive_percent,processed_bytes,location\n",
        );
        for b in &self.blocks {
            let _ = writeln!(
                out,
                "{},{},{},{},{},{:.4},{:.4},{:.2},{:.2},{},{}",
                Self::escape_field(&b.label),
                Self::escape_field(&b.function),
                b.hits,
                b.inclusive_cycles,
                b.exclusive_cycles,
                b.inclusive_ms,
                b.exclusive_ms,
                b.inclusive_percent,
                b.exclusive_percent,
                b.processed_bytes,
                Self::escape_field(&b.location()),
            );
        }
        out
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Csv => Ok(self.to_csv()),
        }
    }

    /// Write the rendered report to `path`
    pub fn write_to(&self, path: &Path, format: ReportFormat) -> Result<()> {
        let rendered = self.render(format)?;
        std::fs::write(path, rendered).map_err(|source| ProfilerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
