use anyhow::Result;
use colored::Colorize;

use crate::metrics::Snapshot;

/// Trait for formatting snapshots in headless mode
pub trait OutputFormatter: Send + Sync {
    /// Format a snapshot according to the formatter's rules
    fn format(&self, snapshot: &Snapshot) -> Result<String>;

    /// Get the name of the formatter
    fn format_name(&self) -> &'static str;
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    color: bool,
}

impl TextFormatter {
    /// Creates a new text formatter
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn percent(&self, value: i64) -> String {
        let text = format!("{value:>3}%");
        if !self.color {
            return text;
        }
        if value <= 25 {
            text.green().to_string()
        } else if value > 75 {
            text.red().to_string()
        } else {
            text.yellow().to_string()
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, snapshot: &Snapshot) -> Result<String> {
        let cpu_points = snapshot.cpu_rate.len();
        let ram_points = snapshot.memory_rate.len();

        Ok(format!(
            "{} cores={} memory={} | cpu now={} peak={} ({} pts) | ram now={} peak={} ({} pts)",
            snapshot.observed_at.format("%Y-%m-%d %H:%M:%S"),
            snapshot.total_cpu,
            super::format_bytes(snapshot.total_memory_bytes),
            self.percent(snapshot.current_cpu_percent),
            self.percent(snapshot.max_cpu_percent),
            cpu_points,
            self.percent(snapshot.current_memory_percent),
            self.percent(snapshot.max_memory_percent),
            ram_points,
        ))
    }

    fn format_name(&self) -> &'static str {
        "text"
    }
}

/// Formats snapshots as one JSON object per line
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(&self, snapshot: &Snapshot) -> Result<String> {
        Ok(serde_json::to_string(snapshot)?)
    }

    fn format_name(&self) -> &'static str {
        "json"
    }
}

/// Creates a formatter by name, falling back to text
pub fn create_formatter(format: &str, color: bool) -> Box<dyn OutputFormatter> {
    match format {
        "json" => Box::new(JsonFormatter),
        _ => Box::new(TextFormatter::new(color)),
    }
}
