use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Live CPU and memory usage of a Kubernetes cluster, read from Prometheus",
    long_about = "clustertop polls a Prometheus server for cluster-wide CPU and memory usage and renders\n\
current values, peaks over the query range and usage history in the terminal.\n\
When --address is omitted, the Prometheus service is looked up in the cluster.\n\
---\n\
Durations accept a number followed by a unit: 500ms, 15s, 5m, 1h, 1d.\n\
---\n\
Examples:\n\
  clustertop --address localhost:9090                      # Interactive view\n\
  clustertop -a http://prom:9090/prometheus -i 5s -r 6h    # Custom interval and range\n\
  clustertop --no-ui -o json | jq .max_cpu_percent         # One JSON object per tick\n\
  clustertop --once                                        # Single snapshot, non-zero exit on failure\n\
  clustertop getconfig poll                                # Show the poll settings"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Prometheus address (host:port or URL, optionally with a path prefix)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Time between polls (e.g., 2s)
    #[arg(short, long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// How far back the usage history and peaks reach (e.g., 1h)
    #[arg(short, long, value_parser = parse_duration)]
    pub range: Option<Duration>,

    /// Resolution of the usage history (e.g., 15s)
    #[arg(short, long, value_parser = parse_duration)]
    pub step: Option<Duration>,

    /// Timeout for each Prometheus request (e.g., 5s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Path to an alternative configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file, used for Prometheus discovery
    #[arg(short, long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes context to use
    #[arg(short = 'x', long)]
    pub context: Option<String>,

    /// Disable the interactive view and print one line per snapshot
    #[arg(long)]
    pub no_ui: bool,

    /// Output format for headless mode (text, json)
    #[arg(short, long, default_value = "text")]
    pub output: String,

    /// Take a single snapshot, print it and exit
    #[arg(long)]
    pub once: bool,

    /// Enable development mode - writes internal logs to a file even in UI mode
    #[arg(long)]
    pub dev: bool,

    /// Verbosity level for debug output
    #[arg(short, long, default_value = "0")]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Display the effective configuration file settings
    #[command(name = "getconfig")]
    GetConfig {
        /// Optional section to display (backend, poll, discovery)
        key: Option<String>,
    },
}

pub fn parse_args() -> Args {
    Args::parse()
}

impl Args {
    /// Interactive view unless disabled, a one-shot run, or stdout is not a terminal
    pub fn wants_ui(&self) -> bool {
        !self.no_ui && !self.once && self.command.is_none() && atty::is(atty::Stream::Stdout)
    }
}

/// Parse a duration such as `500ms`, `15s`, `5m`, `1h` or `2d`
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let re = Regex::new(r"^(\d+)(ms|s|m|h|d)$").map_err(|e| e.to_string())?;

    let caps = re
        .captures(value.trim())
        .ok_or_else(|| format!("Invalid duration format: {value} (expected e.g. 15s, 5m, 1h)"))?;
    let amount = caps[1]
        .parse::<u64>()
        .map_err(|e| format!("Invalid duration amount in {value}: {e}"))?;

    let duration = match &caps[2] {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => amount.checked_mul(60).map(Duration::from_secs),
        "h" => amount.checked_mul(3600).map(Duration::from_secs),
        "d" => amount.checked_mul(86400).map(Duration::from_secs),
        unit => return Err(format!("Unknown duration unit: {unit}")),
    }
    .ok_or_else(|| format!("Duration too large: {value}"))?;

    if duration.is_zero() {
        return Err(format!("Duration must be greater than zero: {value}"));
    }
    Ok(duration)
}

impl Default for Args {
    fn default() -> Self {
        Self {
            command: None,
            address: None,
            interval: None,
            range: None,
            step: None,
            timeout: None,
            config: None,
            kubeconfig: None,
            context: None,
            no_ui: false,
            output: "text".to_string(),
            once: false,
            dev: false,
            verbosity: 0,
        }
    }
}
