pub mod formatter;

pub use formatter::{create_formatter, JsonFormatter, OutputFormatter, TextFormatter};

use anyhow::Result;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::metrics::Snapshot;

const SIZE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Human readable byte count using SI units, e.g. `17 GB` or `1.5 kB`
pub fn format_bytes(bytes: i64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }

    let size = bytes as f64;
    let exponent = (size.ln() / 1000f64.ln()).floor().min((SIZE_UNITS.len() - 1) as f64);
    let value = (size / 1000f64.powf(exponent) * 10.0 + 0.5).floor() / 10.0;
    let unit = SIZE_UNITS[exponent as usize];

    if value < 10.0 {
        format!("{value:.1} {unit}")
    } else {
        format!("{value:.0} {unit}")
    }
}

/// Write every received snapshot as one line until the channel closes.
///
/// Returns the number of lines written.
pub async fn write_snapshots<W: Write>(
    mut snapshots: mpsc::Receiver<Snapshot>,
    formatter: &dyn OutputFormatter,
    mut writer: W,
) -> Result<u64> {
    let mut written = 0;

    while let Some(snapshot) = snapshots.recv().await {
        let line = formatter.format(&snapshot)?;
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                // Typically `clustertop --no-ui | head`
                info!("Output pipe closed, stopping");
                break;
            }
            error!("Failed to write snapshot: {:?}", e);
            return Err(e.into());
        }
        written += 1;
    }

    Ok(written)
}
