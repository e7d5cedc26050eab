use anyhow::Result;
use clustertop::{cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first to determine if we're using UI mode
    let args = cli::parse_args();
    let ui = args.wants_ui();

    // Flushes the dev log file on exit
    let _log_guard = logging::init_logging(args.verbosity, ui, args.dev)?;

    cli::run(args, ui).await
}
