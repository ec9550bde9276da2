//! otlp-batch CLI entry point.

use otlp_batch::cli::{self, Cli};
use otlp_batch::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
