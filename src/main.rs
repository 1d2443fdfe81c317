use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    // Stdout carries the UCI protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    info!("sable starting");

    sable_uci::UciEngine::new().run()?;
    Ok(())
}
