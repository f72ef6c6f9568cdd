//! ArticleForge CLI: research-backed article generation.
//!
//! Turns a topic and a list of section headings into a finished article:
//! sources are searched and extracted once, facts are routed to headings,
//! and every section is drafted, fact-checked, and polished.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
