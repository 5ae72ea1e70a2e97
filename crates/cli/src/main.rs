//! celi command-line entry point.

use std::io::Write;

use anyhow::Result;
use clap::Parser;

mod args;
mod commands;

use args::Cli;
use commands::Output;

#[tokio::main]
async fn main() -> Result<()> {
    celi_server::init_tracing();

    let cli = Cli::parse();
    let config = commands::apply_overrides(celi_core::AppConfig::load()?, &cli);

    match commands::dispatch(cli, config).await? {
        Output::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Output::Raw(bytes) => std::io::stdout().write_all(&bytes)?,
        Output::None => {}
    }

    Ok(())
}
