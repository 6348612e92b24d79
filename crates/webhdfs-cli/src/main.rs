mod app;
mod commands;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use webhdfs::WebHdfsClient;

use crate::app::App;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let app = App::parse();
    init_logging(app.verbose);

    let config = app.conn.client_config()?;
    let client = WebHdfsClient::new(config).context("failed to build WebHDFS client")?;
    commands::run(&client, app.cmd).await
}

/// `RUST_LOG` wins; otherwise `-v` flags pick the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
