//! dmc: send one delimited text message and print the reply.
//!
//! Opens a channel to the configured peer, writes the message (followed by
//! the delimiter unless disabled), blocks for one delimited reply, prints it
//! to stdout and closes the channel.

mod config;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dmc_client::Channel;

use crate::config::Config;

fn main() -> Result<()> {
    let config = Config::load()?;

    // Logs go to stderr so stdout carries only the reply.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        addr = %config.channel.addr(),
        encoding = %config.channel.encoding,
        buffer_size = config.buffer_size,
        delimiter = ?config.delimiter,
        "Starting dmc"
    );

    let reply = exchange(&config)?;
    println!("{reply}");
    Ok(())
}

fn exchange(config: &Config) -> Result<String> {
    let mut channel = Channel::with_config(config.channel.clone());
    channel
        .open()
        .with_context(|| format!("failed to connect to {}", config.channel.addr()))?;

    channel
        .write_message(&config.outgoing(), None)
        .context("failed to send message")?;
    let reply = channel
        .read_message(config.buffer_size, &config.delimiter)
        .context("failed to read reply")?;

    channel.close().context("failed to close channel")?;
    Ok(reply)
}
