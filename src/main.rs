#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod config;
mod core;
mod prelude;
mod quantity;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Watch(args) => cli::watch(&args).await?,
        Command::Scout(args) => cli::scout(&args).await?,
    }

    info!("done!");
    Ok(())
}
