mod heartbeat;
mod scout;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Url;

pub use self::{heartbeat::HeartbeatArgs, scout::scout, watch::watch};
use crate::{api::home_assistant, prelude::*};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: watch the meter and steer the loads.
    Watch(Box<WatchArgs>),

    /// Run a single read-only cycle and print the projection.
    Scout(Box<ScoutArgs>),
}

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    pub home_assistant: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    pub config: ConfigArgs,

    #[clap(long = "tick-interval", env = "TICK_INTERVAL", default_value = "30s")]
    pub tick_interval: humantime::Duration,

    #[clap(flatten)]
    pub heartbeat: HeartbeatArgs,
}

#[derive(Parser)]
pub struct ScoutArgs {
    #[clap(flatten)]
    pub home_assistant: HomeAssistantConnectionArgs,

    #[clap(flatten)]
    pub config: ConfigArgs,
}

#[derive(Parser)]
pub struct ConfigArgs {
    /// Path to the settings file.
    #[clap(long = "config", env = "RAZOR_CONFIG", default_value = "razor.toml")]
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct HomeAssistantConnectionArgs {
    /// Home Assistant API access token.
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: String,

    /// Home Assistant API base URL. For example: `http://localhost:8123/api`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Url,
}

impl HomeAssistantConnectionArgs {
    pub fn try_new_client(&self) -> Result<home_assistant::Api> {
        home_assistant::Api::try_new(&self.access_token, self.base_url.clone())
    }
}
