use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use chrono::Local;
use tokio::time::{MissedTickBehavior, interval};

use crate::{cli::WatchArgs, config::Config, core::coordinator::Coordinator, prelude::*};

/// The main loop: one control cycle per tick, until a signal says stop.
pub async fn watch(args: &WatchArgs) -> Result {
    let api = args.home_assistant.try_new_client()?;
    let config = Config::read_from(&args.config.path)?;
    let mut config_modified_at = modified_at(&args.config.path);
    let mut coordinator = Coordinator::builder()
        .sensors(config.sensors())
        .loads(config.loads())
        .mode(config.mode)
        .ceiling(config.max_hour_kwh)
        .restore_margin(config.restore_margin_kwh)
        .build();

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&should_terminate))?;

    let mut interval = interval(args.tick_interval.into());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !should_terminate.load(Ordering::Relaxed) {
        interval.tick().await;

        // Pick up settings edits without restarting. Connection details
        // still need a restart.
        let modified_now = modified_at(&args.config.path);
        if modified_now != config_modified_at {
            config_modified_at = modified_now;
            match Config::read_from(&args.config.path) {
                Ok(config) => {
                    info!("reloading the settings…");
                    coordinator.set_ceiling(config.max_hour_kwh);
                    coordinator.set_restore_margin(config.restore_margin_kwh);
                    coordinator.reconcile(config.loads());
                }
                Err(error) => {
                    warn!("keeping the old settings, the new ones are broken: {error:#}");
                }
            }
        }

        let report = coordinator.tick(&api, Local::now()).await;
        debug!(
            action = %report.last_action,
            reason = %report.last_action_reason,
            "tick done",
        );
        args.heartbeat.send().await;
    }

    info!("terminating…");
    Ok(())
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}
