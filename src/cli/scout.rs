use chrono::Local;

use crate::{
    cli::ScoutArgs,
    config::Config,
    core::{coordinator::Coordinator, mode::OperationMode},
    prelude::*,
    tables,
};

/// One read-only cycle: sample the sensors, project, print, exit.
pub async fn scout(args: &ScoutArgs) -> Result {
    let api = args.home_assistant.try_new_client()?;
    let config = Config::read_from(&args.config.path)?;
    let mut sensors = config.sensors();

    // Never steer from a scout run, whatever the mode entity says.
    sensors.mode_entity_id = None;

    let mut coordinator = Coordinator::builder()
        .sensors(sensors)
        .loads(config.loads())
        .mode(OperationMode::Monitor)
        .ceiling(config.max_hour_kwh)
        .restore_margin(config.restore_margin_kwh)
        .build();
    let report = coordinator.tick(&api, Local::now()).await;

    println!("{}", tables::build_report_table(&report));
    println!("{}", tables::build_loads_table(coordinator.loads()));
    Ok(())
}
