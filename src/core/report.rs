use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    core::mode::OperationMode,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Read-only snapshot of one tick, published for display and logging.
/// There is deliberately no way back into the coordinator through this.
#[derive(Clone, Debug, Serialize)]
pub struct TickReport {
    pub at: DateTime<Local>,
    pub mode: OperationMode,
    pub ceiling: KilowattHours,

    /// Energy consumed since the top of the hour, if the sensor was readable.
    pub energy_this_hour: Option<KilowattHours>,

    /// Instantaneous house power, if the sensor is configured and readable.
    pub house_power: Option<Kilowatts>,

    pub projected_end: Option<KilowattHours>,
    pub needed_reduction: Option<Kilowatts>,
    pub remaining_seconds: i64,

    pub last_action: String,
    pub last_action_reason: String,
}
