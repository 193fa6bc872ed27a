use std::ops::Div;

use chrono::TimeDelta;

use crate::quantity::power::Kilowatts;

quantity!(KilowattHours, "kWh");

impl Div<TimeDelta> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        assert!(hours.is_finite());
        Kilowatts(self.0 / hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_over_time_is_power() {
        assert_eq!(KilowattHours(0.5) / TimeDelta::seconds(900), Kilowatts(2.0));
    }
}
