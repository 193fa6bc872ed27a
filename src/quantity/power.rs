use std::ops::Mul;

use chrono::TimeDelta;

use crate::quantity::energy::KilowattHours;

quantity!(Kilowatts, "kW");

impl Mul<TimeDelta> for Kilowatts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        KilowattHours(self.0 * rhs.as_seconds_f64() / 3600.0)
    }
}
