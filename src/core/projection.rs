use chrono::{DateTime, Local, TimeDelta, Timelike};

use crate::quantity::{energy::KilowattHours, power::Kilowatts};

/// Linear extrapolation of the current hour's consumption.
#[derive(Copy, Clone, Debug)]
pub struct Projection {
    /// Expected meter reading at the top of the next hour.
    pub projected_end: KilowattHours,

    /// Power to shed right now to land exactly on the ceiling.
    /// Positive means over budget, negative means headroom.
    pub needed_reduction: Kilowatts,
}

impl Projection {
    /// Extrapolate the end-of-hour energy from the instantaneous power draw.
    ///
    /// `house_power` is passed through as-is: a producing house (negative power)
    /// legitimately lowers the projection. `remaining` must be in `(0, 1h]`.
    #[must_use]
    pub fn project(
        energy_this_hour: KilowattHours,
        house_power: Kilowatts,
        remaining: TimeDelta,
        ceiling: KilowattHours,
    ) -> Self {
        debug_assert!(remaining > TimeDelta::zero());
        let projected_end = energy_this_hour + house_power * remaining;
        Self { projected_end, needed_reduction: (projected_end - ceiling) / remaining }
    }
}

/// Time left until the top of the next hour, always in `(0, 1h]`.
#[must_use]
pub fn remaining_in_hour(now: DateTime<Local>) -> TimeDelta {
    let elapsed = i64::from(now.minute() * 60 + now.second());
    let remaining = 3600 - elapsed;
    TimeDelta::seconds(if remaining == 0 { 3600 } else { remaining })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn on_track_projection_needs_nothing() {
        let projection = Projection::project(
            KilowattHours(3.0),
            Kilowatts(8.0),
            TimeDelta::seconds(900),
            KilowattHours(5.0),
        );
        assert_eq!(projection.projected_end, KilowattHours(5.0));
        assert_eq!(projection.needed_reduction, Kilowatts(0.0));
    }

    #[test]
    fn overshooting_projection_quantifies_the_excess() {
        let projection = Projection::project(
            KilowattHours(3.0),
            Kilowatts(10.0),
            TimeDelta::seconds(900),
            KilowattHours(5.0),
        );
        assert_eq!(projection.projected_end, KilowattHours(5.5));
        assert_eq!(projection.needed_reduction, Kilowatts(2.0));
    }

    /// The two outputs must agree on which side of the ceiling we are.
    #[test]
    fn reduction_sign_matches_projection_side() {
        for (energy, power) in
            [(0.0, 1.0), (2.5, 4.2), (4.9, 12.0), (3.0, -2.0), (5.1, 0.0), (0.0, 0.0)]
        {
            let projection = Projection::project(
                KilowattHours(energy),
                Kilowatts(power),
                TimeDelta::seconds(1234),
                KilowattHours(5.0),
            );
            assert_eq!(
                projection.needed_reduction > Kilowatts::ZERO,
                projection.projected_end > KilowattHours(5.0),
            );
        }
    }

    #[test]
    fn production_lowers_the_projection() {
        let projection = Projection::project(
            KilowattHours(4.0),
            Kilowatts(-4.0),
            TimeDelta::seconds(1800),
            KilowattHours(5.0),
        );
        assert_eq!(projection.projected_end, KilowattHours(2.0));
        assert!(projection.needed_reduction < Kilowatts::ZERO);
    }

    #[test]
    fn awkward_remainders_stay_close() {
        let projection = Projection::project(
            KilowattHours(0.2),
            Kilowatts(10.0),
            TimeDelta::seconds(3570),
            KilowattHours(5.0),
        );
        approx::assert_relative_eq!(projection.projected_end.0, 10.116_666_7, epsilon = 1e-6);
        approx::assert_relative_eq!(projection.needed_reduction.0, 5.159_663_9, epsilon = 1e-6);
    }

    #[test]
    fn remaining_never_hits_zero() {
        let top_of_hour = Local.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        assert_eq!(remaining_in_hour(top_of_hour), TimeDelta::seconds(3600));
        let late = Local.with_ymd_and_hms(2025, 11, 3, 9, 59, 59).unwrap();
        assert_eq!(remaining_in_hour(late), TimeDelta::seconds(1));
        let quarter_to = Local.with_ymd_and_hms(2025, 11, 3, 8, 45, 0).unwrap();
        assert_eq!(remaining_in_hour(quarter_to), TimeDelta::seconds(900));
    }
}
