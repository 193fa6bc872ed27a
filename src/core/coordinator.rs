use std::cmp::Reverse;

use bon::Builder;
use chrono::{DateTime, Local, TimeDelta, Timelike};
use itertools::Itertools;

use crate::{
    core::{
        gateway::Entities,
        load::Load,
        mode::OperationMode,
        projection::{Projection, remaining_in_hour},
        report::TickReport,
    },
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Entity ids the coordinator samples every tick.
#[derive(Debug, Clone)]
pub struct Sensors {
    /// Energy consumed since the top of the hour (resets externally).
    pub hour_energy_entity_id: String,

    /// Instantaneous net house power. Optional: without it the projection
    /// conservatively assumes the hour ends at the current meter reading.
    pub house_power_entity_id: Option<String>,

    /// Select entity steering the operation mode at runtime.
    pub mode_entity_id: Option<String>,

    /// Number entity steering the hourly ceiling at runtime.
    pub ceiling_entity_id: Option<String>,
}

/// The control loop. Owns all loads and the hour bookkeeping; everything
/// external goes through the [`Entities`] gateway or the published [`TickReport`].
#[derive(Builder)]
pub struct Coordinator {
    sensors: Sensors,
    loads: Vec<Load>,
    mode: OperationMode,
    ceiling: KilowattHours,

    /// Headroom required below the ceiling before a load is given back.
    #[builder(default = KilowattHours(0.1))]
    restore_margin: KilowattHours,

    /// Wall-clock hour of the previous tick, for rollover detection.
    hour: Option<u32>,

    #[builder(default = String::from("initialized"))]
    last_action: String,

    #[builder(default)]
    last_action_reason: String,

    report: Option<TickReport>,
}

impl Coordinator {
    #[must_use]
    pub const fn mode(&self) -> OperationMode {
        self.mode
    }

    #[must_use]
    pub const fn report(&self) -> Option<&TickReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub const fn set_ceiling(&mut self, ceiling: KilowattHours) {
        self.ceiling = ceiling;
    }

    pub const fn set_restore_margin(&mut self, restore_margin: KilowattHours) {
        self.restore_margin = restore_margin;
    }

    /// Swap in a fresh load roster, carrying over the cooldown history and the
    /// pre-control snapshot for loads that persist under the same name with an
    /// unchanged kind. A reused name with a changed kind starts from scratch.
    pub fn reconcile(&mut self, mut roster: Vec<Load>) {
        for load in &mut roster {
            if let Some(known) = self.loads.iter().find(|known| known.name == load.name) {
                if known.kind == load.kind {
                    load.cooldown.inherit(&known.cooldown);
                    load.original = known.original;
                } else {
                    info!(load = %load.name, "load kind changed, resetting its bookkeeping");
                }
            }
        }
        self.loads = roster;
    }

    /// Change the operation mode, running the transition side effects.
    ///
    /// Entering `Off` hands every touched load back to its pre-control
    /// setpoint, ignoring cooldowns. Leaving `Control` any other way drops the
    /// bookkeeping without touching the loads.
    pub async fn apply_mode<E: Entities + ?Sized>(&mut self, entities: &E, mode: OperationMode) {
        if mode == self.mode {
            return;
        }
        info!(from = %self.mode, to = %mode, "switching mode");
        if mode == OperationMode::Off {
            self.hand_back(entities).await;
        } else if self.mode == OperationMode::Control {
            for load in &mut self.loads {
                load.original = None;
                load.cooldown.reset();
            }
        }
        self.mode = mode;
    }

    /// Run one control cycle. Never fails: every error is contained within the
    /// tick and surfaced through the report and the logs.
    #[instrument(skip_all, fields(%now, mode = %self.mode))]
    pub async fn tick<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        now: DateTime<Local>,
    ) -> TickReport {
        self.sample_mode(entities).await;
        self.sample_ceiling(entities).await;

        // Projections restart on rollover; cooldowns and snapshots survive.
        if self.hour.is_some_and(|hour| hour != now.hour()) {
            info!(hour = now.hour(), "hour rollover");
            self.last_action = "hour rollover".to_string();
            self.last_action_reason = "new accounting hour".to_string();
        }
        self.hour = Some(now.hour());

        let remaining = remaining_in_hour(now);
        if self.mode == OperationMode::Off {
            return self.publish(now, None, None, None, remaining);
        }

        let energy = self.read_energy(entities).await;
        let power = self.read_power(entities).await;
        let Some(energy) = energy else {
            self.last_action = "none".to_string();
            self.last_action_reason = "indeterminate readings".to_string();
            return self.publish(now, None, power, None, remaining);
        };

        let projection =
            Projection::project(energy, power.unwrap_or(Kilowatts::ZERO), remaining, self.ceiling);
        if self.mode == OperationMode::Control {
            self.steer(entities, now, projection).await;
        }
        self.publish(now, Some(energy), power, Some(projection), remaining)
    }

    async fn steer<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        now: DateTime<Local>,
        projection: Projection,
    ) {
        if projection.needed_reduction > Kilowatts::ZERO {
            self.shed(entities, now, projection.needed_reduction).await;
        } else if self.ceiling - projection.projected_end >= self.restore_margin {
            self.give_back(entities, now, self.ceiling - projection.projected_end).await;
        } else {
            self.last_action = "none".to_string();
            self.last_action_reason = "within margin".to_string();
        }
    }

    /// Reduce the first eligible load in ascending priority order.
    /// One change per tick: its effect must show up in the meter before
    /// the next decision.
    async fn shed<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        now: DateTime<Local>,
        needed: Kilowatts,
    ) {
        let order = {
            let mut order = (0..self.loads.len()).collect_vec();
            order.sort_by_key(|&index| self.loads[index].priority);
            order
        };
        for index in order {
            if !self.loads[index].cooldown.may_act(now)
                || !self.loads[index].is_selectable(entities).await
            {
                continue;
            }
            match self.loads[index].reduce(entities).await {
                Ok(actuation) if actuation.applied => {
                    self.loads[index].cooldown.record(now);
                    self.last_action = format!("reduced `{}`", self.loads[index].name);
                    self.last_action_reason =
                        format!("needed {needed}, shed an estimated {}", actuation.delta);
                    info!("{}", self.last_action_reason);
                    return;
                }
                Ok(_) => {}
                Err(error) => {
                    // No change was applied, so no cooldown either; try the next one.
                    warn!(load = %self.loads[index].name, "failed to reduce: {error:#}");
                }
            }
        }
        self.last_action = "none".to_string();
        self.last_action_reason = "no loads available to shed".to_string();
        warn!("{}", self.last_action_reason);
    }

    /// Restore the first eligible load in descending priority order.
    async fn give_back<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        now: DateTime<Local>,
        headroom: KilowattHours,
    ) {
        let order = {
            let mut order = (0..self.loads.len()).collect_vec();
            order.sort_by_key(|&index| Reverse(self.loads[index].priority));
            order
        };
        for index in order {
            if !self.loads[index].cooldown.may_act(now)
                || !self.loads[index].is_selectable(entities).await
            {
                continue;
            }
            match self.loads[index].restore(entities).await {
                Ok(actuation) if actuation.applied => {
                    self.loads[index].cooldown.record(now);
                    self.last_action = format!("restored `{}`", self.loads[index].name);
                    self.last_action_reason = format!("{headroom} of headroom");
                    info!("{}", self.last_action_reason);
                    return;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(load = %self.loads[index].name, "failed to restore: {error:#}");
                }
            }
        }
        self.last_action = "none".to_string();
        self.last_action_reason = "margin available, nothing to restore".to_string();
    }

    /// Return every touched load to its snapshot, ignoring cooldowns.
    /// A load that cannot be reached keeps its snapshot for a later attempt.
    async fn hand_back<E: Entities + ?Sized>(&mut self, entities: &E) {
        let mut restored = Vec::new();
        for load in &mut self.loads {
            match load.restore_original(entities).await {
                Ok(applied) => {
                    if applied {
                        restored.push(load.name.clone());
                    }
                    load.original = None;
                    load.cooldown.reset();
                }
                Err(error) => {
                    warn!(load = %load.name, "failed to hand the load back: {error:#}");
                }
            }
        }
        if !restored.is_empty() {
            self.last_action = "restored all loads".to_string();
            self.last_action_reason = format!("mode is off, restored: {}", restored.iter().join(", "));
            info!("{}", self.last_action_reason);
        }
    }

    async fn sample_mode<E: Entities + ?Sized>(&mut self, entities: &E) {
        let Some(entity_id) = self.sensors.mode_entity_id.clone() else {
            return;
        };
        match entities.select(&entity_id).await {
            Ok(Some(state)) => match state.parse() {
                Ok(mode) => self.apply_mode(entities, mode).await,
                Err(error) => warn!(%state, "unusable mode entity state: {error:#}"),
            },
            Ok(None) => {}
            Err(error) => warn!(%entity_id, "failed to read the mode entity: {error:#}"),
        }
    }

    async fn sample_ceiling<E: Entities + ?Sized>(&mut self, entities: &E) {
        let Some(entity_id) = self.sensors.ceiling_entity_id.clone() else {
            return;
        };
        match entities.energy_kwh(&entity_id).await {
            Ok(Some(ceiling)) if ceiling > KilowattHours::ZERO => self.ceiling = ceiling,
            Ok(Some(ceiling)) => warn!(%entity_id, %ceiling, "ignoring a non-positive ceiling"),
            Ok(None) => {}
            Err(error) => warn!(%entity_id, "failed to read the ceiling entity: {error:#}"),
        }
    }

    async fn read_energy<E: Entities + ?Sized>(&self, entities: &E) -> Option<KilowattHours> {
        match entities.energy_kwh(&self.sensors.hour_energy_entity_id).await {
            Ok(energy) => energy,
            Err(error) => {
                warn!("failed to read the hour energy sensor: {error:#}");
                None
            }
        }
    }

    async fn read_power<E: Entities + ?Sized>(&self, entities: &E) -> Option<Kilowatts> {
        let entity_id = self.sensors.house_power_entity_id.as_ref()?;
        match entities.power_kw(entity_id).await {
            Ok(power) => power,
            Err(error) => {
                warn!("failed to read the house power sensor: {error:#}");
                None
            }
        }
    }

    fn publish(
        &mut self,
        now: DateTime<Local>,
        energy: Option<KilowattHours>,
        power: Option<Kilowatts>,
        projection: Option<Projection>,
        remaining: TimeDelta,
    ) -> TickReport {
        let report = TickReport {
            at: now,
            mode: self.mode,
            ceiling: self.ceiling,
            energy_this_hour: energy,
            house_power: power,
            projected_end: projection.map(|projection| projection.projected_end),
            needed_reduction: projection.map(|projection| projection.needed_reduction),
            remaining_seconds: remaining.num_seconds(),
            last_action: self.last_action.clone(),
            last_action_reason: self.last_action_reason.clone(),
        };
        self.report = Some(report.clone());
        report
    }
}
