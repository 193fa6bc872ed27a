use serde::Serialize;

use crate::{
    core::{cooldown::Cooldown, gateway::Entities},
    prelude::*,
    quantity::{current::Amperes, power::Kilowatts},
};

/// One controllable consumer.
#[derive(Debug, Clone)]
pub struct Load {
    pub name: String,

    /// Lower priority is shed earlier and restored last.
    pub priority: i32,

    /// Static switch from the configuration.
    pub enabled: bool,

    /// Optional boolean entity that must be `on` for this load to be steered.
    pub enabled_entity_id: Option<String>,

    /// Optional power sensor for this load, used for reporting estimates only.
    pub power_entity_id: Option<String>,

    /// Fallback draw estimate when no power sensor is configured.
    pub assumed_power: Option<Kilowatts>,

    pub cooldown: Cooldown,
    pub kind: Kind,

    /// Snapshot taken the first time this load is touched in a control session.
    pub original: Option<OriginalState>,
}

/// Variant-specific configuration and steering logic.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Ampere(AmpereControl),
    Switch(Switch),
}

/// A variable-amperage charger steered through a number entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AmpereControl {
    pub entity_id: String,
    pub min_amps: Amperes,
    pub max_amps: Amperes,
    pub step_amps: Amperes,
    pub phases: u8,
    pub voltage: u32,
}

impl AmpereControl {
    /// Estimated power per shed/restored step, for reporting only.
    fn step_power(&self) -> Kilowatts {
        Kilowatts(self.step_amps.0 * f64::from(self.phases) * f64::from(self.voltage) / 1000.0)
    }
}

/// An on/off consumer. An inverted switch draws power while *off*
/// (e.g. a normally-closed heating relay).
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub entity_id: String,
    pub inverted: bool,
}

impl Switch {
    /// The switch position in which the consumer draws power.
    const fn consuming_position(&self) -> bool {
        !self.inverted
    }
}

/// Pre-control setpoint, recovered when the coordinator hands the load back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalState {
    Amperage(Amperes),
    Switch { on: bool },
}

/// Outcome of a single steering attempt.
#[derive(Copy, Clone, Debug)]
pub struct Actuation {
    pub applied: bool,

    /// Estimated power delta, for reporting; the next tick's meter reading
    /// is what actually drives further decisions.
    pub delta: Kilowatts,
}

impl Actuation {
    const SKIPPED: Self = Self { applied: false, delta: Kilowatts::ZERO };
}

impl Load {
    /// Whether the load may be picked for shedding or restoring right now.
    /// The optional enabled-entity wins over the static flag; an unavailable
    /// entity disables the load.
    pub async fn is_selectable<E: Entities + ?Sized>(&self, entities: &E) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(entity_id) = &self.enabled_entity_id else {
            return true;
        };
        match entities.boolean(entity_id).await {
            Ok(state) => state.unwrap_or(false),
            Err(error) => {
                warn!(load = %self.name, "failed to read the enabled entity: {error:#}");
                false
            }
        }
    }

    /// Shed one step of this load's draw.
    ///
    /// Snapshots the pre-control setpoint on the first applied action, so the
    /// load can be handed back intact when steering ends.
    pub async fn reduce<E: Entities + ?Sized>(&mut self, entities: &E) -> Result<Actuation> {
        match &self.kind {
            Kind::Ampere(ampere) => {
                let ampere = ampere.clone();
                self.reduce_amperage(entities, &ampere).await
            }
            Kind::Switch(switch) => {
                let switch = switch.clone();
                self.reduce_switch(entities, &switch).await
            }
        }
    }

    /// Give one step of draw back, never beyond the pre-control setpoint.
    pub async fn restore<E: Entities + ?Sized>(&mut self, entities: &E) -> Result<Actuation> {
        match &self.kind {
            Kind::Ampere(ampere) => {
                let ampere = ampere.clone();
                self.restore_amperage(entities, &ampere).await
            }
            Kind::Switch(switch) => {
                let switch = switch.clone();
                self.restore_switch(entities, &switch).await
            }
        }
    }

    /// Put the load back to its snapshot in one move, ignoring the cooldown.
    /// Returns whether anything was written. The caller clears the snapshot.
    pub async fn restore_original<E: Entities + ?Sized>(&mut self, entities: &E) -> Result<bool> {
        match (&self.kind, self.original) {
            (Kind::Ampere(ampere), Some(OriginalState::Amperage(amps))) => {
                let target = amps.clamp(ampere.min_amps, ampere.max_amps);
                entities.set_amperage(&ampere.entity_id, target).await?;
                Ok(true)
            }
            (Kind::Switch(switch), Some(OriginalState::Switch { on })) => {
                entities.set_switch(&switch.entity_id, on).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn check_bounds(&self, ampere: &AmpereControl) -> Result {
        ensure!(
            ampere.step_amps > Amperes::ZERO,
            "load `{}` has a non-positive amperage step",
            self.name
        );
        ensure!(
            ampere.min_amps <= ampere.max_amps,
            "load `{}` has inverted amperage bounds",
            self.name
        );
        Ok(())
    }

    async fn reduce_amperage<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        ampere: &AmpereControl,
    ) -> Result<Actuation> {
        self.check_bounds(ampere)?;
        let Some(current) = entities.amperage(&ampere.entity_id).await? else {
            debug!(load = %self.name, "amperage entity is unavailable");
            return Ok(Actuation::SKIPPED);
        };
        if current <= ampere.min_amps {
            return Ok(Actuation::SKIPPED);
        }
        let target = (current - ampere.step_amps).clamp(ampere.min_amps, ampere.max_amps);
        entities.set_amperage(&ampere.entity_id, target).await?;
        self.original.get_or_insert(OriginalState::Amperage(current));
        info!(load = %self.name, %current, %target, "shed one amperage step");
        Ok(Actuation { applied: true, delta: ampere.step_power() })
    }

    async fn restore_amperage<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        ampere: &AmpereControl,
    ) -> Result<Actuation> {
        self.check_bounds(ampere)?;
        let Some(current) = entities.amperage(&ampere.entity_id).await? else {
            debug!(load = %self.name, "amperage entity is unavailable");
            return Ok(Actuation::SKIPPED);
        };
        let ceiling = match self.original {
            Some(OriginalState::Amperage(amps)) => amps.min(ampere.max_amps),
            _ => ampere.max_amps,
        };
        if current >= ceiling {
            return Ok(Actuation::SKIPPED);
        }
        let target = (current + ampere.step_amps).clamp(ampere.min_amps, ceiling);
        entities.set_amperage(&ampere.entity_id, target).await?;
        info!(load = %self.name, %current, %target, "restored one amperage step");
        Ok(Actuation { applied: true, delta: ampere.step_power() })
    }

    async fn reduce_switch<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        switch: &Switch,
    ) -> Result<Actuation> {
        let Some(position) = entities.boolean(&switch.entity_id).await? else {
            debug!(load = %self.name, "switch entity is unavailable");
            return Ok(Actuation::SKIPPED);
        };
        if position != switch.consuming_position() {
            return Ok(Actuation::SKIPPED);
        }
        entities.set_switch(&switch.entity_id, !switch.consuming_position()).await?;
        self.original.get_or_insert(OriginalState::Switch { on: position });
        let delta = self.draw_estimate(entities).await;
        info!(load = %self.name, %delta, "switched the load off");
        Ok(Actuation { applied: true, delta })
    }

    async fn restore_switch<E: Entities + ?Sized>(
        &mut self,
        entities: &E,
        switch: &Switch,
    ) -> Result<Actuation> {
        let Some(position) = entities.boolean(&switch.entity_id).await? else {
            debug!(load = %self.name, "switch entity is unavailable");
            return Ok(Actuation::SKIPPED);
        };
        if position == switch.consuming_position() {
            return Ok(Actuation::SKIPPED);
        }
        entities.set_switch(&switch.entity_id, switch.consuming_position()).await?;
        let delta = self.draw_estimate(entities).await;
        info!(load = %self.name, %delta, "switched the load back on");
        Ok(Actuation { applied: true, delta })
    }

    /// Measured draw when a power sensor is configured, otherwise the assumed draw.
    async fn draw_estimate<E: Entities + ?Sized>(&self, entities: &E) -> Kilowatts {
        if let Some(entity_id) = &self.power_entity_id
            && let Ok(Some(power)) = entities.power_kw(entity_id).await
            && power > Kilowatts::ZERO
        {
            return power;
        }
        self.assumed_power.unwrap_or(Kilowatts::ZERO)
    }
}
