use std::{fmt::Debug, fs, path::Path};

use chrono::TimeDelta;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    core::{
        cooldown::{Cooldown, DEFAULT_COOLDOWN_SECS},
        coordinator::Sensors,
        load::{AmpereControl, Kind, Load, Switch},
        mode::OperationMode,
    },
    prelude::*,
    quantity::{current::Amperes, energy::KilowattHours, power::Kilowatts},
};

/// The TOML settings file. Reloaded and reconciled whenever it changes on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Hourly consumption ceiling.
    pub max_hour_kwh: KilowattHours,

    /// Initial operation mode, until a mode entity says otherwise.
    #[serde(default)]
    pub mode: OperationMode,

    /// Headroom below the ceiling required before restoring a load.
    #[serde(default = "default_restore_margin")]
    pub restore_margin_kwh: KilowattHours,

    pub sensors: SensorsConfig,

    #[serde(default, rename = "load")]
    pub loads: Vec<LoadConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorsConfig {
    /// Energy sensor that accumulates within the hour and resets at the top.
    pub hour_energy: String,

    /// Instantaneous net house power sensor.
    #[serde(default)]
    pub house_power: Option<String>,

    /// Select entity steering the mode at runtime.
    #[serde(default)]
    pub mode_entity: Option<String>,

    /// Number entity steering the ceiling at runtime.
    #[serde(default)]
    pub ceiling_entity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoadConfig {
    pub name: String,

    /// Lower priority is shed earlier and restored last.
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Boolean entity that must be `on` for the load to be steered.
    #[serde(default)]
    pub enabled_entity: Option<String>,

    /// Power sensor of the load itself, for reporting estimates.
    #[serde(default)]
    pub power_entity: Option<String>,

    /// Assumed draw when no power sensor is configured.
    #[serde(default)]
    pub assumed_power_kw: Option<Kilowatts>,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,

    #[serde(flatten)]
    pub kind: KindConfig,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindConfig {
    /// Variable-amperage charger behind a number entity.
    Ampere {
        entity_id: String,
        min_amps: Amperes,
        max_amps: Amperes,
        step_amps: Amperes,
        #[serde(default = "default_phases")]
        phases: u8,
        #[serde(default = "default_voltage")]
        voltage: u32,
    },

    /// Plain on/off consumer. An inverted switch draws power while off.
    Switch {
        entity_id: String,
        #[serde(default)]
        inverted: bool,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_cooldown_secs() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

const fn default_restore_margin() -> KilowattHours {
    KilowattHours(0.1)
}

const fn default_phases() -> u8 {
    1
}

const fn default_voltage() -> u32 {
    230
}

impl Config {
    pub fn read_from<P: AsRef<Path> + Debug>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let this: Self = toml::from_slice(
            &fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?,
        )
        .with_context(|| format!("failed to parse `{}`", path.display()))?;
        this.validate()?;
        Ok(this)
    }

    fn validate(&self) -> Result {
        ensure!(
            self.max_hour_kwh > KilowattHours::ZERO,
            "`max_hour_kwh` must be positive, got {}",
            self.max_hour_kwh,
        );
        if let Some(name) = self.loads.iter().map(|load| &load.name).duplicates().next() {
            bail!("duplicate load name `{name}`");
        }
        for load in &self.loads {
            ensure!(load.cooldown_secs >= 0, "load `{}` has a negative cooldown", load.name);
        }
        Ok(())
    }

    #[must_use]
    pub fn sensors(&self) -> Sensors {
        Sensors {
            hour_energy_entity_id: self.sensors.hour_energy.clone(),
            house_power_entity_id: self.sensors.house_power.clone(),
            mode_entity_id: self.sensors.mode_entity.clone(),
            ceiling_entity_id: self.sensors.ceiling_entity.clone(),
        }
    }

    #[must_use]
    pub fn loads(&self) -> Vec<Load> {
        self.loads.iter().map(LoadConfig::to_load).collect()
    }
}

impl LoadConfig {
    fn to_load(&self) -> Load {
        Load {
            name: self.name.clone(),
            priority: self.priority,
            enabled: self.enabled,
            enabled_entity_id: self.enabled_entity.clone(),
            power_entity_id: self.power_entity.clone(),
            assumed_power: self.assumed_power_kw,
            cooldown: Cooldown::new(TimeDelta::seconds(self.cooldown_secs)),
            original: None,
            kind: match &self.kind {
                KindConfig::Ampere { entity_id, min_amps, max_amps, step_amps, phases, voltage } => {
                    Kind::Ampere(AmpereControl {
                        entity_id: entity_id.clone(),
                        min_amps: *min_amps,
                        max_amps: *max_amps,
                        step_amps: *step_amps,
                        phases: *phases,
                        voltage: *voltage,
                    })
                }
                KindConfig::Switch { entity_id, inverted } => Kind::Switch(Switch {
                    entity_id: entity_id.clone(),
                    inverted: *inverted,
                }),
            },
        }
    }
}
