use async_trait::async_trait;

use crate::{
    prelude::*,
    quantity::{current::Amperes, energy::KilowattHours, power::Kilowatts},
};

/// Boundary to the entity world (Home Assistant in production, in-memory in tests).
///
/// Readers return [`None`] for an entity that is missing, `unknown` or
/// `unavailable` — never a sentinel value. Writers fail loudly; the caller
/// decides whether that aborts or skips.
#[async_trait]
pub trait Entities {
    /// Read an energy sensor, normalized to kWh.
    async fn energy_kwh(&self, entity_id: &str) -> Result<Option<KilowattHours>>;

    /// Read a power sensor, normalized to kW.
    async fn power_kw(&self, entity_id: &str) -> Result<Option<Kilowatts>>;

    /// Read an on/off entity (switch, boolean helper).
    async fn boolean(&self, entity_id: &str) -> Result<Option<bool>>;

    /// Read a select entity's current option.
    async fn select(&self, entity_id: &str) -> Result<Option<String>>;

    /// Read a number entity holding a charger amperage.
    async fn amperage(&self, entity_id: &str) -> Result<Option<Amperes>>;

    /// Write a charger amperage.
    async fn set_amperage(&self, entity_id: &str, value: Amperes) -> Result;

    /// Switch an on/off entity.
    async fn set_switch(&self, entity_id: &str, on: bool) -> Result;
}

#[cfg(test)]
pub mod fake {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use super::*;

    /// What a [`Fake`] was asked to write, in call order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Write {
        Amperage(String, Amperes),
        Switch(String, bool),
    }

    /// In-memory entity registry. Writes are applied to the registry and journaled.
    #[derive(Default)]
    pub struct Fake {
        numbers: Mutex<HashMap<String, f64>>,
        booleans: Mutex<HashMap<String, bool>>,
        selects: Mutex<HashMap<String, String>>,
        broken: Mutex<HashSet<String>>,
        writes: Mutex<Vec<Write>>,
    }

    impl Fake {
        #[must_use]
        pub fn with_number(self, entity_id: &str, value: f64) -> Self {
            self.numbers.lock().unwrap().insert(entity_id.to_string(), value);
            self
        }

        #[must_use]
        pub fn with_boolean(self, entity_id: &str, value: bool) -> Self {
            self.booleans.lock().unwrap().insert(entity_id.to_string(), value);
            self
        }

        #[must_use]
        pub fn with_select(self, entity_id: &str, value: &str) -> Self {
            self.selects.lock().unwrap().insert(entity_id.to_string(), value.to_string());
            self
        }

        /// Make every write to the entity fail.
        #[must_use]
        pub fn with_broken(self, entity_id: &str) -> Self {
            self.broken.lock().unwrap().insert(entity_id.to_string());
            self
        }

        pub fn set_number(&self, entity_id: &str, value: f64) {
            self.numbers.lock().unwrap().insert(entity_id.to_string(), value);
        }

        pub fn remove_number(&self, entity_id: &str) {
            self.numbers.lock().unwrap().remove(entity_id);
        }

        pub fn set_select(&self, entity_id: &str, value: &str) {
            self.selects.lock().unwrap().insert(entity_id.to_string(), value.to_string());
        }

        pub fn number(&self, entity_id: &str) -> Option<f64> {
            self.numbers.lock().unwrap().get(entity_id).copied()
        }

        pub fn switch(&self, entity_id: &str) -> Option<bool> {
            self.booleans.lock().unwrap().get(entity_id).copied()
        }

        pub fn writes(&self) -> Vec<Write> {
            self.writes.lock().unwrap().clone()
        }

        fn ensure_writable(&self, entity_id: &str) -> Result {
            ensure!(
                !self.broken.lock().unwrap().contains(entity_id),
                "entity `{entity_id}` is unreachable"
            );
            Ok(())
        }
    }

    #[async_trait]
    impl Entities for Fake {
        async fn energy_kwh(&self, entity_id: &str) -> Result<Option<KilowattHours>> {
            Ok(self.number(entity_id).map(KilowattHours))
        }

        async fn power_kw(&self, entity_id: &str) -> Result<Option<Kilowatts>> {
            Ok(self.number(entity_id).map(Kilowatts))
        }

        async fn boolean(&self, entity_id: &str) -> Result<Option<bool>> {
            Ok(self.switch(entity_id))
        }

        async fn select(&self, entity_id: &str) -> Result<Option<String>> {
            Ok(self.selects.lock().unwrap().get(entity_id).cloned())
        }

        async fn amperage(&self, entity_id: &str) -> Result<Option<Amperes>> {
            Ok(self.number(entity_id).map(Amperes))
        }

        async fn set_amperage(&self, entity_id: &str, value: Amperes) -> Result {
            self.ensure_writable(entity_id)?;
            self.set_number(entity_id, value.0);
            self.writes.lock().unwrap().push(Write::Amperage(entity_id.to_string(), value));
            Ok(())
        }

        async fn set_switch(&self, entity_id: &str, on: bool) -> Result {
            self.ensure_writable(entity_id)?;
            self.booleans.lock().unwrap().insert(entity_id.to_string(), on);
            self.writes.lock().unwrap().push(Write::Switch(entity_id.to_string(), on));
            Ok(())
        }
    }
}
