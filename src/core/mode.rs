use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// What the coordinator is allowed to do each tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// No projection, no steering. Entering this mode hands every steered load back.
    Off,

    /// Project and report, but never touch a load.
    #[default]
    Monitor,

    /// Full loop: project, shed and restore.
    Control,
}

impl Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Monitor => write!(f, "monitor"),
            Self::Control => write!(f, "control"),
        }
    }
}

impl FromStr for OperationMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "monitor" => Ok(Self::Monitor),
            "control" => Ok(Self::Control),
            _ => bail!("unknown operation mode `{value}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_states() -> Result {
        assert_eq!(OperationMode::from_str("Control")?, OperationMode::Control);
        assert_eq!(OperationMode::from_str("off")?, OperationMode::Off);
        assert!(OperationMode::from_str("eco").is_err());
        Ok(())
    }
}
