//! Learning rate schedule.
use crate::error::A2cError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Shape of a [`Scheduler`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(try_from = "String", into = "String")]
pub enum LrSchedule {
    /// The initial value all the time.
    Constant,

    /// Linear decay from the initial value to zero.
    #[default]
    Linear,
}

impl FromStr for LrSchedule {
    type Err = A2cError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "linear" => Ok(Self::Linear),
            _ => Err(A2cError::UnknownSchedule(s.to_string())),
        }
    }
}

impl TryFrom<String> for LrSchedule {
    type Error = A2cError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LrSchedule> for String {
    fn from(schedule: LrSchedule) -> Self {
        schedule.to_string()
    }
}

impl fmt::Display for LrSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant => write!(f, "constant"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// A value decaying over `n_values` consumed timesteps.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    value: f64,
    n_values: f64,
    schedule: LrSchedule,
}

impl Scheduler {
    /// Constructs a scheduler.
    pub fn new(value: f64, n_values: usize, schedule: LrSchedule) -> Self {
        Self {
            value,
            n_values: n_values as f64,
            schedule,
        }
    }

    /// Value after `steps` timesteps. A linear schedule stays at zero past the horizon.
    pub fn value_at(&self, steps: usize) -> f64 {
        match self.schedule {
            LrSchedule::Constant => self.value,
            LrSchedule::Linear => {
                if self.n_values <= 0.0 {
                    return 0.0;
                }
                self.value * (1.0 - steps as f64 / self.n_values).max(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_decays_to_zero() {
        let s = Scheduler::new(1e-3, 1000, LrSchedule::Linear);
        assert_eq!(s.value_at(0), 1e-3);
        assert!((s.value_at(250) - 7.5e-4).abs() < 1e-12);
        assert_eq!(s.value_at(1000), 0.0);
        assert_eq!(s.value_at(5000), 0.0);
    }

    #[test]
    fn test_constant() {
        let s = Scheduler::new(7e-4, 10, LrSchedule::Constant);
        assert_eq!(s.value_at(0), 7e-4);
        assert_eq!(s.value_at(100), 7e-4);
    }

    #[test]
    fn test_serde() {
        let yaml = serde_yaml::to_string(&LrSchedule::Constant).unwrap();
        assert!(yaml.contains("constant"));
        assert_eq!(serde_yaml::from_str::<LrSchedule>("linear").ok(), Some(LrSchedule::Linear));
        assert!(serde_yaml::from_str::<LrSchedule>("step").is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("linear".parse::<LrSchedule>().ok(), Some(LrSchedule::Linear));
        assert_eq!("constant".parse::<LrSchedule>().ok(), Some(LrSchedule::Constant));
        assert!(matches!(
            "cosine".parse::<LrSchedule>(),
            Err(A2cError::UnknownSchedule(_))
        ));
    }
}
