//! Configuration of [`ActorCriticNet`](super::ActorCriticNet).
use a2c_core::error::A2cError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Architecture of the policy.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(try_from = "String", into = "String")]
pub enum PolicyKind {
    /// Convolutional torso, `"cnn"`.
    Cnn,

    /// Fully connected torso, `"mlp"`.
    Mlp,

    /// Convolutional torso followed by an LSTM, `"lstm"`.
    CnnLstm,

    /// Convolutional torso followed by a layer-normalized LSTM, `"lnlstm"`.
    CnnLnLstm,
}

impl PolicyKind {
    /// Returns `true` if the policy carries a recurrent state.
    pub fn is_recurrent(&self) -> bool {
        matches!(self, Self::CnnLstm | Self::CnnLnLstm)
    }
}

impl FromStr for PolicyKind {
    type Err = A2cError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cnn" => Ok(Self::Cnn),
            "mlp" => Ok(Self::Mlp),
            "lstm" => Ok(Self::CnnLstm),
            "lnlstm" => Ok(Self::CnnLnLstm),
            _ => Err(A2cError::UnknownPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for PolicyKind {
    type Error = A2cError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PolicyKind> for String {
    fn from(kind: PolicyKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cnn => "cnn",
            Self::Mlp => "mlp",
            Self::CnnLstm => "lstm",
            Self::CnnLnLstm => "lnlstm",
        };
        write!(f, "{}", s)
    }
}

fn default_hidden() -> usize {
    512
}

fn default_mlp_units() -> Vec<usize> {
    vec![64, 64]
}

fn default_lstm_units() -> usize {
    256
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`ActorCriticNet`](super::ActorCriticNet).
pub struct PolicyConfig {
    /// Architecture.
    pub kind: PolicyKind,

    /// Shape of a frame, `[h, w]` or `[c, h, w]` for convolutional torsos.
    pub frame_shape: Vec<usize>,

    /// The number of stacked frames.
    pub n_stack: usize,

    /// The number of actions.
    pub n_actions: usize,

    /// Output size of the convolutional torso.
    #[serde(default = "default_hidden")]
    pub hidden: usize,

    /// Hidden layers of the fully connected torso.
    #[serde(default = "default_mlp_units")]
    pub mlp_units: Vec<usize>,

    /// Size of the LSTM cell.
    #[serde(default = "default_lstm_units")]
    pub lstm_units: usize,
}

impl PolicyConfig {
    /// Creates a configuration with default layer sizes.
    pub fn new(kind: PolicyKind, frame_shape: Vec<usize>, n_stack: usize, n_actions: usize) -> Self {
        Self {
            kind,
            frame_shape,
            n_stack,
            n_actions,
            hidden: default_hidden(),
            mlp_units: default_mlp_units(),
            lstm_units: default_lstm_units(),
        }
    }

    /// Sets the output size of the convolutional torso.
    pub fn hidden(mut self, v: usize) -> Self {
        self.hidden = v;
        self
    }

    /// Sets the hidden layers of the fully connected torso.
    pub fn mlp_units(mut self, v: Vec<usize>) -> Self {
        self.mlp_units = v;
        self
    }

    /// Sets the size of the LSTM cell.
    pub fn lstm_units(mut self, v: usize) -> Self {
        self.lstm_units = v;
        self
    }

    /// The number of elements in a frame.
    pub fn frame_len(&self) -> usize {
        self.frame_shape.iter().product()
    }

    /// Width of a recurrent state row, zero for feed-forward policies.
    pub fn state_dim(&self) -> usize {
        match self.kind.is_recurrent() {
            true => 2 * self.lstm_units,
            false => 0,
        }
    }

    /// Checks the sizes of the layers.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(A2cError::InvalidConfig(msg).into())
        }
        if self.n_stack == 0 || self.n_actions == 0 || self.frame_len() == 0 {
            return invalid(format!(
                "n_stack = {}, n_actions = {}, frame_shape = {:?}",
                self.n_stack, self.n_actions, self.frame_shape
            ));
        }
        match self.kind {
            PolicyKind::Mlp => {
                if self.mlp_units.is_empty() || self.mlp_units.contains(&0) {
                    return invalid(format!("mlp_units = {:?}", self.mlp_units));
                }
            }
            _ => {
                super::cnn::Cnn::out_hw(&self.frame_shape)?;
                if self.hidden == 0 || (self.kind.is_recurrent() && self.lstm_units == 0) {
                    return invalid(format!(
                        "hidden = {}, lstm_units = {}",
                        self.hidden, self.lstm_units
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_kind() {
        assert_eq!("cnn".parse::<PolicyKind>().ok(), Some(PolicyKind::Cnn));
        assert_eq!("lstm".parse::<PolicyKind>().ok(), Some(PolicyKind::CnnLstm));
        assert!(matches!(
            "transformer".parse::<PolicyKind>(),
            Err(A2cError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn test_serde_policy_config() -> Result<()> {
        let config = PolicyConfig::new(PolicyKind::CnnLnLstm, vec![84, 84], 4, 6).lstm_units(128);
        let yaml = serde_yaml::to_string(&config)?;
        assert!(yaml.contains("kind: lnlstm"));
        let config_: PolicyConfig = serde_yaml::from_str(&yaml)?;
        assert_eq!(config, config_);
        assert_eq!(config_.state_dim(), 256);
        Ok(())
    }

    #[test]
    fn test_unknown_kind_in_yaml() {
        let yaml = "kind: gru\nframe_shape: [4]\nn_stack: 1\nn_actions: 2\n";
        let err = serde_yaml::from_str::<PolicyConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("Unknown policy variant: gru"));
    }

    #[test]
    fn test_validate() {
        assert!(PolicyConfig::new(PolicyKind::Cnn, vec![84, 84], 4, 6).validate().is_ok());
        assert!(PolicyConfig::new(PolicyKind::Cnn, vec![8, 8], 4, 6).validate().is_err());
        assert!(PolicyConfig::new(PolicyKind::Mlp, vec![4], 1, 2).validate().is_ok());
        assert!(PolicyConfig::new(PolicyKind::Mlp, vec![4], 1, 2)
            .mlp_units(vec![])
            .validate()
            .is_err());
    }
}
