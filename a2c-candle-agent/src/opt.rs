//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::rmsprop::{ParamsRMSprop, RMSprop};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer of the actor-critic.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// RMSProp optimizer.
    RmsProp {
        /// Initial learning rate.
        lr: f64,
        /// Decay of the moving average of squared gradients.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Added to the denominator for numerical stability.
        #[serde(default = "default_rms_eps")]
        eps: f64,
    },

    /// AdamW optimizer.
    AdamW {
        /// Initial learning rate.
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },
}

fn default_alpha() -> f64 {
    0.99
}

fn default_rms_eps() -> f64 {
    1e-5
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::RmsProp { lr, alpha, eps } => {
                let params = ParamsRMSprop {
                    lr: *lr,
                    alpha: *alpha,
                    eps: *eps,
                    ..ParamsRMSprop::default()
                };
                let opt = RMSprop::new(vars, params)?;
                Ok(Optimizer::RmsProp(opt))
            }
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars, params)?;
                Ok(Optimizer::AdamW(opt))
            }
        }
    }

    /// Initial learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::RmsProp { lr, .. } => *lr,
            Self::AdamW { lr, .. } => *lr,
        }
    }

    /// Override learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        match &mut self {
            Self::RmsProp { lr, .. } => *lr = v,
            Self::AdamW { lr, .. } => *lr = v,
        }
        self
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::RmsProp {
            lr: 7e-4,
            alpha: default_alpha(),
            eps: default_rms_eps(),
        }
    }
}

/// Optimizers.
///
/// This is a thin wrapper of [`candle_nn::Optimizer`] implementations.
pub enum Optimizer {
    /// RMSProp optimizer.
    RmsProp(RMSprop),

    /// AdamW optimizer.
    AdamW(AdamW),
}

impl Optimizer {
    /// Applies gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::RmsProp(opt) => Ok(opt.step(grads)?),
            Self::AdamW(opt) => Ok(opt.step(grads)?),
        }
    }

    /// Sets the learning rate used by the following steps.
    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Self::RmsProp(opt) => opt.set_learning_rate(lr),
            Self::AdamW(opt) => opt.set_learning_rate(lr),
        }
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::RmsProp(opt) => opt.learning_rate(),
            Self::AdamW(opt) => opt.learning_rate(),
        }
    }
}
