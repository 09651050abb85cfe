use super::{Cnn, Lstm, Mlp, PolicyConfig, PolicyKind};
use a2c_core::error::A2cError;
use anyhow::Result;
use candle_core::{Module, Tensor, D};
use candle_nn::{linear, ops::softmax, Linear, VarBuilder};

/// Batch shape of a forward pass, `n_envs` instances by `n_steps` steps.
///
/// The network is evaluated with two views over the same parameters: the step view
/// (`n_steps == 1`) used to act, and the training view (`n_steps == T`) used to
/// compute losses over a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyView {
    /// The number of instances.
    pub n_envs: usize,

    /// The number of consecutive steps of each instance.
    pub n_steps: usize,
}

impl PolicyView {
    /// View acting on one step of `n_envs` instances.
    pub fn step(n_envs: usize) -> Self {
        Self { n_envs, n_steps: 1 }
    }

    /// View over rollouts of `n_steps` steps of `n_envs` instances.
    pub fn train(n_envs: usize, n_steps: usize) -> Self {
        Self { n_envs, n_steps }
    }

    /// `n_envs * n_steps`.
    pub fn batch_size(&self) -> usize {
        self.n_envs * self.n_steps
    }
}

/// Output of [`ActorCriticNet::forward`].
pub struct PolicyOutput {
    /// Logits of the action distribution, `[batch, n_actions]`.
    pub logits: Tensor,

    /// Per-action values, `[batch, n_actions]`.
    pub q: Tensor,

    /// Recurrent state after the last step, `[n_envs, state_dim]`.
    pub states: Option<Tensor>,
}

impl PolicyOutput {
    /// State values `V = sum_a pi(a) Q(a)`, `[batch]`.
    pub fn values(&self) -> Result<Tensor> {
        let pi = softmax(&self.logits, D::Minus1)?;
        Ok((pi * &self.q)?.sum(D::Minus1)?)
    }
}

enum Torso {
    Cnn(Cnn),
    Mlp(Mlp),
}

impl Module for Torso {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Cnn(m) => m.forward(xs),
            Self::Mlp(m) => m.forward(xs),
        }
    }
}

/// Policy with an action distribution head and a per-action value head.
pub struct ActorCriticNet {
    config: PolicyConfig,
    torso: Torso,
    lstm: Option<Lstm>,
    pi: Linear,
    q: Linear,
}

impl ActorCriticNet {
    /// Builds the network. Variables are registered through `vb`.
    pub fn build(vb: VarBuilder, config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let (torso, feat_dim) = match config.kind {
            PolicyKind::Mlp => {
                let in_dim = config.n_stack * config.frame_len();
                let mlp = Mlp::build(vb.pp("torso"), in_dim, &config.mlp_units)?;
                let out_dim = config.mlp_units.last().copied().unwrap_or(in_dim);
                (Torso::Mlp(mlp), out_dim)
            }
            _ => {
                let cnn = Cnn::build(
                    vb.pp("torso"),
                    &config.frame_shape,
                    config.n_stack,
                    config.hidden,
                )?;
                (Torso::Cnn(cnn), config.hidden)
            }
        };
        let (lstm, feat_dim) = match config.kind {
            PolicyKind::CnnLstm | PolicyKind::CnnLnLstm => {
                let normalize = config.kind == PolicyKind::CnnLnLstm;
                let lstm = Lstm::build(vb.pp("lstm"), feat_dim, config.lstm_units, normalize)?;
                (Some(lstm), config.lstm_units)
            }
            _ => (None, feat_dim),
        };
        let pi = linear(feat_dim, config.n_actions, vb.pp("pi"))?;
        let q = linear(feat_dim, config.n_actions, vb.pp("q"))?;

        Ok(Self {
            config,
            torso,
            lstm,
            pi,
            q,
        })
    }

    /// Configuration of the network.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Evaluates the network.
    ///
    /// * `obs` - `[view.batch_size(), n_stack, frame_len]`, instance-major
    /// * `states` - `[n_envs, state_dim]`, required by recurrent policies
    /// * `masks` - `[view.batch_size()]`, `1.0` where history is discarded
    pub fn forward(
        &self,
        view: &PolicyView,
        obs: &Tensor,
        states: Option<&Tensor>,
        masks: &Tensor,
    ) -> Result<PolicyOutput> {
        let expected = (view.batch_size(), self.config.n_stack, self.config.frame_len());
        if obs.dims3()? != expected {
            return Err(A2cError::ShapeMismatch(format!(
                "observation {:?}, expected {:?}",
                obs.dims(),
                expected
            ))
            .into());
        }

        let feats = self.torso.forward(obs)?;
        let (feats, states) = match &self.lstm {
            Some(lstm) => {
                let states = states.ok_or_else(|| {
                    A2cError::ShapeMismatch("recurrent policy without states".to_string())
                })?;
                let feat_dim = feats.dim(1)?;
                let xs = feats.reshape((view.n_envs, view.n_steps, feat_dim))?;
                let masks = masks.reshape((view.n_envs, view.n_steps))?;
                let (out, states) = lstm.forward(&xs, &masks, states)?;
                (out, Some(states))
            }
            None => (feats, None),
        };

        Ok(PolicyOutput {
            logits: self.pi.forward(&feats)?,
            q: self.q.forward(&feats)?,
            states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
        Ok((a - b)?.abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()?)
    }

    #[test]
    fn test_views_share_parameters() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = PolicyConfig::new(PolicyKind::Mlp, vec![3], 2, 4).mlp_units(vec![8]);
        let net = ActorCriticNet::build(vb, config)?;
        let n_vars = varmap.all_vars().len();

        // Step view over 2 instances, training view over 2 instances by 3 steps
        let obs = Tensor::randn(0f32, 1., (6, 2, 3), &Device::Cpu)?;
        let masks = Tensor::zeros(6, DType::F32, &Device::Cpu)?;
        let train = net.forward(&PolicyView::train(2, 3), &obs, None, &masks)?;
        let step = net.forward(
            &PolicyView::step(2),
            &obs.narrow(0, 3, 2)?,
            None,
            &masks.narrow(0, 0, 2)?,
        )?;
        assert_eq!(varmap.all_vars().len(), n_vars);
        assert!(max_abs_diff(&train.q.narrow(0, 3, 2)?, &step.q)? < 1e-6);

        let v = train.values()?;
        assert_eq!(v.dims(), &[6]);
        Ok(())
    }

    #[test]
    fn test_recurrent_views() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = PolicyConfig::new(PolicyKind::CnnLstm, vec![36, 36], 2, 3)
            .hidden(16)
            .lstm_units(8);
        let net = ActorCriticNet::build(vb, config)?;
        let dev = Device::Cpu;

        // Two instances unrolled for two steps in the training view
        let obs = Tensor::rand(0f32, 255., (4, 2, 36 * 36), &dev)?;
        let masks = Tensor::new(&[0f32, 0., 0., 1.], &dev)?;
        let state = Tensor::zeros((2, 16), DType::F32, &dev)?;
        let train = net.forward(&PolicyView::train(2, 2), &obs, Some(&state), &masks)?;

        // The same computation with the step view, one step at a time
        let rows = |t: usize| -> Result<Tensor> {
            Ok(Tensor::cat(&[&obs.narrow(0, t, 1)?, &obs.narrow(0, 2 + t, 1)?], 0)?)
        };
        let view = PolicyView::step(2);
        let m0 = Tensor::new(&[0f32, 0.], &dev)?;
        let m1 = Tensor::new(&[0f32, 1.], &dev)?;
        let s0 = net.forward(&view, &rows(0)?, Some(&state), &m0)?;
        let s1 = net.forward(&view, &rows(1)?, s0.states.as_ref(), &m1)?;

        let expected = Tensor::cat(
            &[
                &s0.logits.narrow(0, 0, 1)?,
                &s1.logits.narrow(0, 0, 1)?,
                &s0.logits.narrow(0, 1, 1)?,
                &s1.logits.narrow(0, 1, 1)?,
            ],
            0,
        )?;
        assert!(max_abs_diff(&train.logits, &expected)? < 1e-5);
        Ok(())
    }

    #[test]
    fn test_wrong_observation_shape() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = ActorCriticNet::build(vb, PolicyConfig::new(PolicyKind::Mlp, vec![3], 2, 4))?;
        let obs = Tensor::zeros((5, 2, 3), DType::F32, &Device::Cpu)?;
        let masks = Tensor::zeros(6, DType::F32, &Device::Cpu)?;
        assert!(net
            .forward(&PolicyView::train(2, 3), &obs, None, &masks)
            .is_err());
        Ok(())
    }
}
