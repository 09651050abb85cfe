use anyhow::Result;
use candle_core::{Module, Tensor};
use candle_nn::{layer_norm, linear, linear_no_bias, ops::sigmoid, LayerNorm, Linear, VarBuilder};

struct Norms {
    x: LayerNorm,
    h: LayerNorm,
    c: LayerNorm,
}

/// LSTM unrolled over the steps of every instance.
///
/// The state of an instance is the row `[h, c]`. Before step `t`, the state is
/// multiplied by `1 - mask_t`, so that history is discarded at episode boundaries.
pub struct Lstm {
    wx: Linear,
    wh: Linear,
    norms: Option<Norms>,
    units: usize,
}

impl Lstm {
    /// Builds a cell. With `normalize`, the input and recurrent projections and the
    /// cell are normalized.
    pub fn build(vb: VarBuilder, in_dim: usize, units: usize, normalize: bool) -> Result<Self> {
        let wx = linear(in_dim, 4 * units, vb.pp("wx"))?;
        let wh = linear_no_bias(units, 4 * units, vb.pp("wh"))?;
        let norms = match normalize {
            true => Some(Norms {
                x: layer_norm(4 * units, 1e-5, vb.pp("ln_x"))?,
                h: layer_norm(4 * units, 1e-5, vb.pp("ln_h"))?,
                c: layer_norm(units, 1e-5, vb.pp("ln_c"))?,
            }),
            false => None,
        };
        Ok(Self {
            wx,
            wh,
            norms,
            units,
        })
    }

    /// Unrolls the cell.
    ///
    /// * `xs` - `[n_envs, n_steps, in_dim]`
    /// * `masks` - `[n_envs, n_steps]`, `1.0` where history is discarded
    /// * `state` - `[n_envs, 2 * units]`
    ///
    /// Returns outputs `[n_envs * n_steps, units]`, ordered instance-major, and the
    /// state after the last step.
    pub fn forward(&self, xs: &Tensor, masks: &Tensor, state: &Tensor) -> Result<(Tensor, Tensor)> {
        let (n_envs, n_steps, _) = xs.dims3()?;
        let mut h = state.narrow(1, 0, self.units)?;
        let mut c = state.narrow(1, self.units, self.units)?;
        let mut outs = Vec::with_capacity(n_steps);

        for t in 0..n_steps {
            let x = xs.narrow(1, t, 1)?.squeeze(1)?;
            let keep = masks.narrow(1, t, 1)?.affine(-1.0, 1.0)?;
            h = h.broadcast_mul(&keep)?;
            c = c.broadcast_mul(&keep)?;

            let (gx, gh) = (self.wx.forward(&x)?, self.wh.forward(&h)?);
            let z = match &self.norms {
                Some(n) => (n.x.forward(&gx)? + n.h.forward(&gh)?)?,
                None => (gx + gh)?,
            };
            let gates = z.chunk(4, 1)?;
            let i = sigmoid(&gates[0])?;
            let f = sigmoid(&gates[1])?;
            let o = sigmoid(&gates[2])?;
            let u = gates[3].tanh()?;
            c = ((f * &c)? + (i * u)?)?;
            let c_out = match &self.norms {
                Some(n) => n.c.forward(&c)?,
                None => c.clone(),
            };
            h = (o * c_out.tanh()?)?;
            outs.push(h.clone());
        }

        let out = Tensor::stack(&outs, 1)?.reshape((n_envs * n_steps, self.units))?;
        let state = Tensor::cat(&[&h, &c], 1)?;
        Ok((out, state))
    }
}
