use anyhow::Result;
use candle_core::{Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Fully connected torso with tanh activations on the flattened stacked frames.
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// Builds layers `in_dim -> units[0] -> ... -> units[n - 1]`.
    pub fn build(vb: VarBuilder, in_dim: usize, units: &[usize]) -> Result<Self> {
        let dims = std::iter::once(in_dim).chain(units.iter().copied());
        let layers = dims
            .zip(units.iter().copied())
            .enumerate()
            .map(|(i, (i_dim, o_dim))| linear(i_dim, o_dim, vb.pp(format!("ln{}", i))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = xs.flatten_from(1)?;
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?.tanh()?;
        }
        Ok(xs)
    }
}
