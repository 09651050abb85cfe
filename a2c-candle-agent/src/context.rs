//! Computation context.
use crate::Device;
use anyhow::Result;
use candle_core::DType;
use candle_nn::{VarBuilder, VarMap};
use log::info;

/// Device and parameter store of one training run.
///
/// The context is constructed explicitly before any parameter is allocated and torn
/// down with [`ComputeContext::close`]. Every view of the policy reads and writes the
/// variables of the same [`VarMap`].
pub struct ComputeContext {
    device: candle_core::Device,
    varmap: VarMap,
    n_procs: usize,
}

impl ComputeContext {
    /// Opens a context on `device`.
    ///
    /// `n_procs` is the number of environment workers of the run.
    pub fn new(device: Device, n_procs: usize) -> Result<Self> {
        let device = device.build()?;
        info!(
            "Opened computation context on {:?} for {} workers",
            device.location(),
            n_procs
        );
        Ok(Self {
            device,
            varmap: VarMap::new(),
            n_procs,
        })
    }

    /// Device of the parameters.
    pub fn device(&self) -> &candle_core::Device {
        &self.device
    }

    /// The parameter store.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// The number of environment workers, used by [`A2c::build_env_pool`](crate::A2c::build_env_pool).
    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    /// Builder of variables registered in the parameter store.
    pub fn var_builder(&self) -> VarBuilder<'static> {
        VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device)
    }

    /// Releases the parameters.
    pub fn close(self) {
        let n_vars = self.varmap.all_vars().len();
        drop(self.varmap);
        info!("Closed computation context with {} variables", n_vars);
    }
}
