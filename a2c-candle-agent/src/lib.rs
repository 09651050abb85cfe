//! Actor-critic model for [a2c-core](a2c_core) implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! [`A2c`] implements [`a2c_core::Agent`]: it samples actions for a runner, performs
//! exactly one RMSProp update per rollout and persists its parameters as safetensors
//! snapshots managed by [`a2c_core::CheckpointManager`].
mod a2c;
mod context;
pub mod opt;
pub mod policy;
pub mod util;
pub use a2c::{A2c, A2cConfig, Advantage};
use anyhow::Result;
use candle_core::DeviceLocation;
pub use context::ComputeContext;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// A CUDA device with its ordinal.
    Cuda(usize),

    /// A Metal device with its ordinal.
    Metal(usize),
}

impl Device {
    /// Opens the device.
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
            Self::Metal(n) => Ok(candle_core::Device::new_metal(n)?),
        }
    }
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            DeviceLocation::Cpu => Self::Cpu,
            DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}
