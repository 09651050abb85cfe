//! Policy networks.
mod base;
mod cnn;
mod config;
mod lstm;
mod mlp;
pub use base::{ActorCriticNet, PolicyOutput, PolicyView};
pub use cnn::Cnn;
pub use config::{PolicyConfig, PolicyKind};
pub use lstm::Lstm;
pub use mlp::Mlp;
