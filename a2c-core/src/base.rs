//! Core functionalities.
mod env;
mod model;
mod step;
mod vec_env;
pub use env::Env;
pub use model::{ActorCritic, Agent, LossStats, StepOutput};
pub use step::{Step, VecStep};
pub use vec_env::VecEnv;
