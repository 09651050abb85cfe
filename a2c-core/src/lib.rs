#![warn(missing_docs)]
//! Core of a synchronous advantage actor-critic (A2C).
//!
//! This crate does not depend on a deep learning framework. It provides
//!
//! * environment traits ([`Env`], [`VecEnv`]) and pools of environment instances
//!   ([`SubprocVecEnv`], [`SequentialVecEnv`]),
//! * rollout collection with frame stacking and bootstrapped returns ([`Runner`]),
//! * evaluation without training ([`Evaluator`]),
//! * learning rate schedules ([`Scheduler`]) and snapshot retention
//!   ([`CheckpointManager`]),
//! * and the training loop ([`Trainer`]), driving an implementation of [`Agent`].
pub mod dummy;
pub mod error;
pub mod record;
pub mod util;

mod base;
pub use base::{ActorCritic, Agent, Env, LossStats, Step, StepOutput, VecEnv, VecStep};

mod checkpoint;
pub use checkpoint::CheckpointManager;

mod evaluator;
pub use evaluator::{EvalReport, Evaluator, EvaluatorConfig};

mod frame_stack;
pub use frame_stack::FrameStack;

mod returns;
pub use returns::{bootstrapped_returns, discount_with_dones};

mod rollout;
pub use rollout::RolloutBatch;

mod runner;
pub use runner::{Runner, Transition};

mod scheduler;
pub use scheduler::{LrSchedule, Scheduler};

mod trainer;
pub use trainer::{Trainer, TrainerConfig};

mod vec_env;
pub use vec_env::{SequentialVecEnv, SubprocVecEnv};
