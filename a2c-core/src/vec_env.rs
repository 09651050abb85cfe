//! Implementations of [`VecEnv`](crate::VecEnv).
mod sequential;
mod subproc;
use crate::{error::A2cError, record::Record, Env, Step};
use anyhow::Result;
use ndarray::Array2;
pub use sequential::SequentialVecEnv;
pub use subproc::SubprocVecEnv;

/// Steps `env` and starts the next episode if this step ended the current one.
///
/// When the episode ends, the returned observation is the first frame of the
/// next episode.
fn step_with_reset<E: Env>(env: &mut E, act: usize) -> Result<(Step, Record)> {
    let (mut step, record) = env.step(act)?;
    if step.is_done {
        step.obs = env.reset()?;
    }
    Ok((step, record))
}

/// Stacks per-instance frames into `[n_envs, frame_len]`.
fn stack_frames(frames: Vec<Vec<f32>>, frame_len: usize) -> Result<Array2<f32>> {
    let n_envs = frames.len();
    if let Some(f) = frames.iter().find(|f| f.len() != frame_len) {
        return Err(A2cError::ShapeMismatch(format!(
            "frame of length {}, expected {}",
            f.len(),
            frame_len
        ))
        .into());
    }
    let flat = frames.into_iter().flatten().collect::<Vec<_>>();
    Ok(Array2::from_shape_vec((n_envs, frame_len), flat)?)
}
